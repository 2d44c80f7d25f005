use std::collections::HashMap;

/// Named values bound by `:param` segments.
pub type PathParams = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A route pattern such as `/users/:id`, pre-split into segments.
///
/// A `:name` segment matches exactly one non-empty path segment; every other
/// segment must match literally. There is no catch-all form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .map(|s| match s.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Literal(s.to_string()),
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Bound parameters when `path` matches, `None` otherwise.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Param(name) if !part.is_empty() => {
                    params.insert(name.clone(), part.to_string());
                }
                _ => return None,
            }
        }
        Some(params)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathMatch {
    pub is_match: bool,
    pub params: PathParams,
}

/// One-shot form of [`PathPattern::matches`].
pub fn match_path(pattern: &str, path: &str) -> PathMatch {
    match PathPattern::parse(pattern).matches(path) {
        Some(params) => PathMatch { is_match: true, params },
        None => PathMatch::default(),
    }
}
