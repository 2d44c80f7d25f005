//! Grouping helpers for the summary endpoints.

use serde_json::Value;

use crate::database::criteria::parse_timestamp;
use crate::database::Row;

/// `YYYY-MM` of a timestamp column.
pub fn month(row: &Row, column: &str) -> Option<String> {
    row.get(column)
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .map(|t| t.format("%Y-%m").to_string())
}

/// Numeric column value; numeric strings are accepted.
pub fn number(row: &Row, column: &str) -> Option<f64> {
    match row.get(column) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn integer(row: &Row, column: &str) -> Option<i64> {
    number(row, column).map(|n| n as i64)
}

pub fn text(row: &Row, column: &str) -> Option<String> {
    match row.get(column) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

/// Row count plus a mean over the rows that carried a score.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ScoreStats {
    pub count: u64,
    scored: u64,
    sum: f64,
}

impl ScoreStats {
    pub fn add(&mut self, score: Option<f64>) {
        self.count += 1;
        if let Some(score) = score {
            self.scored += 1;
            self.sum += score;
        }
    }

    /// 0 when no row had a score.
    pub fn average(&self) -> f64 {
        if self.scored == 0 {
            0.0
        } else {
            self.sum / self.scored as f64
        }
    }
}

/// Count-weighted mean of per-group averages.
pub fn overall_average<I>(groups: I) -> f64
where
    I: IntoIterator<Item = (f64, u64)>,
{
    let (weighted, count) = groups
        .into_iter()
        .fold((0.0, 0u64), |(w, c), (avg, n)| (w + avg * n as f64, c + n));
    if count == 0 {
        0.0
    } else {
        weighted / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        match v {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn test_column_readers() {
        let r = row(json!({"t": "2024-03-05T10:00:00", "n": "12.5", "i": 7, "s": null}));
        assert_eq!(month(&r, "t").as_deref(), Some("2024-03"));
        assert_eq!(number(&r, "n"), Some(12.5));
        assert_eq!(integer(&r, "i"), Some(7));
        assert_eq!(text(&r, "i").as_deref(), Some("7"));
        assert_eq!(text(&r, "s"), None);
        assert_eq!(month(&r, "missing"), None);
    }

    #[test]
    fn test_score_stats_skip_missing_scores() {
        let mut stats = ScoreStats::default();
        stats.add(Some(80.0));
        stats.add(None);
        stats.add(Some(60.0));
        assert_eq!(stats.count, 3);
        assert_eq!(stats.average(), 70.0);
        assert_eq!(ScoreStats::default().average(), 0.0);
    }

    #[test]
    fn test_overall_average_is_weighted() {
        assert_eq!(overall_average([(80.0, 3), (40.0, 1)]), 70.0);
        assert_eq!(overall_average(Vec::<(f64, u64)>::new()), 0.0);
    }
}
