//! Bearer token issuing and verification (HS256, shared secret).

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role carried in the `rolekey` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teachers,
    Students,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teachers => "teachers",
            Role::Students => "students",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "teachers" => Ok(Role::Teachers),
            "students" => Ok(Role::Students),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Comma-joined class names as carried on the wire, parsed once at decode.
///
/// The raw string is kept so tokens re-encode byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ClassList {
    raw: String,
    names: Vec<String>,
}

impl ClassList {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, class: &str) -> bool {
        self.names.iter().any(|c| c == class)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn as_raw(&self) -> &str {
        &self.raw
    }
}

/// Split a comma-joined class string into trimmed, non-empty names.
pub fn split_classes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

impl From<String> for ClassList {
    fn from(raw: String) -> Self {
        let names = split_classes(&raw);
        Self { raw, names }
    }
}

impl From<&str> for ClassList {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<ClassList> for String {
    fn from(list: ClassList) -> Self {
        list.raw
    }
}

/// Identity decoded from a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "memberId")]
    pub member_id: String,
    #[serde(rename = "rolekey")]
    pub role: Role,
    pub school: String,
    pub email: String,
    #[serde(rename = "class")]
    pub classes: ClassList,
}

impl Claims {
    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teachers
    }
}

/// Wire payload: identity plus registered time claims.
#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    #[serde(flatten)]
    claims: Claims,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature, expiry or structure failure. The cause is kept for logs only.
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token generation failed: {0}")]
    Generation(String),
}

/// Stateless token verifier bound to a single symmetric secret.
#[derive(Clone)]
pub struct TokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign `claims` with the configured lifetime.
    pub fn issue(&self, claims: &Claims) -> Result<String, TokenError> {
        self.issue_with_ttl(claims, self.ttl)
    }

    pub fn issue_with_ttl(&self, claims: &Claims, ttl: Duration) -> Result<String, TokenError> {
        let iat = Utc::now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| TokenError::Generation("token lifetime too large".to_string()))?;
        self.issue_at(claims, iat, iat.saturating_add(ttl_secs))
    }

    /// Sign with explicit `iat`/`exp` unix timestamps.
    pub fn issue_at(&self, claims: &Claims, iat: i64, exp: i64) -> Result<String, TokenError> {
        let payload = TokenPayload {
            claims: claims.clone(),
            iat,
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }

    /// Check signature and expiry and decode the identity.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        decode::<TokenPayload>(token, &self.decoding_key, &validation)
            .map(|data| data.claims.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }
}

/// Extract the token from an `Authorization` header value.
///
/// Only `Bearer <token>` is accepted: exactly two whitespace-separated parts
/// and a case-sensitive scheme.
pub fn extract_bearer(header_value: &str) -> Option<&str> {
    let mut parts = header_value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}
