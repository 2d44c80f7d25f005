use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Startup configuration errors. Any of these aborts the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub cache: CacheConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub version: String,
    pub port: u16,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub roster_capacity: usize,
    pub roster_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `None` selects the in-process store (development only).
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

impl SecurityConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.jwt_expiry_secs)
    }
}

impl CacheConfig {
    pub fn roster_ttl(&self) -> Duration {
        Duration::from_secs(self.roster_ttl_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        };

        config.with_overrides(&lookup)
    }

    fn with_overrides<F>(mut self, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Security
        self.security.jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if let Some(v) = lookup("JWT_EXPIRES_IN") {
            self.security.jwt_expiry_secs = parse_duration_secs(&v).ok_or(ConfigError::Invalid {
                key: "JWT_EXPIRES_IN",
                value: v,
            })?;
        }

        // Cache
        if let Some(v) = lookup("ROSTER_CACHE_CAPACITY") {
            self.cache.roster_capacity = parse_positive("ROSTER_CACHE_CAPACITY", v)?;
        }
        if let Some(v) = lookup("ROSTER_CACHE_TTL_SECS") {
            self.cache.roster_ttl_secs = parse_positive("ROSTER_CACHE_TTL_SECS", v)?;
        }

        // API
        if let Some(v) = lookup("ESSAY_API_PORT").or_else(|| lookup("PORT")) {
            self.api.port = parse_positive("PORT", v)?;
        }
        if let Some(v) = lookup("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = parse_positive("API_MAX_REQUEST_SIZE_BYTES", v)?;
        }

        // Database
        self.database.url = lookup("DATABASE_URL").or_else(|| database_url_from_parts(lookup));
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_positive("DATABASE_MAX_CONNECTIONS", v)?;
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = parse_positive("DATABASE_CONNECTION_TIMEOUT", v)?;
        }
        if self.database.url.is_none() && self.environment != Environment::Development {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(self)
    }

    fn base(environment: Environment) -> Self {
        Self {
            environment,
            api: ApiConfig {
                version: env!("CARGO_PKG_VERSION").to_string(),
                port: 3000,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_secs: 7 * 24 * 60 * 60, // 7d
            },
            cache: CacheConfig {
                roster_capacity: 500,
                roster_ttl_secs: 300,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
        }
    }

    fn development() -> Self {
        let mut config = Self::base(Environment::Development);
        config.api.max_request_size_bytes = 10 * 1024 * 1024;
        config.cache.roster_ttl_secs = 60;
        config
    }

    fn staging() -> Self {
        let mut config = Self::base(Environment::Staging);
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config
    }

    fn production() -> Self {
        let mut config = Self::base(Environment::Production);
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.cache.roster_capacity = 2000;
        config
    }
}

/// Parse `7d`, `12h`, `30m`, `45s` or a plain number of seconds.
pub fn parse_duration_secs(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], c),
        _ => (raw, 's'),
    };
    let value: u64 = digits.trim().parse().ok()?;
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return None,
    };
    value.checked_mul(multiplier)
}

fn parse_positive<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value.parse::<T>() {
        Ok(v) if v > T::default() => Ok(v),
        _ => Err(ConfigError::Invalid { key, value }),
    }
}

/// Assemble a Postgres URL from `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`,
/// `DB_NAME` and `DB_SSL`. Returns `None` when `DB_HOST` is unset.
fn database_url_from_parts<F>(lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let host = lookup("DB_HOST")?;
    let port = lookup("DB_PORT")
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(5432);
    let user = lookup("DB_USER").unwrap_or_else(|| "postgres".to_string());
    let password = lookup("DB_PASSWORD").unwrap_or_default();
    let name = lookup("DB_NAME").unwrap_or_else(|| "essai".to_string());

    let mut url = url::Url::parse("postgres://localhost").ok()?;
    url.set_host(Some(&host)).ok()?;
    url.set_port(Some(port)).ok()?;
    url.set_username(&user).ok()?;
    if !password.is_empty() {
        url.set_password(Some(&password)).ok()?;
    }
    url.set_path(&format!("/{}", name));
    if lookup("DB_SSL").as_deref() == Some("true") {
        url.query_pairs_mut().append_pair("sslmode", "require");
    }
    Some(url.into())
}
