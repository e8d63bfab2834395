//! Server configuration from environment variables.
//!
//! | Variable             | Default                            |
//! |----------------------|------------------------------------|
//! | `DATABASE_URL`       | `postgres://localhost/tasty_byte`  |
//! | `HOST`               | `0.0.0.0`                          |
//! | `PORT`               | `4000`                             |
//! | `DEBUG_ENABLED`      | `false`                            |
//! | `ALLOWED_ORIGINS`    | `http://localhost:3000`            |
//! | `DB_MAX_CONNECTIONS` | `10`                               |
//! | `RUN_MIGRATIONS`     | `true`                             |

use std::net::SocketAddr;

use axum::http::HeaderValue;
use tasty_core::{Error, Result};
use tasty_db::pool::DEFAULT_MAX_CONNECTIONS;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/tasty_byte";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Include internal error detail in 500 responses.
    pub debug_enabled: bool,
    pub allowed_origins: String,
    pub db_max_connections: u32,
    pub run_migrations: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            debug_enabled: false,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.to_string(),
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            run_migrations: true,
        }
    }
}

impl ApiConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Unset keys take their default;
    /// values that fail to parse are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("PORT must be a port number, got '{}'", raw)))?,
            None => defaults.port,
        };
        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(Error::Config(format!(
                        "DB_MAX_CONNECTIONS must be a positive integer, got '{}'",
                        raw
                    )))
                }
            },
            None => defaults.db_max_connections,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            debug_enabled: lookup("DEBUG_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.debug_enabled),
            allowed_origins: lookup("ALLOWED_ORIGINS").unwrap_or(defaults.allowed_origins),
            db_max_connections,
            run_migrations: lookup("RUN_MIGRATIONS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.run_migrations),
        })
    }

    /// Socket address to listen on.
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid listen address: {}", e)))
    }

    pub fn cors_origins(&self) -> Vec<HeaderValue> {
        parse_allowed_origins(&self.allowed_origins)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "true" | "1")
}

/// Parse a comma separated origin list, skipping entries that are not valid
/// header values. An empty list falls back to [`DEFAULT_ALLOWED_ORIGINS`].
pub fn parse_allowed_origins(origins: &str) -> Vec<HeaderValue> {
    if origins.trim().is_empty() {
        return vec![HeaderValue::from_static(DEFAULT_ALLOWED_ORIGINS)];
    }

    origins
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}
