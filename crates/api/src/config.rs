//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `DATABASE_URL` — PostgreSQL URL; unset runs on the in-memory store
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `COD_MIN_PRIOR_ORDERS` — orders a buyer must exceed for COD (default: `2`)
/// - `COLLABORATOR_TIMEOUT_MS` — bound on catalog calls (default: `5000`)
/// - `IMAGE_URL_BASE` — base of signed image URLs
/// - `IMAGE_URL_TTL_SECS` — lifetime of signed image URLs (default: `900`)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub cod_min_prior_orders: u64,
    pub collaborator_timeout: Duration,
    pub image_url_base: String,
    pub image_url_ttl: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            cod_min_prior_orders: parse_var(&lookup, "COD_MIN_PRIOR_ORDERS")
                .unwrap_or(defaults.cod_min_prior_orders),
            collaborator_timeout: parse_var(&lookup, "COLLABORATOR_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.collaborator_timeout),
            image_url_base: lookup("IMAGE_URL_BASE").unwrap_or(defaults.image_url_base),
            image_url_ttl: parse_var(&lookup, "IMAGE_URL_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.image_url_ttl),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            cod_min_prior_orders: domain::DEFAULT_COD_MIN_PRIOR_ORDERS,
            collaborator_timeout: domain::DEFAULT_COLLABORATOR_TIMEOUT,
            image_url_base: "http://localhost:9000/images".to_string(),
            image_url_ttl: domain::DEFAULT_IMAGE_URL_TTL,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.database_url, None);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.cod_min_prior_orders, 2);
        assert_eq!(config.collaborator_timeout, Duration::from_millis(5000));
        assert_eq!(config.image_url_ttl, Duration::from_secs(900));
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_addr_default() {
        let config = Config::default();
        assert_eq!(config.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_values_from_lookup() {
        let config = from_pairs(&[
            ("PORT", "8081"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/fulfillment"),
            ("COD_MIN_PRIOR_ORDERS", "5"),
            ("COLLABORATOR_TIMEOUT_MS", "250"),
            ("IMAGE_URL_TTL_SECS", "60"),
        ]);
        assert_eq!(config.port, 8081);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/fulfillment")
        );
        assert_eq!(config.cod_min_prior_orders, 5);
        assert_eq!(config.collaborator_timeout, Duration::from_millis(250));
        assert_eq!(config.image_url_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("LOG_FORMAT", "xml"),
            ("DATABASE_URL", "  "),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.database_url, None);
    }
}
