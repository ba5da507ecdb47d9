//! Configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::discovery::SuggestionInclusion;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Deadline handed to every request (default: 10 seconds).
    pub request_timeout: Duration,

    /// Suggestion statuses listed next to restaurants
    /// (DISCOVERY_SUGGESTION_STATUSES, default: "approved,tested").
    pub suggestion_inclusion: SuggestionInclusion,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            lookup("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|| vec!["*".to_string()]);

        let request_timeout_secs: u64 = lookup("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("REQUEST_TIMEOUT_SECS must be a valid u64")?;
        if request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        let suggestion_inclusion = match lookup("DISCOVERY_SUGGESTION_STATUSES") {
            Some(list) => SuggestionInclusion::parse(&list)
                .context("DISCOVERY_SUGGESTION_STATUSES is invalid")?,
            None => SuggestionInclusion::default(),
        };

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            cors_allowed_origins,
            request_timeout: Duration::from_secs(request_timeout_secs),
            suggestion_inclusion,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::models::SuggestionStatus;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/tavola")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.cors_allowed_origins, vec!["*"]);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(
            config.suggestion_inclusion.statuses(),
            &[SuggestionStatus::Approved, SuggestionStatus::Tested]
        );
    }

    #[test]
    fn database_url_is_required() {
        assert!(load(&[]).is_err());
    }

    #[test]
    fn malformed_values_are_errors() {
        let url = ("DATABASE_URL", "postgres://localhost/tavola");
        assert!(load(&[url, ("PORT", "eighty")]).is_err());
        assert!(load(&[url, ("REQUEST_TIMEOUT_SECS", "0")]).is_err());
        assert!(load(&[url, ("DISCOVERY_SUGGESTION_STATUSES", "rejected")]).is_err());
        assert!(load(&[url, ("DISCOVERY_SUGGESTION_STATUSES", "")]).is_err());
    }

    #[test]
    fn pending_only_inclusion() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/tavola"),
            ("DISCOVERY_SUGGESTION_STATUSES", "pending"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
        ])
        .unwrap();
        assert_eq!(
            config.suggestion_inclusion.statuses(),
            &[SuggestionStatus::Pending]
        );
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }
}
