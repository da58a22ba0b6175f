//! Backend endpoint configuration, resolved once at process start.

use thiserror::Error;
use tracing::warn;
use url::Url;

/// Environment variable naming the analysis backend.
pub const BACKEND_URL_ENV: &str = "BACKEND_URL";

/// Loopback fallback used when the environment provides nothing usable.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid backend url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    base_url: String,
}

impl BackendConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(base_url).map_err(|e| ConfigError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme {scheme:?}"),
            });
        }
        if parsed.host_str().is_none() {
            return Err(ConfigError::InvalidUrl {
                url: base_url.to_string(),
                reason: "missing host".to_string(),
            });
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve from `BACKEND_URL`, falling back to the local loopback
    /// default when unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(BACKEND_URL_ENV) {
            Ok(raw) => match Self::new(&raw) {
                Ok(config) => config,
                Err(e) => {
                    warn!(error = %e, "ignoring invalid {BACKEND_URL_ENV}");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert!(BackendConfig::new("http://10.0.0.2:8000").is_ok());
        assert!(BackendConfig::new("https://api.example.com").is_ok());
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert!(BackendConfig::new("ftp://files.example.com").is_err());
        assert!(BackendConfig::new("not a url").is_err());
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = BackendConfig::new("http://localhost:8000/").unwrap();
        assert_eq!(config.endpoint("/analyze"), "http://localhost:8000/analyze");
        assert_eq!(config.endpoint("health"), "http://localhost:8000/health");
    }

    #[test]
    fn default_is_local_loopback() {
        assert_eq!(BackendConfig::default().base_url(), DEFAULT_BACKEND_URL);
    }

    // Single test so the env var is touched from one place only.
    #[test]
    fn from_env_resolution() {
        std::env::remove_var(BACKEND_URL_ENV);
        assert_eq!(BackendConfig::from_env().base_url(), DEFAULT_BACKEND_URL);

        std::env::set_var(BACKEND_URL_ENV, "https://analysis.example.com/");
        assert_eq!(
            BackendConfig::from_env().base_url(),
            "https://analysis.example.com"
        );

        std::env::set_var(BACKEND_URL_ENV, "definitely not a url");
        assert_eq!(BackendConfig::from_env().base_url(), DEFAULT_BACKEND_URL);

        std::env::remove_var(BACKEND_URL_ENV);
    }
}
