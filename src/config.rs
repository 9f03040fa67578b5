//! Centralized configuration management for stockroom

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the back-office REST API
    pub api_url: String,
    /// File holding the persisted bearer token
    pub token_path: PathBuf,
    /// Directory export files are written to
    pub export_dir: PathBuf,
    /// List view defaults
    pub list: ListConfig,
    /// HTTP client configuration
    pub http: HttpConfig,
    /// Letterhead printed on PDF exports
    pub letterhead: LetterheadConfig,
}

/// Defaults shared by every list view
#[derive(Debug, Clone)]
pub struct ListConfig {
    /// Rows per page when a screen does not choose its own
    pub page_size: usize,
    /// Quiescence window before a search term is sent (milliseconds)
    pub search_debounce_ms: u64,
    /// How long a fetched page is served from cache (seconds)
    pub cache_ttl_seconds: u64,
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

#[derive(Debug, Clone, Default)]
pub struct LetterheadConfig {
    pub company_name: Option<String>,
    pub logo_path: Option<PathBuf>,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            search_debounce_ms: 500,
            cache_ttl_seconds: 30,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: "stockroom/0.1.0".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000/api".to_string(),
            token_path: "./.stockroom-token".into(),
            export_dir: "./exports".into(),
            list: ListConfig::default(),
            http: HttpConfig::default(),
            letterhead: LetterheadConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let api_url = std::env::var("STOCKROOM_API_URL")
            .unwrap_or(defaults.api_url)
            .trim_end_matches('/')
            .to_string();

        let token_path = std::env::var("STOCKROOM_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.token_path);

        let export_dir = std::env::var("STOCKROOM_EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.export_dir);

        let list = ListConfig {
            page_size: parse_env_var("STOCKROOM_PAGE_SIZE")?.unwrap_or(defaults.list.page_size),
            search_debounce_ms: parse_env_var("STOCKROOM_SEARCH_DEBOUNCE_MS")?
                .unwrap_or(defaults.list.search_debounce_ms),
            cache_ttl_seconds: parse_env_var("STOCKROOM_CACHE_TTL_SECONDS")?
                .unwrap_or(defaults.list.cache_ttl_seconds),
        };

        let http = HttpConfig {
            timeout_seconds: parse_env_var("STOCKROOM_HTTP_TIMEOUT_SECONDS")?
                .unwrap_or(defaults.http.timeout_seconds),
            user_agent: std::env::var("STOCKROOM_USER_AGENT")
                .unwrap_or(defaults.http.user_agent),
        };

        let letterhead = LetterheadConfig {
            company_name: std::env::var("STOCKROOM_COMPANY_NAME").ok(),
            logo_path: std::env::var("STOCKROOM_LOGO_PATH").ok().map(PathBuf::from),
        };

        Ok(Config {
            api_url,
            token_path,
            export_dir,
            list,
            http,
            letterhead,
        })
    }

    /// Absolute URL of a collection endpoint
    pub fn resource_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    /// Get HTTP timeout as Duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }

    /// Get search debounce window as Duration
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.list.search_debounce_ms)
    }

    /// Get cache freshness window as Duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.list.cache_ttl_seconds)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.list.page_size == 0 {
            return Err(anyhow::anyhow!("STOCKROOM_PAGE_SIZE must be greater than zero"));
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "STOCKROOM_API_URL must be an http(s) URL, got '{}'",
                self.api_url
            ));
        }

        std::fs::create_dir_all(&self.export_dir).with_context(|| {
            format!(
                "Cannot create export directory: {}",
                self.export_dir.display()
            )
        })?;

        Ok(())
    }
}

/// Helper function to parse environment variable as a specific type
fn parse_env_var<T>(var_name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display + Send + Sync + std::error::Error + 'static,
{
    match std::env::var(var_name) {
        Ok(val) => val.parse().map(Some).with_context(|| {
            format!("Failed to parse environment variable {} = '{}'", var_name, val)
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.list.page_size, 10);
        assert_eq!(config.search_debounce(), Duration::from_millis(500));
        assert_eq!(config.http.timeout_seconds, 30);
        assert_eq!(config.resource_url("/sales"), "http://localhost:5000/api/sales");
    }

    #[test]
    fn test_config_validation() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.export_dir = dir.path().join("exports");
        config.validate().unwrap();
        assert!(config.export_dir.exists());

        config.list.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_http_api_url() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.export_dir = dir.path().to_path_buf();
        config.api_url = "localhost:5000".to_string();
        assert!(config.validate().is_err());
    }
}
