use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tunables for a scrape run. Every field has a default, so a config file
/// only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub base_url: String,
    /// Bill pipelines allowed in flight at once.
    pub concurrency: usize,
    /// Attempts per page before it is treated as unavailable.
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub timeout_secs: u64,
    /// Sockets allowed open at once across all pipelines.
    pub max_connections: usize,
    pub max_idle_connections: usize,
    pub progress_interval: usize,
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: crate::BASE_URL.to_string(),
            concurrency: 10,
            max_retries: 5,
            retry_delay_secs: 2,
            timeout_secs: 20,
            max_connections: 20,
            max_idle_connections: 10,
            progress_interval: 250,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ScraperConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ScraperConfig = toml::from_str(contents)?;
        config.validate()
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be greater than 0".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "max_retries must be greater than 0".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".to_string(),
            ));
        }
        if url::Url::parse(&self.base_url).is_err() {
            return Err(ConfigError::Invalid(format!(
                "base_url is not a valid URL: {}",
                self.base_url
            )));
        }
        Ok(self)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScraperConfig::default();
        assert_eq!(config.base_url, "https://capitol.texas.gov/");
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.max_idle_connections, 10);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ScraperConfig::from_toml("concurrency = 4\nretry_delay_secs = 0\n")
            .expect("Failed to parse config");
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.retry_delay_secs, 0);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout_secs, 20);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let result = ScraperConfig::from_toml("concurrency = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let result = ScraperConfig::from_toml("base_url = \"not a url\"");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let result = ScraperConfig::from_toml("concurrency = \"ten\"");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }
}
