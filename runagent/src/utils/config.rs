//! Client configuration management

use crate::constants::{DEFAULT_BASE_URL, ENV_RUNAGENT_API_KEY, ENV_RUNAGENT_BASE_URL};
use crate::types::RunAgentResult;
use serde::{Deserialize, Serialize};

/// Resolve a setting with the shared precedence: explicit argument,
/// then environment variable, then library default.
pub fn resolve_setting(
    explicit: Option<String>,
    env_key: &str,
    default: Option<&str>,
) -> Option<String> {
    explicit
        .or_else(|| std::env::var(env_key).ok())
        .or_else(|| default.map(|s| s.to_string()))
}

/// Connection configuration for the RunAgent SDK
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> RunAgentResult<Self> {
        let mut config = Self::default();

        if let Ok(env_api_key) = std::env::var(ENV_RUNAGENT_API_KEY) {
            config.api_key = Some(env_api_key);
        }

        if let Ok(env_base_url) = std::env::var(ENV_RUNAGENT_BASE_URL) {
            config.base_url = env_base_url;
        }

        config.base_url = Self::normalize_url(config.base_url);
        Ok(config)
    }

    /// Ensure the base URL carries a scheme
    pub fn normalize_url(url: String) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url
        } else {
            format!("https://{}", url)
        }
    }

    /// Check if SDK is configured for remote use
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && !self.base_url.is_empty()
    }

    /// Get API key
    pub fn api_key(&self) -> Option<String> {
        self.api_key.clone()
    }

    /// Get base URL
    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.api_key.is_none());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(!config.is_configured());
    }

    #[test]
    fn test_url_normalization() {
        assert_eq!(
            Config::normalize_url("api.example.com".to_string()),
            "https://api.example.com"
        );
        assert_eq!(
            Config::normalize_url("http://localhost:8450".to_string()),
            "http://localhost:8450"
        );
    }

    #[test]
    fn test_precedence_explicit_over_env_over_default() {
        let env_key = "RUNAGENT_TEST_SETTING_PRECEDENCE";

        std::env::remove_var(env_key);
        assert_eq!(
            resolve_setting(None, env_key, Some("default")),
            Some("default".to_string())
        );

        std::env::set_var(env_key, "from-env");
        assert_eq!(
            resolve_setting(None, env_key, Some("default")),
            Some("from-env".to_string())
        );
        assert_eq!(
            resolve_setting(Some("explicit".to_string()), env_key, Some("default")),
            Some("explicit".to_string())
        );

        std::env::remove_var(env_key);
    }

    #[test]
    fn test_resolve_setting_without_default() {
        let env_key = "RUNAGENT_TEST_SETTING_NO_DEFAULT";
        std::env::remove_var(env_key);
        assert_eq!(resolve_setting(None, env_key, None), None);
    }
}
