// src/config/services.rs
use std::env;
use std::time::Duration;

pub const DEFAULT_COMPLETION_URL: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_COMPLETION_MODEL: &str = "deepseek-chat";
pub const DEFAULT_SEARCH_URL: &str = "http://localhost:8080";

pub const ENV_API_KEY: &str = "DEEPSEEK_API_KEY";
pub const ENV_API_URL: &str = "DEEPSEEK_API_URL";
pub const ENV_MODEL: &str = "DEEPSEEK_MODEL";
pub const ENV_SEARCH_URL: &str = "SEARXNG_URL";
pub const ENV_SEARCH_URL_ALT: &str = "SEARXNG_INSTANCE";
pub const ENV_USE_PUBLIC_SEARCH: &str = "USE_PUBLIC_SEARXNG";
pub const ENV_COMPLETION_TIMEOUT: &str = "COMPLETION_BASE_TIMEOUT_SECS";
pub const ENV_SEARCH_TIMEOUT: &str = "SEARCH_BASE_TIMEOUT_SECS";
pub const ENV_TEST_MODE: &str = "CREDIBILITY_TEST_MODE";

fn default_completion_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_search_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Endpoints and credentials for the two external services.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub completion_url: String,
    pub completion_api_key: String,
    pub completion_model: String,
    pub completion_base_timeout: Duration,
    pub search_url: String,
    /// Try public SearXNG instances when the primary fails its probe.
    pub use_public_search: bool,
    pub search_base_timeout: Duration,
    /// `CREDIBILITY_TEST_MODE=mock`: in-process backends, no network.
    pub mock_mode: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            completion_url: DEFAULT_COMPLETION_URL.to_string(),
            completion_api_key: String::new(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            completion_base_timeout: default_completion_timeout(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            use_public_search: false,
            search_base_timeout: default_search_timeout(),
            mock_mode: false,
        }
    }
}

impl ServiceConfig {
    /// Read everything from the process environment. Call `dotenvy::dotenv()`
    /// first if a `.env` file should be honored.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            completion_url: non_empty(ENV_API_URL).unwrap_or(d.completion_url),
            completion_api_key: non_empty(ENV_API_KEY).unwrap_or_default(),
            completion_model: non_empty(ENV_MODEL).unwrap_or(d.completion_model),
            completion_base_timeout: secs(ENV_COMPLETION_TIMEOUT).unwrap_or(d.completion_base_timeout),
            search_url: non_empty(ENV_SEARCH_URL)
                .or_else(|| non_empty(ENV_SEARCH_URL_ALT))
                .unwrap_or(d.search_url),
            use_public_search: non_empty(ENV_USE_PUBLIC_SEARCH)
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            search_base_timeout: secs(ENV_SEARCH_TIMEOUT).unwrap_or(d.search_base_timeout),
            mock_mode: non_empty(ENV_TEST_MODE)
                .map(|v| v.eq_ignore_ascii_case("mock"))
                .unwrap_or(false),
        }
    }

    pub fn has_completion_key(&self) -> bool {
        self.mock_mode || !self.completion_api_key.trim().is_empty()
    }
}

/// `true|1|yes|y`, case-insensitive.
pub fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y"
    )
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn secs(key: &str) -> Option<Duration> {
    let raw = non_empty(key)?;
    match raw.parse::<u64>() {
        Ok(0) | Err(_) => {
            tracing::warn!(target: "config", key, value = %raw, "ignoring invalid timeout");
            None
        }
        Ok(n) => Some(Duration::from_secs(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsing() {
        for v in ["true", "TRUE", "1", "yes", "Y", " y "] {
            assert!(parse_flag(v), "{v}");
        }
        for v in ["false", "0", "no", "", "on"] {
            assert!(!parse_flag(v), "{v}");
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let c = ServiceConfig::default();
        assert_eq!(c.completion_url, DEFAULT_COMPLETION_URL);
        assert_eq!(c.completion_model, "deepseek-chat");
        assert_eq!(c.completion_base_timeout, Duration::from_secs(30));
        assert!(!c.has_completion_key());
    }
}
