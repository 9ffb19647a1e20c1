//! Client configuration.
//!
//! Every struct here deserializes from a partial JSON object: missing keys fall
//! back to the defaults, so callers only spell out what they override.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::retry::RetryPolicy;

pub const DEFAULT_SITE_BASE_URL: &str = "https://www.linkedin.com";
pub const DEFAULT_API_PATH: &str = "/voyager/api";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Top-level settings for a [`SessionClient`](crate::client::SessionClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Site root, e.g. `https://www.linkedin.com`.
    pub site_base_url: String,
    /// Path of the Voyager API below the site root.
    pub api_path: String,
    /// Directory holding one cached cookie record per username.
    pub cookies_dir: PathBuf,
    /// Transport timeout in seconds; `0` disables it.
    pub timeout_secs: u64,
    /// Optional proxy URL applied to every request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Ignore the cookie cache and always perform a full login.
    pub refresh_cookies: bool,
    /// Scrape instance metadata from the site root after authenticating.
    pub fetch_metadata: bool,
    pub evasion: EvasionConfig,
    pub resolver: ResolverConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            site_base_url: DEFAULT_SITE_BASE_URL.to_string(),
            api_path: DEFAULT_API_PATH.to_string(),
            cookies_dir: default_cookies_dir(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            proxy: None,
            refresh_cookies: false,
            fetch_metadata: true,
            evasion: EvasionConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parse a (possibly partial) JSON configuration object.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn api_base_url(&self) -> String {
        format!(
            "{}{}",
            self.site_base_url.trim_end_matches('/'),
            self.api_path
        )
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn with_site_base_url(mut self, url: impl Into<String>) -> Self {
        self.site_base_url = url.into();
        self
    }

    pub fn with_cookies_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cookies_dir = dir.into();
        self
    }

    pub fn with_evasion(mut self, evasion: EvasionConfig) -> Self {
        self.evasion = evasion;
        self
    }
}

/// Randomized pause inserted before every dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvasionConfig {
    pub enabled: bool,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for EvasionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_delay_ms: 2_000,
            max_delay_ms: 5_000,
        }
    }
}

impl EvasionConfig {
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            min_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

/// Which identity-resolution stages run, and how each stage retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub mini_profile: bool,
    pub profile_view: bool,
    pub profile_html: bool,
    /// Suffix of the `WebTopCardCore-<n>` decoration used by the mini profile
    /// lookup. Values between 1 and 22 have been observed to work.
    pub decoration_index: u32,
    pub retry: RetryPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mini_profile: true,
            profile_view: true,
            profile_html: true,
            decoration_index: 21,
            retry: RetryPolicy::default(),
        }
    }
}

/// `~/.linkedin_api/cookies`, or a relative `.linkedin_api/cookies` when no
/// home directory is known.
fn default_cookies_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".linkedin_api")
        .join("cookies")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_config() {
        let config = ClientConfig::from_value(json!({
            "site_base_url": "http://127.0.0.1:8080",
            "evasion": { "enabled": false },
            "resolver": { "profile_html": false, "retry": { "enabled": true, "max_attempts": 2 } }
        }))
        .unwrap();

        assert_eq!(config.api_base_url(), "http://127.0.0.1:8080/voyager/api");
        assert!(!config.evasion.enabled);
        assert_eq!(config.evasion.max_delay_ms, 5_000);
        assert!(config.resolver.mini_profile);
        assert!(!config.resolver.profile_html);
        assert_eq!(config.resolver.retry, RetryPolicy::enabled(2));
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let config = ClientConfig::from_value(json!({ "timeout_secs": 0 })).unwrap();
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_default_cookies_dir_under_home() {
        let dir = ClientConfig::default().cookies_dir;
        assert!(dir.ends_with(".linkedin_api/cookies"));
        if let Some(home) = dirs::home_dir() {
            assert!(dir.starts_with(home));
        }
    }

    #[test]
    fn test_trailing_slash_in_site_url() {
        let config = ClientConfig::default().with_site_base_url("https://example.com/");
        assert_eq!(config.api_base_url(), "https://example.com/voyager/api");
    }
}
