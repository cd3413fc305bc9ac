//! Client configuration.
//!
//! Defaults target the public API. `from_env` layers the standard
//! environment variables on top of the defaults.

use std::time::Duration;

use crate::asset::CDN_URL;
use crate::error::ConfigError;
use crate::route::{ApiVersion, BASE_URL};

pub const ENV_TOKEN: &str = "DISCORD_BOT_TOKEN";
pub const ENV_API_VERSION: &str = "DISCORD_API_VERSION";
pub const ENV_BASE_URL: &str = "DISCORD_API_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "DISCORD_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 50;
const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 3;
const DEFAULT_MAX_RETRY_AFTER_SECS: u64 = 60;

#[derive(Clone)]
pub struct ClientConfig {
    /// Default bot token; a per-request token overrides it.
    pub token: Option<String>,
    pub api_version: ApiVersion,
    /// API root without the version segment.
    pub base_url: String,
    pub cdn_url: String,
    pub timeout: Duration,
    pub max_concurrent_requests: usize,
    /// How many times a 429 is retried before `RateLimited` is returned.
    pub max_rate_limit_retries: u32,
    /// Rate limits asking for a longer wait are returned immediately.
    pub max_retry_after: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_version: ApiVersion::default(),
            base_url: BASE_URL.to_string(),
            cdn_url: CDN_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_rate_limit_retries: DEFAULT_MAX_RATE_LIMIT_RETRIES,
            max_retry_after: Duration::from_secs(DEFAULT_MAX_RETRY_AFTER_SECS),
        }
    }
}

// Hand-written so the token never lands in logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_version", &self.api_version)
            .field("base_url", &self.base_url)
            .field("cdn_url", &self.cdn_url)
            .field("timeout", &self.timeout)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .field("max_retry_after", &self.max_retry_after)
            .finish()
    }
}

impl ClientConfig {
    /// Reads `DISCORD_BOT_TOKEN`, `DISCORD_API_VERSION`,
    /// `DISCORD_API_BASE_URL` and `DISCORD_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(token) = lookup(ENV_TOKEN).filter(|t| !t.is_empty()) {
            config.token = Some(token);
        }

        if let Some(raw) = lookup(ENV_API_VERSION) {
            let number: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_API_VERSION,
                value: raw.clone(),
            })?;
            config.api_version = ApiVersion::try_from(number)?;
        }

        if let Some(url) = lookup(ENV_BASE_URL).filter(|u| !u.is_empty()) {
            url::Url::parse(&url).map_err(|_| ConfigError::InvalidEnv {
                var: ENV_BASE_URL,
                value: url.clone(),
            })?;
            config.base_url = url;
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw
                .trim()
                .parse()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| ConfigError::InvalidEnv {
                    var: ENV_TIMEOUT_SECS,
                    value: raw.clone(),
                })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = version;
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_cdn_url(mut self, cdn_url: impl Into<String>) -> Self {
        self.cdn_url = cdn_url.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    #[must_use]
    pub fn with_max_rate_limit_retries(mut self, retries: u32) -> Self {
        self.max_rate_limit_retries = retries;
        self
    }

    #[must_use]
    pub fn with_max_retry_after(mut self, max: Duration) -> Self {
        self.max_retry_after = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_target_public_api() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "https://discord.com/api");
        assert_eq!(config.api_version, ApiVersion::V9);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.token.is_none());
    }

    #[test]
    fn env_overrides_are_applied() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_TOKEN, "abc"),
            (ENV_API_VERSION, "10"),
            (ENV_BASE_URL, "http://127.0.0.1:3000/api"),
            (ENV_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.api_version, ApiVersion::V10);
        assert_eq!(config.base_url, "http://127.0.0.1:3000/api");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn env_version_is_validated() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_API_VERSION, "8")])).unwrap_err();
        assert!(matches!(err, ConfigError::VersionDiscontinued(8)));

        let err = ClientConfig::from_lookup(lookup(&[(ENV_API_VERSION, "300")])).unwrap_err();
        assert!(matches!(err, ConfigError::VersionTooNew(300)));

        let err = ClientConfig::from_lookup(lookup(&[(ENV_API_VERSION, "ten")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: ENV_API_VERSION, .. }));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: ENV_TIMEOUT_SECS, .. }));
    }

    #[test]
    fn debug_redacts_token() {
        let config = ClientConfig::default().with_token("secret-token");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
