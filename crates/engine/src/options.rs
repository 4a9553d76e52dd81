//! Cache manager options
//!
//! Two settings: the storage key the snapshot lives under and the flush
//! period. Both have defaults, and unusable values (an empty key, a zero
//! period) resolve to those defaults rather than being rejected.

use std::time::Duration;

use relaycache_core::{CacheError, Result};
use serde::{Deserialize, Serialize};

/// Storage key used when none is configured
pub const DEFAULT_CACHE_KEY: &str = "__RelayCacheManager__";

/// Flush period in milliseconds used when none is configured
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Options for a [`crate::CacheManager`].
///
/// Use the builder methods or parse from TOML:
///
/// ```
/// use relaycache_engine::CacheOptions;
///
/// let opts = CacheOptions::new().cache_key("app-cache").timeout_ms(5_000);
/// assert_eq!(opts.resolved_cache_key(), "app-cache");
///
/// let parsed = CacheOptions::from_toml_str("timeout = 2500").unwrap();
/// assert_eq!(parsed.flush_period().as_millis(), 2500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheOptions {
    /// Storage namespace key of the snapshot
    #[serde(alias = "cacheKey")]
    pub cache_key: String,
    /// Flush period in milliseconds
    pub timeout: u64,
}

impl CacheOptions {
    /// Create options with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage key
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = key.into();
        self
    }

    /// Set the flush period in milliseconds
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = ms;
        self
    }

    /// Set the flush period, truncated to whole milliseconds
    pub fn flush_interval(mut self, period: Duration) -> Self {
        self.timeout = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Storage key in effect: the configured key, or the default when empty
    pub fn resolved_cache_key(&self) -> &str {
        if self.cache_key.is_empty() {
            DEFAULT_CACHE_KEY
        } else {
            &self.cache_key
        }
    }

    /// Flush period in effect: the configured period, or the default when zero
    pub fn flush_period(&self) -> Duration {
        if self.timeout == 0 {
            Duration::from_millis(DEFAULT_TIMEOUT_MS)
        } else {
            Duration::from_millis(self.timeout)
        }
    }

    /// Parse options from a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CacheError::invalid_config(e.to_string()))
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            timeout: DEFAULT_TIMEOUT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = CacheOptions::default();
        assert_eq!(opts.resolved_cache_key(), "__RelayCacheManager__");
        assert_eq!(opts.flush_period(), Duration::from_secs(10));
    }

    #[test]
    fn test_builder() {
        let opts = CacheOptions::new()
            .cache_key("k")
            .flush_interval(Duration::from_millis(1500));
        assert_eq!(opts.resolved_cache_key(), "k");
        assert_eq!(opts.timeout, 1500);
    }

    #[test]
    fn test_empty_key_falls_back() {
        let opts = CacheOptions::new().cache_key("");
        assert_eq!(opts.resolved_cache_key(), DEFAULT_CACHE_KEY);
    }

    #[test]
    fn test_zero_timeout_falls_back() {
        let opts = CacheOptions::new().timeout_ms(0);
        assert_eq!(opts.flush_period(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }

    #[test]
    fn test_from_toml() {
        let opts = CacheOptions::from_toml_str(
            r#"
            cache_key = "profile-cache"
            timeout = 250
            "#,
        )
        .unwrap();
        assert_eq!(opts.resolved_cache_key(), "profile-cache");
        assert_eq!(opts.flush_period(), Duration::from_millis(250));
    }

    #[test]
    fn test_from_toml_camel_case_key() {
        let opts = CacheOptions::from_toml_str(r#"cacheKey = "x""#).unwrap();
        assert_eq!(opts.cache_key, "x");
        assert_eq!(opts.timeout, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_from_toml_rejects_unknown_and_bad_types() {
        let err = CacheOptions::from_toml_str("interval = 5").unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig { .. }));
        assert!(CacheOptions::from_toml_str(r#"timeout = "soon""#).is_err());
    }
}
