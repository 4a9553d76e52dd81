//! In-process storage medium
//!
//! Keeps values in a `DashMap`. Nothing survives the process; this backend is
//! meant for tests and for caches that only need to survive a manager being
//! rebuilt inside one process.

use async_trait::async_trait;
use dashmap::DashMap;
use relaycache_core::Result;

use crate::medium::StorageMedium;

/// Storage medium held in memory
///
/// Wrap in `Arc` to share one medium between several managers.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: DashMap<String, String>,
}

impl MemoryMedium {
    /// Create an empty medium
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: pre-populate `key` with `value`
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Current value of `key`, read synchronously
    pub fn contents(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Check if `key` holds a value
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no key holds a value
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StorageMedium for MemoryMedium {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.contents(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_key() {
        let medium = MemoryMedium::new();
        assert!(medium.get("nope").await.unwrap().is_none());
        assert!(medium.is_empty());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let medium = MemoryMedium::new();
        medium.set("k", "v1".to_string()).await.unwrap();
        medium.set("k", "v2".to_string()).await.unwrap();
        assert_eq!(medium.get("k").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(medium.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let medium = MemoryMedium::new().with_entry("k", "v");
        assert!(medium.contains_key("k"));
        medium.remove("k").await.unwrap();
        medium.remove("k").await.unwrap();
        assert!(medium.contents("k").is_none());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let medium = MemoryMedium::new()
            .with_entry("a", "1")
            .with_entry("b", "2");
        medium.remove("a").await.unwrap();
        assert_eq!(medium.contents("b").as_deref(), Some("2"));
    }
}
