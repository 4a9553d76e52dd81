//! Persistent medium contract
//!
//! The cache needs only three operations from its host storage, all keyed by a
//! single string. Implementations are shared across tasks as
//! `Arc<dyn StorageMedium>`.

use async_trait::async_trait;
use relaycache_core::Result;

/// Asynchronous string key-value storage.
///
/// # Contract
///
/// | Operation | Absent key | Failure |
/// |-----------|------------|---------|
/// | `get` | `Ok(None)` | `Err(CacheError::Storage / Io)` |
/// | `set` | creates it | `Err(..)`, previous value kept |
/// | `remove` | `Ok(())` | `Err(..)` |
///
/// `set` replaces the whole value for the key; there is no partial update.
///
/// # Example
///
/// ```ignore
/// use relaycache_durability::{MemoryMedium, StorageMedium};
///
/// let medium = MemoryMedium::new();
/// medium.set("__cache__", "{}".to_string()).await?;
/// assert_eq!(medium.get("__cache__").await?.as_deref(), Some("{}"));
/// ```
#[async_trait]
pub trait StorageMedium: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Delete `key`. Deleting a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;
}
