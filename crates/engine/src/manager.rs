//! Cache manager
//!
//! Owns one [`RecordStore`] and keeps a persisted copy of it on a
//! [`StorageMedium`].
//!
//! # Lifecycle
//!
//! ```text
//! new() --> empty store, usable at once
//!   |-- load task (once):   medium.get(key) --> replace store
//!   `-- flush task (every period): encode store --> medium.set(key)
//! ```
//!
//! # Concurrency
//!
//! Every API call takes the store lock for one short synchronous section and
//! never holds it across an await, so calls are atomic with respect to each
//! other and never suspend. Background tasks interleave only between calls:
//!
//! - The load replaces the store wholesale. Writes made before it completes
//!   are lost if it finds a snapshot (or finds none, or a corrupt one);
//!   callers that care should `wait_for_load` before their first write.
//! - Each flush encodes the store as it is at tick time and hands the write
//!   to its own task, so a slow medium never delays the next tick.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use relaycache_core::{CacheError, FieldValue, Record, Result};
use relaycache_durability::{decode_snapshot, encode_snapshot, StorageMedium};
use relaycache_storage::RecordStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};

use crate::observer::{CacheEvent, CacheObserver, TracingObserver};
use crate::options::CacheOptions;

/// Outcome of the initial load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Load has not completed yet
    Pending,
    /// A snapshot was decoded and replaced the store
    Restored,
    /// No snapshot was stored; the store was reset to empty
    Empty,
    /// The stored snapshot was unreadable; the store was reset to empty
    Discarded,
    /// The medium could not be read; the store was left untouched
    Unavailable,
}

/// State shared between the manager and its background tasks
struct Shared {
    store: RwLock<RecordStore>,
    medium: Arc<dyn StorageMedium>,
    cache_key: String,
    observer: Arc<dyn CacheObserver>,
    load_state: watch::Sender<LoadState>,
}

impl Shared {
    fn replace_store(&self, store: RecordStore) {
        *self.store.write() = store;
    }

    fn encode(&self) -> Result<String> {
        let store = self.store.read();
        encode_snapshot(&store)
    }

    async fn load(self: Arc<Self>) {
        let _guard = LoadGuard {
            shared: Arc::clone(&self),
        };
        let state = match self.medium.get(&self.cache_key).await {
            Ok(Some(text)) if !text.is_empty() => match decode_snapshot(&text) {
                Ok(store) => {
                    let event = CacheEvent::Restored {
                        records: store.record_count(),
                        root_calls: store.root_call_count(),
                    };
                    self.replace_store(store);
                    self.observer.on_event(&event);
                    LoadState::Restored
                }
                Err(e) => {
                    self.replace_store(RecordStore::new());
                    self.observer.on_event(&CacheEvent::Discarded {
                        reason: e.to_string(),
                    });
                    LoadState::Discarded
                }
            },
            Ok(_) => {
                self.replace_store(RecordStore::new());
                self.observer.on_event(&CacheEvent::NoSnapshot);
                LoadState::Empty
            }
            Err(e) => {
                self.observer.on_event(&CacheEvent::LoadFailed {
                    reason: e.to_string(),
                });
                LoadState::Unavailable
            }
        };
        self.load_state.send_replace(state);
    }

    async fn persist(&self, snapshot: String) -> Result<()> {
        let bytes = snapshot.len();
        match self.medium.set(&self.cache_key, snapshot).await {
            Ok(()) => {
                self.observer.on_event(&CacheEvent::Flushed { bytes });
                Ok(())
            }
            Err(e) => {
                self.observer.on_event(&CacheEvent::FlushFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_flush_timer(self: Arc<Self>, period: Duration) {
        // First flush one full period after start, like a plain repeating timer
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.encode() {
                Ok(snapshot) => {
                    let shared = Arc::clone(&self);
                    // Failures are reported inside persist; the next tick is the retry
                    tokio::spawn(async move {
                        let _ = shared.persist(snapshot).await;
                    });
                }
                Err(e) => self.observer.on_event(&CacheEvent::FlushFailed {
                    reason: e.to_string(),
                }),
            }
        }
    }
}

/// Publishes `Unavailable` if the load task ends without an outcome: a
/// panicking medium or observer, or an abort on drop.
struct LoadGuard {
    shared: Arc<Shared>,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        let abandoned = self.shared.load_state.send_if_modified(|state| {
            if *state == LoadState::Pending {
                *state = LoadState::Unavailable;
                true
            } else {
                false
            }
        });
        if abandoned && std::thread::panicking() {
            tracing::error!(
                target: "relaycache::load",
                "Load task panicked, continuing with the current store"
            );
        }
    }
}

/// Record cache with asynchronous durable backing
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use relaycache_durability::MemoryMedium;
/// use relaycache_engine::{CacheManager, CacheOptions};
///
/// let cache = CacheManager::new(Arc::new(MemoryMedium::new()), CacheOptions::default());
/// cache.wait_for_load().await;
///
/// cache.write_field("1", "name", "x", Some("User"));
/// cache.write_root_call("viewer", "", "1");
/// cache.read_root_call("viewer", "", |err, id| {
///     assert!(err.is_none());
///     assert_eq!(id.as_deref(), Some("1"));
/// });
/// ```
pub struct CacheManager {
    shared: Arc<Shared>,
    options: CacheOptions,
    load_task: JoinHandle<()>,
    flush_task: JoinHandle<()>,
}

impl CacheManager {
    /// Create a manager that reports lifecycle events to `tracing`.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime; the load and flush tasks
    /// are spawned on it.
    pub fn new(medium: Arc<dyn StorageMedium>, options: CacheOptions) -> Self {
        Self::with_observer(medium, options, Arc::new(TracingObserver))
    }

    /// Create a manager reporting lifecycle events to `observer`.
    ///
    /// Same runtime requirement as [`CacheManager::new`].
    pub fn with_observer(
        medium: Arc<dyn StorageMedium>,
        options: CacheOptions,
        observer: Arc<dyn CacheObserver>,
    ) -> Self {
        let (load_state, _) = watch::channel(LoadState::Pending);
        let shared = Arc::new(Shared {
            store: RwLock::new(RecordStore::new()),
            medium,
            cache_key: options.resolved_cache_key().to_string(),
            observer,
            load_state,
        });

        let load_task = tokio::spawn(Arc::clone(&shared).load());
        let flush_task = tokio::spawn(Arc::clone(&shared).run_flush_timer(options.flush_period()));

        Self {
            shared,
            options,
            load_task,
            flush_task,
        }
    }

    /// Options this manager was built with
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Storage key of the persisted snapshot
    pub fn cache_key(&self) -> &str {
        &self.shared.cache_key
    }

    // ========================================================================
    // Load state
    // ========================================================================

    /// Current outcome of the initial load
    pub fn load_state(&self) -> LoadState {
        *self.shared.load_state.borrow()
    }

    /// Wait until the initial load has completed and return its outcome.
    ///
    /// Always resolves: a load task that panics reports `Unavailable`.
    pub async fn wait_for_load(&self) -> LoadState {
        let mut rx = self.shared.load_state.subscribe();
        let outcome = rx
            .wait_for(|state| *state != LoadState::Pending)
            .await
            .map(|state| *state);
        // The sender lives in `shared`, so the channel cannot close while we wait
        outcome.unwrap_or(LoadState::Pending)
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Set one field of a record, creating the record if needed.
    ///
    /// A new record starts as `{id: data_id, typeName: type_name}` (no
    /// `typeName` when `None`). Other fields of an existing record are kept.
    pub fn write_field(
        &self,
        data_id: &str,
        field: &str,
        value: impl Into<FieldValue>,
        type_name: Option<&str>,
    ) {
        self.shared
            .store
            .write()
            .write_field(data_id, field, value.into(), type_name);
    }

    /// Replace the record at `data_id`
    pub fn write_node(&self, data_id: &str, record: Record) {
        self.shared.store.write().write_record(data_id, record);
    }

    /// Read the record at `data_id`; `None` when absent
    pub fn read_node(&self, data_id: &str) -> Option<Record> {
        self.shared.store.read().read_node(data_id)
    }

    /// Number of records currently held
    pub fn record_count(&self) -> usize {
        self.shared.store.read().record_count()
    }

    // ========================================================================
    // Root calls
    // ========================================================================

    /// Map a root-call storage key to a data identifier.
    ///
    /// `_identifying_arg_value` is not consulted: callers fold the argument
    /// into `storage_key` before calling.
    pub fn write_root_call(&self, storage_key: &str, _identifying_arg_value: &str, data_id: &str) {
        self.shared
            .store
            .write()
            .write_root_call(storage_key, data_id);
    }

    /// Resolve a root call and deliver the result to `callback`.
    ///
    /// The lookup happens now; the callback runs later on its own task, never
    /// inside this call. Its error slot is always `None`.
    ///
    /// Ordering against the caller depends on the runtime. On a
    /// current-thread runtime (or inside a `LocalSet`) the callback runs only
    /// after the caller yields, so it never observes or precedes the caller's
    /// following statements. On a multi-thread runtime it may run on another
    /// worker before the caller's next statement; callers needing the strict
    /// order there should use [`Self::resolve_root_call`] and await it.
    pub fn read_root_call<F>(&self, call_name: &str, _call_value: &str, callback: F)
    where
        F: FnOnce(Option<CacheError>, Option<String>) + Send + 'static,
    {
        let data_id = self.shared.store.read().root_call(call_name);
        tokio::spawn(async move {
            callback(None, data_id);
        });
    }

    /// Future form of [`Self::read_root_call`].
    ///
    /// The lookup happens when this is called, not when the future is first
    /// polled; the future yields once before resolving.
    pub fn resolve_root_call(
        &self,
        call_name: &str,
        _call_value: &str,
    ) -> impl std::future::Future<Output = Option<String>> + Send + 'static {
        let data_id = self.shared.store.read().root_call(call_name);
        async move {
            tokio::task::yield_now().await;
            data_id
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Encode the current store and write it now, returning the medium's result.
    ///
    /// Independent of the timer; the next scheduled flush still happens.
    pub async fn flush_now(&self) -> Result<()> {
        let snapshot = match self.shared.encode() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.shared.observer.on_event(&CacheEvent::FlushFailed {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };
        self.shared.persist(snapshot).await
    }

    /// Reset the store to empty and remove the persisted snapshot.
    ///
    /// The in-memory reset happens before the removal is awaited, so it takes
    /// effect even when the medium fails.
    pub async fn clear_storage(&self) -> Result<()> {
        self.shared.replace_store(RecordStore::new());
        match self.shared.medium.remove(&self.shared.cache_key).await {
            Ok(()) => {
                self.shared.observer.on_event(&CacheEvent::Cleared);
                Ok(())
            }
            Err(e) => {
                self.shared.observer.on_event(&CacheEvent::ClearFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        self.load_task.abort();
        self.flush_task.abort();
    }
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("cache_key", &self.shared.cache_key)
            .field("flush_period", &self.options.flush_period())
            .field("load_state", &self.load_state())
            .field("store", &*self.shared.store.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycache_durability::MemoryMedium;

    fn manager() -> CacheManager {
        CacheManager::new(Arc::new(MemoryMedium::new()), CacheOptions::default())
    }

    #[tokio::test]
    async fn test_usable_before_load() {
        let cache = manager();
        cache.write_field("1", "name", "x", None);
        assert_eq!(
            cache.read_node("1").unwrap().get("name").unwrap().as_str(),
            Some("x")
        );
    }

    #[tokio::test]
    async fn test_load_state_progression() {
        let cache = manager();
        assert_eq!(cache.load_state(), LoadState::Pending);
        assert_eq!(cache.wait_for_load().await, LoadState::Empty);
        assert_eq!(cache.load_state(), LoadState::Empty);
        // Completed loads resolve immediately
        assert_eq!(cache.wait_for_load().await, LoadState::Empty);
    }

    #[tokio::test]
    async fn test_cache_key_resolution() {
        let cache = CacheManager::new(
            Arc::new(MemoryMedium::new()),
            CacheOptions::new().cache_key(""),
        );
        assert_eq!(cache.cache_key(), "__RelayCacheManager__");
    }

    #[tokio::test]
    async fn test_debug_impl() {
        let cache = manager();
        let debug_str = format!("{:?}", cache);
        assert!(debug_str.contains("CacheManager"));
        assert!(debug_str.contains("__RelayCacheManager__"));
    }

    #[tokio::test]
    async fn test_resolve_root_call_uses_state_at_call_time() {
        let cache = manager();
        cache.wait_for_load().await;
        cache.write_root_call("viewer", "", "a");
        let pending = cache.resolve_root_call("viewer", "");
        cache.write_root_call("viewer", "", "b");
        assert_eq!(pending.await.as_deref(), Some("a"));
    }
}
