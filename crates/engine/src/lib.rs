//! Cache engine for relaycache
//!
//! `CacheManager` ties a `RecordStore` to a `StorageMedium`: it restores the
//! last snapshot on start, flushes a new one on a fixed period, and serves the
//! calling layer's field / node / root-call reads and writes from memory.
//!
//! # Runtime
//!
//! Build the manager inside a tokio runtime. `read_root_call` delivers its
//! callback on a spawned task. The callback is guaranteed to run after the
//! caller's current synchronous section only on a current-thread runtime or
//! inside a `LocalSet`. On a multi-thread runtime it may run on another worker
//! first. Await `resolve_root_call` when that order matters.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod observer;
pub mod options;

pub use manager::{CacheManager, LoadState};
pub use observer::{CacheEvent, CacheObserver, TracingObserver};
pub use options::{CacheOptions, DEFAULT_CACHE_KEY, DEFAULT_TIMEOUT_MS};
