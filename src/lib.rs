//! # relaycache
//!
//! Client-side cache of normalized records, kept in memory and mirrored to a
//! key-value storage medium on a fixed period.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use relaycache::{CacheManager, CacheOptions, MemoryMedium};
//!
//! let cache = CacheManager::new(Arc::new(MemoryMedium::new()), CacheOptions::default());
//! cache.wait_for_load().await;
//!
//! cache.write_field("user:1", "name", "Ada", Some("User"));
//! cache.write_root_call("viewer", "", "user:1");
//!
//! let id = cache.resolve_root_call("viewer", "").await;
//! assert_eq!(id.as_deref(), Some("user:1"));
//! ```
//!
//! ## Layout
//!
//! - `relaycache-core`: field values, records, the cycle-safe walker, errors
//! - `relaycache-storage`: the in-memory record store and its snapshot shape
//! - `relaycache-durability`: storage media and the snapshot codec
//! - `relaycache-engine`: the cache manager, its options and observers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;

pub use types::*;

pub use relaycache_core::{ArrayNode, FieldMap, ObjectNode, StructuralWalker};
pub use relaycache_durability::{decode_snapshot, encode_snapshot};
pub use relaycache_engine::{CacheManager, CacheObserver, TracingObserver};
pub use relaycache_storage::RecordStore;
