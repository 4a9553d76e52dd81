//! Public types for the relaycache API.
//!
//! This module re-exports types from the internal crates with a flat public
//! interface.

// ============================================================================
// Public API types
// ============================================================================

// Values and records
pub use relaycache_core::{FieldValue, Record, ID_FIELD, TYPE_NAME_FIELD};

// Errors
pub use relaycache_core::{CacheError, Result};

// Snapshot section names
pub use relaycache_storage::{RECORDS_KEY, ROOT_CALL_MAP_KEY};

// Manager configuration and lifecycle
pub use relaycache_engine::{CacheEvent, CacheOptions, LoadState, DEFAULT_CACHE_KEY, DEFAULT_TIMEOUT_MS};

// Storage media
pub use relaycache_durability::{FileMedium, MemoryMedium, StorageMedium};
