//! Durability layer for relaycache
//!
//! - `medium`: the `StorageMedium` contract (async get / set / remove by key)
//! - `memory`: in-process medium backed by a concurrent map
//! - `file`: directory-backed medium, one file per key
//! - `snapshot`: encoding a `RecordStore` to the persisted string and back

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod file;
pub mod medium;
pub mod memory;
pub mod snapshot;

pub use file::FileMedium;
pub use medium::StorageMedium;
pub use memory::MemoryMedium;
pub use snapshot::{decode_snapshot, encode_snapshot};
