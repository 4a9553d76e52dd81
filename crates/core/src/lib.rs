//! Core types for relaycache
//!
//! - `FieldValue`: JSON-shaped values with shared array/object nodes
//! - `Record`: a cached entity, an object node tagged with `id` / `typeName`
//! - `StructuralWalker`: identity-tracking, cycle-safe JSON rendering
//! - `CacheError`: the workspace error type

#![warn(clippy::all)]

pub mod error;
pub mod record;
pub mod value;
pub mod walk;

pub use error::{CacheError, Result};
pub use record::{Record, ID_FIELD, TYPE_NAME_FIELD};
pub use value::{ArrayNode, FieldMap, FieldValue, ObjectNode};
pub use walk::{write_json_str, StructuralWalker};
