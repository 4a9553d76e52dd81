//! In-memory storage layer for relaycache
//!
//! Holds the record map and the root-call map, and converts the whole store
//! to and from its serializable snapshot form.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod record_store;

pub use record_store::{RecordStore, RECORDS_KEY, ROOT_CALL_MAP_KEY};
