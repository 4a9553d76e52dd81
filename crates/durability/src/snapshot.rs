//! Snapshot codec
//!
//! A snapshot is the whole record store as one compact JSON string:
//!
//! ```text
//! {"records":{"1":{"id":"1","name":"a"}},"rootCallMap":{"viewer":"1"}}
//! ```
//!
//! Encoding goes through [`RecordStore::to_snapshot_string`], so cycles and
//! repeated nodes are cut while the text is written. Neither direction has a
//! nesting limit: records that embed records thousands of levels deep encode
//! and decode without touching the call stack per level.

use relaycache_core::{FieldValue, Result};
use relaycache_storage::RecordStore;

/// Encode the current contents of `store`
pub fn encode_snapshot(store: &RecordStore) -> Result<String> {
    Ok(store.to_snapshot_string())
}

/// Decode a snapshot string into a new store.
///
/// Fails with `Serialization` for text that is not JSON and with
/// `MalformedSnapshot` for JSON of the wrong shape.
pub fn decode_snapshot(text: &str) -> Result<RecordStore> {
    let value = FieldValue::from_json_str(text)?;
    RecordStore::from_snapshot_value(&value)
}
