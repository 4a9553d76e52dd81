//! Record store
//!
//! Two maps, both keyed by string:
//! - records: data identifier -> Record
//! - root calls: storage key -> data identifier
//!
//! # Design
//!
//! - FxHashMap: O(1) lookups, fast non-crypto hash
//! - Records are shared handles: a record returned by `read_node` is the
//!   stored record, not a copy
//! - No referential checks between the maps: a root call may name a data id
//!   that has no record, and then resolves to nothing on `read_node`
//!
//! # Snapshot shape
//!
//! ```text
//! { "records": { <dataId>: { ...fields } }, "rootCallMap": { <storageKey>: <dataId> } }
//! ```
//!
//! Records and root calls are emitted in ascending key order through a single
//! [`StructuralWalker`], so a record node already emitted (as a field of an
//! earlier record, or under an earlier data id) is absent at every later
//! site. See [`relaycache_core::walk`] for why this loss is accepted.

use relaycache_core::{write_json_str, CacheError, FieldValue, Record, Result, StructuralWalker};
use rustc_hash::FxHashMap;

/// Snapshot key of the records section
pub const RECORDS_KEY: &str = "records";

/// Snapshot key of the root-call section
pub const ROOT_CALL_MAP_KEY: &str = "rootCallMap";

/// In-memory container of records and root-call mappings
///
/// # Example
///
/// ```
/// use relaycache_storage::RecordStore;
///
/// let mut store = RecordStore::new();
/// store.write_field("1", "name", "x".into(), Some("User"));
/// store.write_root_call("viewer", "1");
///
/// let id = store.root_call("viewer").unwrap();
/// let record = store.read_node(&id).unwrap();
/// assert_eq!(record.get("name").unwrap().as_str(), Some("x"));
/// ```
#[derive(Default)]
pub struct RecordStore {
    records: FxHashMap<String, Record>,
    root_calls: FxHashMap<String, String>,
}

impl RecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with room for `records` records
    pub fn with_capacity(records: usize) -> Self {
        Self {
            records: FxHashMap::with_capacity_and_hasher(records, Default::default()),
            root_calls: FxHashMap::default(),
        }
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Get the record for `data_id`
    ///
    /// `None` is the "not found" result; a miss is never an error.
    #[inline]
    pub fn read_node(&self, data_id: &str) -> Option<Record> {
        self.records.get(data_id).cloned()
    }

    /// Store `record` under `data_id`, replacing whatever was there.
    ///
    /// No merge: fields of the previous record are not carried over.
    #[inline]
    pub fn write_record(&mut self, data_id: impl Into<String>, record: Record) {
        self.records.insert(data_id.into(), record);
    }

    /// Set one field of the record at `data_id`.
    ///
    /// A missing record is created first with `id = data_id` and `typeName`
    /// when given. Existing fields other than `field` are kept; `type_name`
    /// is ignored for records that already exist.
    pub fn write_field(
        &mut self,
        data_id: &str,
        field: impl Into<String>,
        value: FieldValue,
        type_name: Option<&str>,
    ) {
        let record = self
            .records
            .entry(data_id.to_string())
            .or_insert_with(|| Record::with_identity(data_id, type_name));
        record.set(field, value);
    }

    /// Check if a record exists
    #[inline]
    pub fn contains_node(&self, data_id: &str) -> bool {
        self.records.contains_key(data_id)
    }

    /// Remove a record, returning it
    pub fn remove_node(&mut self, data_id: &str) -> Option<Record> {
        self.records.remove(data_id)
    }

    /// Data identifiers in ascending order
    pub fn data_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.records.keys().cloned().collect();
        ids.sort();
        ids
    }

    // ========================================================================
    // Root calls
    // ========================================================================

    /// Resolve a root-call storage key to a data identifier
    #[inline]
    pub fn root_call(&self, storage_key: &str) -> Option<String> {
        self.root_calls.get(storage_key).cloned()
    }

    /// Map `storage_key` to `data_id`, overwriting any previous mapping.
    /// The target record does not have to exist.
    #[inline]
    pub fn write_root_call(&mut self, storage_key: impl Into<String>, data_id: impl Into<String>) {
        self.root_calls.insert(storage_key.into(), data_id.into());
    }

    // ========================================================================
    // Size
    // ========================================================================

    /// Number of records
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Number of root-call mappings
    pub fn root_call_count(&self) -> usize {
        self.root_calls.len()
    }

    /// True if both maps are empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.root_calls.is_empty()
    }

    /// Drop every record and mapping
    pub fn clear(&mut self) {
        self.records.clear();
        self.root_calls.clear();
    }

    // ========================================================================
    // Snapshot form
    // ========================================================================

    /// Produce the JSON snapshot of the whole store.
    ///
    /// Never recurses without bound: cycles and repeated nodes are cut by the
    /// structural walk, and the repeated site is omitted.
    pub fn to_serializable(&self) -> serde_json::Value {
        let mut walker = StructuralWalker::new();

        let mut records = serde_json::Map::with_capacity(self.records.len());
        for data_id in self.data_ids() {
            if let Some(record) = self.records.get(&data_id) {
                if let Some(rendered) = walker.visit_object(record.node()) {
                    records.insert(data_id, rendered);
                }
            }
        }

        let mut keys: Vec<&String> = self.root_calls.keys().collect();
        keys.sort();
        let mut root_calls = serde_json::Map::with_capacity(keys.len());
        for key in keys {
            root_calls.insert(
                key.clone(),
                serde_json::Value::String(self.root_calls[key].clone()),
            );
        }

        let mut snapshot = serde_json::Map::with_capacity(2);
        snapshot.insert(RECORDS_KEY.to_string(), serde_json::Value::Object(records));
        snapshot.insert(
            ROOT_CALL_MAP_KEY.to_string(),
            serde_json::Value::Object(root_calls),
        );
        serde_json::Value::Object(snapshot)
    }

    /// Write the snapshot of the whole store as compact JSON text.
    ///
    /// Same content and key order as `serde_json::to_string` of
    /// [`Self::to_serializable`], produced without building the JSON tree, so
    /// arbitrarily deep record chains encode in bounded stack.
    pub fn to_snapshot_string(&self) -> String {
        let mut walker = StructuralWalker::new();
        let mut out = String::new();

        out.push('{');
        write_json_str(&mut out, RECORDS_KEY);
        out.push_str(":{");
        let mut first = true;
        for data_id in self.data_ids() {
            let Some(record) = self.records.get(&data_id) else {
                continue;
            };
            if walker.has_seen_object(record.node()) {
                continue;
            }
            if !std::mem::replace(&mut first, false) {
                out.push(',');
            }
            write_json_str(&mut out, &data_id);
            out.push(':');
            walker.write_object(record.node(), &mut out);
        }
        out.push_str("},");

        write_json_str(&mut out, ROOT_CALL_MAP_KEY);
        out.push_str(":{");
        let mut keys: Vec<&String> = self.root_calls.keys().collect();
        keys.sort();
        for (i, key) in keys.into_iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_json_str(&mut out, key);
            out.push(':');
            write_json_str(&mut out, &self.root_calls[key]);
        }
        out.push_str("}}");
        out
    }

    /// Rebuild a store from a snapshot produced by [`Self::to_serializable`].
    ///
    /// A missing section is read as empty. Anything else that does not match
    /// the snapshot shape is a [`CacheError::MalformedSnapshot`]; the caller
    /// decides how to recover.
    pub fn from_serializable(value: serde_json::Value) -> Result<Self> {
        Self::from_snapshot_value(&FieldValue::from_json(value))
    }

    /// Rebuild a store from an already parsed snapshot.
    ///
    /// Records share the nodes of `value`; nothing is copied.
    pub fn from_snapshot_value(value: &FieldValue) -> Result<Self> {
        if !value.is_object() {
            return Err(CacheError::malformed(format!(
                "snapshot must be an object, got {}",
                value.kind()
            )));
        }

        let mut store = RecordStore::new();

        let records_section = value.get(RECORDS_KEY);
        match &records_section {
            None | Some(FieldValue::Null) => {}
            Some(FieldValue::Object(records)) => {
                let records = records.read();
                store.records.reserve(records.len());
                for (data_id, raw) in records.iter() {
                    if !raw.is_object() {
                        return Err(CacheError::malformed(format!(
                            "record '{}' must be an object, got {}",
                            data_id,
                            raw.kind()
                        )));
                    }
                    store.records.insert(data_id.clone(), Record::from_value(raw)?);
                }
            }
            Some(other) => {
                return Err(CacheError::malformed(format!(
                    "'{}' must be an object, got {}",
                    RECORDS_KEY,
                    other.kind()
                )))
            }
        }

        let root_call_section = value.get(ROOT_CALL_MAP_KEY);
        match &root_call_section {
            None | Some(FieldValue::Null) => {}
            Some(FieldValue::Object(root_calls)) => {
                for (key, target) in root_calls.read().iter() {
                    match target.as_str() {
                        Some(data_id) => {
                            store.root_calls.insert(key.clone(), data_id.to_string());
                        }
                        None => {
                            return Err(CacheError::malformed(format!(
                                "root call '{}' must map to a string, got {}",
                                key,
                                target.kind()
                            )))
                        }
                    }
                }
            }
            Some(other) => {
                return Err(CacheError::malformed(format!(
                    "'{}' must be an object, got {}",
                    ROOT_CALL_MAP_KEY,
                    other.kind()
                )))
            }
        }

        tracing::debug!(
            target: "relaycache::storage",
            records = store.record_count(),
            root_calls = store.root_call_count(),
            "Rebuilt record store from snapshot"
        );
        Ok(store)
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("record_count", &self.record_count())
            .field("root_call_count", &self.root_call_count())
            .finish()
    }
}
