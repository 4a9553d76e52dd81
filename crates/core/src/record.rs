//! Cached records
//!
//! A record is one normalized entity: a shared object node of fields, tagged
//! with its data identifier (`id`) and an optional type discriminator
//! (`typeName`). Record handles are cheap to clone and every clone sees the
//! same fields.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Serialize, Serializer};

use crate::error::{CacheError, Result};
use crate::value::{FieldMap, FieldValue, ObjectNode};

/// Reserved field holding the record's own data identifier
pub const ID_FIELD: &str = "id";

/// Reserved field holding the record's type discriminator
pub const TYPE_NAME_FIELD: &str = "typeName";

/// A cached record
///
/// # Example
///
/// ```
/// use relaycache_core::Record;
///
/// let user = Record::with_identity("user:1", Some("User"));
/// user.set("name", "Ada");
///
/// assert_eq!(user.id().as_deref(), Some("user:1"));
/// assert_eq!(user.type_name().as_deref(), Some("User"));
/// assert_eq!(user.get("name").unwrap().as_str(), Some("Ada"));
/// ```
#[derive(Clone)]
pub struct Record {
    node: ObjectNode,
}

impl Record {
    /// Create a record with no fields
    pub fn new() -> Self {
        Self::from_node(Arc::new(RwLock::new(FieldMap::new())))
    }

    /// Create a record carrying only its identity fields.
    ///
    /// `typeName` is left out entirely when `type_name` is `None`.
    pub fn with_identity(data_id: &str, type_name: Option<&str>) -> Self {
        let mut fields = FieldMap::new();
        fields.insert(ID_FIELD.to_string(), FieldValue::from(data_id));
        if let Some(type_name) = type_name {
            fields.insert(TYPE_NAME_FIELD.to_string(), FieldValue::from(type_name));
        }
        Self::from_node(Arc::new(RwLock::new(fields)))
    }

    /// Wrap an existing object node
    pub fn from_node(node: ObjectNode) -> Self {
        Self { node }
    }

    /// Build a record from a JSON object
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Self::from_value(&FieldValue::from_json(value))
    }

    /// View an object value as a record sharing its node
    pub fn from_value(value: &FieldValue) -> Result<Self> {
        match value {
            FieldValue::Object(node) => Ok(Self::from_node(Arc::clone(node))),
            other => Err(CacheError::malformed(format!(
                "record must be a JSON object, got {}",
                other.kind()
            ))),
        }
    }

    /// The underlying object node
    pub fn node(&self) -> &ObjectNode {
        &self.node
    }

    /// The `id` field, when it holds a string
    pub fn id(&self) -> Option<String> {
        self.get_string(ID_FIELD)
    }

    /// The `typeName` field, when it holds a string
    pub fn type_name(&self) -> Option<String> {
        self.get_string(TYPE_NAME_FIELD)
    }

    fn get_string(&self, field: &str) -> Option<String> {
        self.node
            .read()
            .get(field)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Read a field
    pub fn get(&self, field: &str) -> Option<FieldValue> {
        self.node.read().get(field).cloned()
    }

    /// Set a field, returning the previous value
    pub fn set(&self, field: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        let value = value.into();
        self.node.write().insert(field.into(), value)
    }

    /// Remove a field, returning its value
    pub fn remove(&self, field: &str) -> Option<FieldValue> {
        self.node.write().remove(field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.node.read().contains_key(field)
    }

    /// Field names in ascending order
    pub fn field_names(&self) -> Vec<String> {
        self.node.read().keys().cloned().collect()
    }

    /// Number of fields, reserved ones included
    pub fn len(&self) -> usize {
        self.node.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.node.read().is_empty()
    }

    /// True if both handles point at the same record
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Render as plain JSON (cycle-safe, see [`crate::walk`])
    pub fn to_json(&self) -> serde_json::Value {
        self.as_value().to_json()
    }

    /// View this record as a field value sharing the same node
    pub fn as_value(&self) -> FieldValue {
        FieldValue::Object(Arc::clone(&self.node))
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural equality over fields, same caveat as [`FieldValue`]'s
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.node.read() == *other.node.read()
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record({})", self.to_json())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<Record> for FieldValue {
    fn from(record: Record) -> Self {
        FieldValue::Object(record.node)
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let fields: FieldMap = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_node(Arc::new(RwLock::new(fields)))
    }
}
