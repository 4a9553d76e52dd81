//! Field values stored inside records
//!
//! This module defines the value model of the cache:
//! - FieldValue: a JSON-shaped value whose arrays and objects are shared nodes
//! - ObjectNode / ArrayNode: reference-counted, interior-mutable containers
//!
//! Arrays and objects are handles, not owned trees. Cloning a `FieldValue`
//! clones the handle, so the same node can be reachable from several records
//! and a record can hold a reference to itself. Node identity (the allocation
//! address) is what the serializer uses to detect repeated references.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::vec;

use parking_lot::RwLock;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::walk::StructuralWalker;

/// Field map of an object node
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Shared object node
pub type ObjectNode = Arc<RwLock<FieldMap>>;

/// Shared array node
pub type ArrayNode = Arc<RwLock<Vec<FieldValue>>>;

/// Identity of a shared node: its allocation address.
pub(crate) fn node_identity<T>(node: &Arc<T>) -> usize {
    Arc::as_ptr(node) as *const () as usize
}

/// A JSON-representable value held in a record field
///
/// # Examples
///
/// ```
/// use relaycache_core::FieldValue;
///
/// let name = FieldValue::from("alice");
/// let age = FieldValue::from(30i64);
/// let tags = FieldValue::from(vec!["a", "b"]);
///
/// assert_eq!(name.as_str(), Some("alice"));
/// assert_eq!(age.as_i64(), Some(30));
/// assert!(tags.is_array());
/// ```
#[derive(Clone)]
pub enum FieldValue {
    /// JSON null
    Null,
    /// JSON boolean
    Bool(bool),
    /// JSON number
    Number(serde_json::Number),
    /// JSON string
    String(String),
    /// Shared list of values
    Array(ArrayNode),
    /// Shared map of values (records are object nodes too)
    Object(ObjectNode),
}

impl FieldValue {
    /// Create a null value
    pub fn null() -> Self {
        FieldValue::Null
    }

    /// Create a fresh, empty object node
    pub fn object() -> Self {
        FieldValue::Object(Arc::new(RwLock::new(FieldMap::new())))
    }

    /// Create a fresh, empty array node
    pub fn array() -> Self {
        FieldValue::Array(Arc::new(RwLock::new(Vec::new())))
    }

    /// Build a value from plain JSON. Every array and object becomes a new node.
    ///
    /// Consumes the input level by level on a heap stack, so nesting depth
    /// is bounded by memory only.
    pub fn from_json(value: serde_json::Value) -> Self {
        let mut stack: Vec<JsonFrame> = Vec::new();
        if let Some(leaf) = JsonFrame::open(value, &mut stack) {
            return leaf;
        }
        loop {
            let next = match stack.last_mut() {
                Some(frame) => frame.next_child(),
                None => return FieldValue::Null,
            };
            match next {
                Some(child) => {
                    if let Some(leaf) = JsonFrame::open(child, &mut stack) {
                        if let Some(parent) = stack.last_mut() {
                            parent.attach(leaf);
                        }
                    }
                }
                None => {
                    let done = match stack.pop() {
                        Some(frame) => frame.finish(),
                        None => return FieldValue::Null,
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.attach(done),
                        None => return done,
                    }
                }
            }
        }
    }

    /// Parse JSON text with no nesting limit.
    ///
    /// serde_json's default 128-level guard is lifted and the parser's stack
    /// grows on the heap as needed, so any text this crate wrote can be read
    /// back.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        let mut de = serde_json::Deserializer::from_str(text);
        de.disable_recursion_limit();
        let value = FieldValue::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        de.end()?;
        Ok(value)
    }

    /// Render as plain JSON.
    ///
    /// Uses the same identity-tracking walk as snapshot serialization, so a
    /// node reached a second time (a cycle or a shared child) is dropped from
    /// the output instead of being expanded again.
    pub fn to_json(&self) -> serde_json::Value {
        StructuralWalker::new()
            .visit(self)
            .unwrap_or(serde_json::Value::Null)
    }

    /// Serialize to a compact JSON string (cycle-safe, like [`Self::to_json`])
    pub fn to_json_string(&self) -> String {
        let mut out = String::new();
        StructuralWalker::new().write_json(self, &mut out);
        out
    }

    /// Identity of the underlying node, `None` for primitives
    pub fn node_id(&self) -> Option<usize> {
        match self {
            FieldValue::Array(node) => Some(node_identity(node)),
            FieldValue::Object(node) => Some(node_identity(node)),
            _ => None,
        }
    }

    /// True if both values are the same node (primitives never are)
    pub fn ptr_eq(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Array(a), FieldValue::Array(b)) => Arc::ptr_eq(a, b),
            (FieldValue::Object(a), FieldValue::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FieldValue::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, FieldValue::Object(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Read a key of an object value
    pub fn get(&self, key: &str) -> Option<FieldValue> {
        match self {
            FieldValue::Object(node) => node.read().get(key).cloned(),
            _ => None,
        }
    }

    /// Set a key of an object value, returning the previous value.
    /// No-op returning `None` on non-objects.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        match self {
            FieldValue::Object(node) => node.write().insert(key.into(), value.into()),
            _ => None,
        }
    }

    /// Append to an array value. Returns false on non-arrays.
    pub fn push(&self, value: impl Into<FieldValue>) -> bool {
        match self {
            FieldValue::Array(node) => {
                node.write().push(value.into());
                true
            }
            _ => false,
        }
    }

    /// Number of children of an array or object, 0 for primitives
    pub fn len(&self) -> usize {
        match self {
            FieldValue::Array(node) => node.read().len(),
            FieldValue::Object(node) => node.read().len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short description of the JSON kind, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "a boolean",
            FieldValue::Number(_) => "a number",
            FieldValue::String(_) => "a string",
            FieldValue::Array(_) => "an array",
            FieldValue::Object(_) => "an object",
        }
    }
}

/// One partially converted array or object in [`FieldValue::from_json`]
enum JsonFrame {
    Object {
        entries: serde_json::map::IntoIter,
        fields: FieldMap,
        pending_key: Option<String>,
    },
    Array {
        items: vec::IntoIter<serde_json::Value>,
        out: Vec<FieldValue>,
    },
}

impl JsonFrame {
    /// Convert a leaf, or push a frame for a container and return `None`
    fn open(value: serde_json::Value, stack: &mut Vec<JsonFrame>) -> Option<FieldValue> {
        match value {
            serde_json::Value::Null => Some(FieldValue::Null),
            serde_json::Value::Bool(b) => Some(FieldValue::Bool(b)),
            serde_json::Value::Number(n) => Some(FieldValue::Number(n)),
            serde_json::Value::String(s) => Some(FieldValue::String(s)),
            serde_json::Value::Array(items) => {
                stack.push(JsonFrame::Array {
                    out: Vec::with_capacity(items.len()),
                    items: items.into_iter(),
                });
                None
            }
            serde_json::Value::Object(map) => {
                stack.push(JsonFrame::Object {
                    entries: map.into_iter(),
                    fields: FieldMap::new(),
                    pending_key: None,
                });
                None
            }
        }
    }

    fn next_child(&mut self) -> Option<serde_json::Value> {
        match self {
            JsonFrame::Object {
                entries,
                pending_key,
                ..
            } => entries.next().map(|(key, child)| {
                *pending_key = Some(key);
                child
            }),
            JsonFrame::Array { items, .. } => items.next(),
        }
    }

    fn attach(&mut self, value: FieldValue) {
        match self {
            JsonFrame::Object {
                fields,
                pending_key,
                ..
            } => {
                if let Some(key) = pending_key.take() {
                    fields.insert(key, value);
                }
            }
            JsonFrame::Array { out, .. } => out.push(value),
        }
    }

    fn finish(self) -> FieldValue {
        match self {
            JsonFrame::Object { fields, .. } => FieldValue::Object(Arc::new(RwLock::new(fields))),
            JsonFrame::Array { out, .. } => FieldValue::Array(Arc::new(RwLock::new(out))),
        }
    }
}

/// Move the children of a node out when this handle is the last one
fn take_children(value: &mut FieldValue, pending: &mut Vec<FieldValue>) {
    match value {
        FieldValue::Object(node) if Arc::strong_count(node) == 1 => {
            pending.extend(std::mem::take(&mut *node.write()).into_values());
        }
        FieldValue::Array(node) if Arc::strong_count(node) == 1 => {
            pending.append(&mut *node.write());
        }
        _ => {}
    }
}

// Releasing the last handle of a deep chain would otherwise recurse once per
// level; children are detached onto a heap list and released one at a time.
impl Drop for FieldValue {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        take_children(self, &mut pending);
        while let Some(mut child) = pending.pop() {
            take_children(&mut child, &mut pending);
        }
    }
}

/// Structural equality.
///
/// Identical nodes compare equal without being inspected. Distinct nodes are
/// compared child by child, so comparing two separately allocated cyclic
/// structures does not terminate; compare their `to_json()` forms instead.
impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Number(a), FieldValue::Number(b)) => a == b,
            (FieldValue::String(a), FieldValue::String(b)) => a == b,
            (FieldValue::Array(a), FieldValue::Array(b)) => {
                Arc::ptr_eq(a, b) || *a.read() == *b.read()
            }
            (FieldValue::Object(a), FieldValue::Object(b)) => {
                Arc::ptr_eq(a, b) || *a.read() == *b.read()
            }
            _ => false,
        }
    }
}

// Debug goes through the cycle-safe walk; a derived impl would recurse forever
impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldValue({})", self.to_json_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_string())
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::null()
    }
}

impl FromStr for FieldValue {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldValue::from_json_str(s)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldValueVisitor)
    }
}

struct FieldValueVisitor;

impl<'de> Visitor<'de> for FieldValueVisitor {
    type Value = FieldValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<FieldValue, E> {
        Ok(FieldValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<FieldValue, E> {
        Ok(FieldValue::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldValue, E> {
        Ok(FieldValue::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<FieldValue, E> {
        Ok(FieldValue::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldValue, E> {
        Ok(FieldValue::from(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<FieldValue, E> {
        Ok(FieldValue::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<FieldValue, E> {
        Ok(FieldValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<FieldValue, E> {
        Ok(FieldValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<FieldValue, D::Error> {
        FieldValue::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<FieldValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<FieldValue>()? {
            items.push(item);
        }
        Ok(FieldValue::Array(Arc::new(RwLock::new(items))))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FieldValue, A::Error> {
        let mut fields = FieldMap::new();
        while let Some((key, value)) = map.next_entry::<String, FieldValue>()? {
            fields.insert(key, value);
        }
        Ok(FieldValue::Object(Arc::new(RwLock::new(fields))))
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        FieldValue::from_json(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Number(v.into())
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Number(v.into())
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Number(v.into())
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Number(v.into())
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        serde_json::Number::from_f64(v).map_or(FieldValue::Null, FieldValue::Number)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(v: Vec<T>) -> Self {
        FieldValue::Array(Arc::new(RwLock::new(
            v.into_iter().map(Into::into).collect(),
        )))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => FieldValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_value_primitives() {
        assert!(FieldValue::null().is_null());
        assert_eq!(FieldValue::from(true).as_bool(), Some(true));
        assert_eq!(FieldValue::from(42i32).as_i64(), Some(42));
        assert_eq!(FieldValue::from(7u64).as_i64(), Some(7));
        assert_eq!(FieldValue::from(1.5f64).as_f64(), Some(1.5));
        assert_eq!(FieldValue::from("x").as_str(), Some("x"));
        assert_eq!(FieldValue::from(String::from("y")).as_str(), Some("y"));
    }

    #[test]
    fn test_field_value_f64_nan_is_null() {
        assert!(FieldValue::from(f64::NAN).is_null());
    }

    #[test]
    fn test_field_value_from_option() {
        assert_eq!(FieldValue::from(Some(3i64)).as_i64(), Some(3));
        assert!(FieldValue::from(None::<i64>).is_null());
    }

    #[test]
    fn test_from_json_builds_fresh_nodes() {
        let raw = json!({"a": [1, 2], "b": {"c": "d"}});
        let v1 = FieldValue::from_json(raw.clone());
        let v2 = FieldValue::from_json(raw.clone());
        assert!(!v1.ptr_eq(&v2));
        assert_eq!(v1, v2);
        assert_eq!(v1.to_json(), raw);
    }

    #[test]
    fn test_clone_shares_node() {
        let obj = FieldValue::object();
        let alias = obj.clone();
        alias.insert("k", 1i64);
        assert!(obj.ptr_eq(&alias));
        assert_eq!(obj.get("k").and_then(|v| v.as_i64()), Some(1));
    }

    #[test]
    fn test_primitives_have_no_identity() {
        assert!(FieldValue::from(1i64).node_id().is_none());
        assert!(!FieldValue::from(1i64).ptr_eq(&FieldValue::from(1i64)));
        assert!(FieldValue::array().node_id().is_some());
    }

    #[test]
    fn test_insert_on_non_object_is_noop() {
        let s = FieldValue::from("text");
        assert!(s.insert("k", 1i64).is_none());
        assert!(!s.push(1i64));
        assert_eq!(s.len(), 0);
    }

    #[test]
    fn test_push_and_len() {
        let arr = FieldValue::array();
        assert!(arr.is_empty());
        assert!(arr.push("a"));
        assert!(arr.push(2i64));
        assert_eq!(arr.len(), 2);
        assert_eq!(arr.to_json(), json!(["a", 2]));
    }

    #[test]
    fn test_parse_and_display() {
        let v: FieldValue = r#"{"x": [true, null]}"#.parse().unwrap();
        assert_eq!(v.to_string(), r#"{"x":[true,null]}"#);
        assert!("{".parse::<FieldValue>().is_err());
    }

    #[test]
    fn test_debug_on_self_reference_terminates() {
        let obj = FieldValue::object();
        obj.insert("me", obj.clone());
        let debug = format!("{:?}", obj);
        assert_eq!(debug, "FieldValue({})");
    }

    #[test]
    fn test_serde_roundtrip_through_json() {
        let v = FieldValue::from_json(json!({"n": 1, "s": "two"}));
        let text = serde_json::to_string(&v).unwrap();
        let back: FieldValue = serde_json::from_str(&text).unwrap();
        assert_eq!(v, back);
    }

    fn nested_arrays(depth: usize) -> String {
        format!("{}0{}", "[".repeat(depth), "]".repeat(depth))
    }

    #[test]
    fn test_parse_beyond_default_nesting_limit() {
        let text = nested_arrays(10_000);
        let v: FieldValue = text.parse().unwrap();
        assert_eq!(v.to_json_string(), text);
    }

    #[test]
    fn test_parse_rejects_trailing_garbage() {
        assert!(FieldValue::from_json_str("{} {}").is_err());
        assert!(FieldValue::from_json_str("[1,]").is_err());
    }

    #[test]
    fn test_deserialize_numbers_and_duplicates() {
        let v = FieldValue::from_json_str(r#"{"a": -3, "b": 18446744073709551615, "c": 0.5, "a": 4}"#)
            .unwrap();
        assert_eq!(v.get("a").unwrap().as_i64(), Some(4));
        assert_eq!(v.to_json()["b"], json!(u64::MAX));
        assert_eq!(v.get("c").unwrap().as_f64(), Some(0.5));
    }

    #[test]
    fn test_from_json_deep_input() {
        let mut raw = json!("leaf");
        for _ in 0..10_000 {
            raw = serde_json::Value::Array(vec![raw]);
        }
        let v = FieldValue::from_json(raw);
        let text = v.to_json_string();
        assert!(text.starts_with("[[[["));
        assert!(text.contains(r#""leaf""#));
    }

    #[test]
    fn test_drop_of_deep_chain() {
        let head = FieldValue::object();
        let mut current = head.clone();
        for _ in 0..200_000 {
            let next = FieldValue::object();
            current.insert("next", next.clone());
            current = next;
        }
        drop(current);
        drop(head);
    }

    #[test]
    fn test_drop_keeps_shared_children() {
        let child = FieldValue::from_json(json!({"k": 1}));
        let parent = FieldValue::object();
        parent.insert("c", child.clone());
        drop(parent);
        assert_eq!(child.to_json(), json!({"k": 1}));
    }

    #[test]
    fn test_kind() {
        assert_eq!(FieldValue::Null.kind(), "null");
        assert_eq!(FieldValue::array().kind(), "an array");
        assert_eq!(FieldValue::from("s").kind(), "a string");
    }
}
