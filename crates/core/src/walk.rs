//! Identity-tracking structural walk
//!
//! Converts shared value graphs into plain JSON without unbounded recursion.
//!
//! # Algorithm
//!
//! The walk is depth-first and carries a set of node identities (allocation
//! addresses, never value equality). On reaching an array or object node:
//!
//! - already in the set: the value is omitted at this site
//! - otherwise: the node is recorded, then its children are walked
//!
//! Primitives pass through unchanged.
//!
//! Nesting lives on an explicit frame stack on the heap, never on the call
//! stack, so a chain of records tens of thousands of levels deep renders like
//! a flat one. A node's children are copied out (handle clones) under a short
//! read lock when the node is entered; no lock is held while its children
//! are walked.
//!
//! # Lossy second reference
//!
//! Omission is not limited to cycles. Any node reachable through two paths
//! is written at the first site the walk reaches and left out at every later
//! one. An omitted object field disappears from its parent; an omitted array
//! element is written as `null` so the positions of its siblings survive.
//! Decoding such output does not restore the sharing. This is the accepted
//! behavior of snapshots: cycles never break a flush, and shared values are
//! never expanded twice.

use std::sync::Arc;
use std::vec;

use rustc_hash::FxHashSet;

use crate::value::{node_identity, ArrayNode, FieldValue, ObjectNode};

/// Append `s` to `out` as a JSON string literal
pub fn write_json_str(out: &mut String, s: &str) {
    out.push_str(&serde_json::Value::from(s).to_string());
}

fn leaf_json(value: &FieldValue) -> serde_json::Value {
    match value {
        FieldValue::Bool(b) => serde_json::Value::Bool(*b),
        FieldValue::Number(n) => serde_json::Value::Number(n.clone()),
        FieldValue::String(s) => serde_json::Value::String(s.clone()),
        _ => serde_json::Value::Null,
    }
}

fn object_entries(node: &ObjectNode) -> vec::IntoIter<(String, FieldValue)> {
    let entries: Vec<(String, FieldValue)> = node
        .read()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    entries.into_iter()
}

fn array_items(node: &ArrayNode) -> vec::IntoIter<FieldValue> {
    let items = node.read().clone();
    items.into_iter()
}

/// Partially built output of one open node
enum BuildFrame {
    Object {
        entries: vec::IntoIter<(String, FieldValue)>,
        map: serde_json::Map<String, serde_json::Value>,
        pending_key: Option<String>,
    },
    Array {
        items: vec::IntoIter<FieldValue>,
        out: Vec<serde_json::Value>,
    },
}

impl BuildFrame {
    fn next_child(&mut self) -> Option<FieldValue> {
        match self {
            BuildFrame::Object {
                entries,
                pending_key,
                ..
            } => entries.next().map(|(key, child)| {
                *pending_key = Some(key);
                child
            }),
            BuildFrame::Array { items, .. } => items.next(),
        }
    }

    fn attach(&mut self, value: serde_json::Value) {
        match self {
            BuildFrame::Object {
                map, pending_key, ..
            } => {
                if let Some(key) = pending_key.take() {
                    map.insert(key, value);
                }
            }
            BuildFrame::Array { out, .. } => out.push(value),
        }
    }

    fn omit(&mut self) {
        match self {
            BuildFrame::Object { pending_key, .. } => *pending_key = None,
            BuildFrame::Array { out, .. } => out.push(serde_json::Value::Null),
        }
    }

    fn finish(self) -> serde_json::Value {
        match self {
            BuildFrame::Object { map, .. } => serde_json::Value::Object(map),
            BuildFrame::Array { out, .. } => serde_json::Value::Array(out),
        }
    }
}

/// Remaining children of one open node in text output
enum TextFrame {
    Object {
        entries: vec::IntoIter<(String, FieldValue)>,
        first: bool,
    },
    Array {
        items: vec::IntoIter<FieldValue>,
        first: bool,
    },
}

enum Entered {
    Leaf(serde_json::Value),
    Opened,
    Repeat,
}

/// Depth-first JSON renderer with a visited set of node identities.
///
/// One walker is used for one logical output. Reusing it across several
/// `visit` calls makes nodes already emitted by an earlier call absent in
/// later ones, which is how a whole store is rendered as a single structure.
#[derive(Debug, Default)]
pub struct StructuralWalker {
    seen: FxHashSet<usize>,
}

impl StructuralWalker {
    /// Create a walker with an empty visited set
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `value`. `None` means the value was already emitted and must be
    /// left out at this site.
    pub fn visit(&mut self, value: &FieldValue) -> Option<serde_json::Value> {
        let mut stack: Vec<BuildFrame> = Vec::new();
        match self.enter(value, &mut stack) {
            Entered::Leaf(json) => return Some(json),
            Entered::Repeat => return None,
            Entered::Opened => {}
        }

        loop {
            let child = stack.last_mut()?.next_child();
            let Some(child) = child else {
                let done = stack.pop()?.finish();
                match stack.last_mut() {
                    Some(parent) => parent.attach(done),
                    None => return Some(done),
                }
                continue;
            };
            match self.enter(&child, &mut stack) {
                Entered::Opened => {}
                Entered::Leaf(json) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.attach(json);
                    }
                }
                Entered::Repeat => {
                    if let Some(parent) = stack.last_mut() {
                        parent.omit();
                    }
                }
            }
        }
    }

    /// Render an object node, `None` if already emitted
    pub fn visit_object(&mut self, node: &ObjectNode) -> Option<serde_json::Value> {
        self.visit(&FieldValue::Object(Arc::clone(node)))
    }

    /// Render an array node, `None` if already emitted
    pub fn visit_array(&mut self, node: &ArrayNode) -> Option<serde_json::Value> {
        self.visit(&FieldValue::Array(Arc::clone(node)))
    }

    fn enter(&mut self, value: &FieldValue, stack: &mut Vec<BuildFrame>) -> Entered {
        match value {
            FieldValue::Object(node) => {
                if !self.seen.insert(node_identity(node)) {
                    return Entered::Repeat;
                }
                let entries = object_entries(node);
                stack.push(BuildFrame::Object {
                    map: serde_json::Map::with_capacity(entries.len()),
                    entries,
                    pending_key: None,
                });
                Entered::Opened
            }
            FieldValue::Array(node) => {
                if !self.seen.insert(node_identity(node)) {
                    return Entered::Repeat;
                }
                let items = array_items(node);
                stack.push(BuildFrame::Array {
                    out: Vec::with_capacity(items.len()),
                    items,
                });
                Entered::Opened
            }
            leaf => Entered::Leaf(leaf_json(leaf)),
        }
    }

    /// Append `value` to `out` as compact JSON text.
    ///
    /// Returns false, writing nothing, if the value is a node that was
    /// already emitted. Output matches `serde_json::to_string` of
    /// [`Self::visit`]'s result without building the intermediate tree.
    pub fn write_json(&mut self, value: &FieldValue, out: &mut String) -> bool {
        let mut stack: Vec<TextFrame> = Vec::new();
        if !self.open_text(value, out, &mut stack) {
            return false;
        }

        while let Some(frame) = stack.last_mut() {
            let child = match frame {
                TextFrame::Object { entries, first } => match entries.next() {
                    None => {
                        out.push('}');
                        None
                    }
                    Some((key, child)) => {
                        if self.has_seen(&child) {
                            continue;
                        }
                        if !std::mem::replace(first, false) {
                            out.push(',');
                        }
                        write_json_str(out, &key);
                        out.push(':');
                        Some(child)
                    }
                },
                TextFrame::Array { items, first } => match items.next() {
                    None => {
                        out.push(']');
                        None
                    }
                    Some(child) => {
                        if !std::mem::replace(first, false) {
                            out.push(',');
                        }
                        if self.has_seen(&child) {
                            out.push_str("null");
                            continue;
                        }
                        Some(child)
                    }
                },
            };
            match child {
                Some(child) => {
                    self.open_text(&child, out, &mut stack);
                }
                None => {
                    stack.pop();
                }
            }
        }
        true
    }

    /// Text form of [`Self::write_json`] for an object node
    pub fn write_object(&mut self, node: &ObjectNode, out: &mut String) -> bool {
        self.write_json(&FieldValue::Object(Arc::clone(node)), out)
    }

    fn open_text(&mut self, value: &FieldValue, out: &mut String, stack: &mut Vec<TextFrame>) -> bool {
        match value {
            FieldValue::Null => out.push_str("null"),
            FieldValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            FieldValue::Number(n) => out.push_str(&n.to_string()),
            FieldValue::String(s) => write_json_str(out, s),
            FieldValue::Object(node) => {
                if !self.seen.insert(node_identity(node)) {
                    return false;
                }
                out.push('{');
                stack.push(TextFrame::Object {
                    entries: object_entries(node),
                    first: true,
                });
            }
            FieldValue::Array(node) => {
                if !self.seen.insert(node_identity(node)) {
                    return false;
                }
                out.push('[');
                stack.push(TextFrame::Array {
                    items: array_items(node),
                    first: true,
                });
            }
        }
        true
    }

    /// Check whether a node has already been emitted
    pub fn has_seen(&self, value: &FieldValue) -> bool {
        value
            .node_id()
            .map(|id| self.seen.contains(&id))
            .unwrap_or(false)
    }

    /// Check whether an object node has already been emitted
    pub fn has_seen_object(&self, node: &ObjectNode) -> bool {
        self.seen.contains(&node_identity(node))
    }

    /// Number of distinct nodes emitted so far
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
