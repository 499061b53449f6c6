//! The Blueprint value model.
//!
//! `Value` is a tagged tree that can carry either materialized data or an
//! opaque reference to a not-yet-produced node result. `Deferred` may
//! appear anywhere a `Value` may appear, including nested inside `List`,
//! `Map`, and `Struct` — the plan builder walks arbitrarily nested `Value`s
//! to collect data dependencies (see [`crate::plan::collect_deferred`]).

use crate::node::NodeId;
use std::collections::BTreeMap;
use std::fmt;

/// An opaque handle returned by every intrinsic: a placeholder for a plan
/// node's result that has not been produced yet.
///
/// `Deferred` is intentionally cheap — a single `NodeId` — and carries no
/// value itself. Scripts may not branch on, compare, or otherwise observe
/// one directly; doing so is a [`crate::error::ScriptError::DeferredObserved`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deferred(pub NodeId);

impl Deferred {
    pub fn node_id(self) -> NodeId {
        self.0
    }
}

impl fmt::Display for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deferred({})", self.0)
    }
}

impl From<Deferred> for Value {
    fn from(d: Deferred) -> Self {
        Value::Deferred(d.0)
    }
}

/// A key usable in `Value::Map` — either a string or an integer, per the
/// data model.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum MapKey {
    String(String),
    Int(i64),
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::String(s) => write!(f, "{s}"),
            MapKey::Int(i) => write!(f, "{i}"),
        }
    }
}

/// The Blueprint tagged value union.
///
/// `PartialEq` is derived for test convenience and for the `eq`/`ne`
/// compute kinds; comparing two `Value::Deferred` this way is a kernel
/// implementation detail and is never how scripts are meant to branch on
/// a deferred — that path is blocked earlier, at intrinsic-argument
/// validation time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<MapKey, Value>),
    Struct(BTreeMap<String, Value>),
    /// An unresolved reference to another node's result.
    Deferred(NodeId),
}

impl Value {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Value::Deferred(_))
    }

    pub fn as_deferred(&self) -> Option<NodeId> {
        match self {
            Value::Deferred(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Walks this value (including nested `List`/`Map`/`Struct`) and
    /// collects every `NodeId` referenced by a nested `Deferred`.
    ///
    /// This is the mechanism by which `PlanBuilder::new_node` derives
    /// `data_deps` from `args` without the caller declaring them
    /// explicitly.
    pub fn collect_deferred(&self, out: &mut Vec<NodeId>) {
        match self {
            Value::Deferred(id) => out.push(*id),
            Value::List(items) => {
                for item in items {
                    item.collect_deferred(out);
                }
            }
            Value::Map(entries) => {
                for v in entries.values() {
                    v.collect_deferred(out);
                }
            }
            Value::Struct(fields) => {
                for v in fields.values() {
                    v.collect_deferred(out);
                }
            }
            _ => {}
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}
impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}
