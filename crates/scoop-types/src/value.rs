//! Dehydrated field values.
//!
//! Everything stored in the state tree is a [`StoredValue`]: primitives,
//! null, nested plain structures, or [`Ref`]s. Raw domain objects never
//! appear here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::refs::Ref;

/// Field name to stored value for one entity.
pub type FieldMap = BTreeMap<String, StoredValue>;

/// A field value as it lives in the normalized state tree.
///
/// Refs are a distinct variant, so nothing has to sniff plain maps to decide
/// whether they point at another entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<StoredValue>),
    Ref(Ref),
    Map(BTreeMap<String, StoredValue>),
}

impl StoredValue {
    /// Returns `true` for [`StoredValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, StoredValue::Null)
    }

    /// The ref held by this value, if it is one.
    pub fn as_ref(&self) -> Option<&Ref> {
        match self {
            StoredValue::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Visit every ref reachable from this value, depth first.
    pub fn for_each_ref(&self, f: &mut impl FnMut(&Ref)) {
        match self {
            StoredValue::Ref(r) => f(r),
            StoredValue::List(items) => items.iter().for_each(|v| v.for_each_ref(f)),
            StoredValue::Map(map) => map.values().for_each(|v| v.for_each_ref(f)),
            _ => {}
        }
    }
}

impl From<bool> for StoredValue {
    fn from(b: bool) -> Self {
        StoredValue::Bool(b)
    }
}

impl From<i64> for StoredValue {
    fn from(n: i64) -> Self {
        StoredValue::Number(n.into())
    }
}

impl From<i32> for StoredValue {
    fn from(n: i32) -> Self {
        StoredValue::Number(n.into())
    }
}

impl From<f64> for StoredValue {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(StoredValue::Null, StoredValue::Number)
    }
}

impl From<&str> for StoredValue {
    fn from(s: &str) -> Self {
        StoredValue::String(s.to_string())
    }
}

impl From<String> for StoredValue {
    fn from(s: String) -> Self {
        StoredValue::String(s)
    }
}

impl From<Ref> for StoredValue {
    fn from(r: Ref) -> Self {
        StoredValue::Ref(r)
    }
}
