//! The engine's normalized sub-tree.
//!
//! The tree maps a type key to either a singleton field map (entities without
//! an identifier) or a keyed collection of field maps. Field values are
//! [`StoredValue`]s, so nested entities only ever appear as refs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use scoop_types::{FieldMap, Ref, StoredValue};

use crate::error::{Result, StateError};

/// All state for one registered type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "TypeSliceRepr", from = "TypeSliceRepr")]
pub enum TypeSlice {
    /// The single, id-less entity of this type.
    Singleton(FieldMap),
    /// Entities keyed by identifier.
    Collection(BTreeMap<String, FieldMap>),
}

impl TypeSlice {
    /// Returns `true` if this slice is a keyed collection.
    pub fn is_collection(&self) -> bool {
        matches!(self, TypeSlice::Collection(_))
    }

    /// Number of entities held by this slice.
    pub fn entity_count(&self) -> usize {
        match self {
            TypeSlice::Singleton(_) => 1,
            TypeSlice::Collection(entries) => entries.len(),
        }
    }
}

/// Serialized shape of a [`TypeSlice`]. Collections carry the
/// `"@@scoop": "instances"` marker next to their entries.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TypeSliceRepr {
    Collection {
        #[serde(rename = "@@scoop")]
        marker: CollectionMarker,
        #[serde(flatten)]
        entries: BTreeMap<String, FieldMap>,
    },
    Singleton(FieldMap),
}

#[derive(Serialize, Deserialize)]
enum CollectionMarker {
    #[serde(rename = "instances")]
    Instances,
}

impl From<TypeSlice> for TypeSliceRepr {
    fn from(slice: TypeSlice) -> Self {
        match slice {
            TypeSlice::Singleton(fields) => TypeSliceRepr::Singleton(fields),
            TypeSlice::Collection(entries) => TypeSliceRepr::Collection {
                marker: CollectionMarker::Instances,
                entries,
            },
        }
    }
}

impl From<TypeSliceRepr> for TypeSlice {
    fn from(repr: TypeSliceRepr) -> Self {
        match repr {
            TypeSliceRepr::Singleton(fields) => TypeSlice::Singleton(fields),
            TypeSliceRepr::Collection { entries, .. } => TypeSlice::Collection(entries),
        }
    }
}

/// The engine's private, normalized state tree.
///
/// Values are immutable snapshots: the reducer produces a new tree for every
/// accepted action and never mutates one in place.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineState {
    types: BTreeMap<String, TypeSlice>,
}

impl EngineState {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a tree from its JSON form, e.g. state rendered on another host.
    pub fn from_json(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(StateError::InvalidState(format!(
                "expected an object, got {value}"
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Export the tree as JSON.
    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// The slice stored for `type_key`, if any.
    pub fn type_slice(&self, type_key: &str) -> Option<&TypeSlice> {
        self.types.get(type_key)
    }

    /// Iterate over `(type key, slice)` pairs in key order.
    pub fn types(&self) -> impl Iterator<Item = (&str, &TypeSlice)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns `true` if nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Total number of stored entities across all types.
    pub fn entity_count(&self) -> usize {
        self.types.values().map(TypeSlice::entity_count).sum()
    }

    /// Returns `true` if the entity `r` points at exists.
    ///
    /// A singleton ref exists as soon as its type has any slice.
    pub fn contains(&self, r: &Ref) -> bool {
        match (self.types.get(r.type_key()), r.id()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(TypeSlice::Collection(entries)), Some(id)) => entries.contains_key(&id.key()),
            (Some(TypeSlice::Singleton(_)), Some(_)) => false,
        }
    }

    /// The field map of the entity `r` points at.
    pub fn slice(&self, r: &Ref) -> Option<&FieldMap> {
        match (self.types.get(r.type_key())?, r.id()) {
            (TypeSlice::Singleton(fields), None) => Some(fields),
            (TypeSlice::Collection(entries), Some(id)) => entries.get(&id.key()),
            _ => None,
        }
    }

    /// A single stored field of the entity `r` points at.
    pub fn field(&self, r: &Ref, name: &str) -> Option<&StoredValue> {
        self.slice(r)?.get(name)
    }

    /// Refs held anywhere in the tree whose target entity does not exist.
    pub fn dangling_refs(&self) -> Vec<Ref> {
        let mut dangling = Vec::new();
        let mut check = |r: &Ref| {
            if !self.contains(r) && !dangling.contains(r) {
                dangling.push(r.clone());
            }
        };
        for slice in self.types.values() {
            match slice {
                TypeSlice::Singleton(fields) => {
                    fields.values().for_each(|v| v.for_each_ref(&mut check));
                }
                TypeSlice::Collection(entries) => {
                    for fields in entries.values() {
                        fields.values().for_each(|v| v.for_each_ref(&mut check));
                    }
                }
            }
        }
        dangling
    }

    pub(crate) fn types_mut(&mut self) -> &mut BTreeMap<String, TypeSlice> {
        &mut self.types
    }
}
