//! Normalized pointers between entities in the state tree.
//!
//! A [`Ref`] names one stored entity by its type key and optional identifier.
//! Nested domain objects are never stored inline; the field holds a `Ref`
//! instead and the referenced entity lives in its own slice of the tree.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;

/// A normalized reference to a stored entity.
///
/// A ref with no identifier points at the singleton slice for its type.
/// Equality is `(type, id)`; [`Ref::hash`] gives the string form used to key
/// live instances.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "RefRepr", from = "RefRepr")]
pub struct Ref {
    type_key: String,
    id: Option<Identifier>,
}

impl Ref {
    /// Create a ref to the entity `id` of type `type_key`.
    pub fn new(type_key: impl Into<String>, id: Option<Identifier>) -> Self {
        Self {
            type_key: type_key.into(),
            id,
        }
    }

    /// Create a ref to the singleton slice of `type_key`.
    pub fn singleton(type_key: impl Into<String>) -> Self {
        Self::new(type_key, None)
    }

    /// The registered type key.
    pub fn type_key(&self) -> &str {
        &self.type_key
    }

    /// The entity identifier, or `None` for a singleton.
    pub fn id(&self) -> Option<&Identifier> {
        self.id.as_ref()
    }

    /// Returns `true` if this ref addresses a singleton slice.
    pub fn is_singleton(&self) -> bool {
        self.id.is_none()
    }

    /// String identity: `type` for singletons, `type:id` otherwise.
    pub fn hash(&self) -> String {
        match &self.id {
            None => self.type_key.clone(),
            Some(id) => format!("{}:{id}", self.type_key),
        }
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({})", self.hash())
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash())
    }
}

/// Wire form of a ref. The marker keeps plain data that happens to carry
/// `type`/`id` keys from ever parsing as a ref.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RefRepr {
    #[serde(rename = "@@scoop")]
    marker: RefMarker,
    #[serde(rename = "type")]
    type_key: String,
    id: Option<Identifier>,
}

#[derive(Serialize, Deserialize)]
enum RefMarker {
    #[serde(rename = "ref")]
    Ref,
}

impl From<Ref> for RefRepr {
    fn from(r: Ref) -> Self {
        Self {
            marker: RefMarker::Ref,
            type_key: r.type_key,
            id: r.id,
        }
    }
}

impl From<RefRepr> for Ref {
    fn from(repr: RefRepr) -> Self {
        Self {
            type_key: repr.type_key,
            id: repr.id,
        }
    }
}
