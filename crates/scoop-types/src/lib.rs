//! Foundation types for scoop.
//!
//! scoop keeps plain domain objects in sync with a single normalized state
//! tree. This crate holds the vocabulary every other scoop crate shares: how
//! an entity is identified, how one entity points at another inside the tree,
//! and what a stored field value may look like.
//!
//! # Key Types
//!
//! - [`Identifier`]: Entity identifier, either an integer or a string
//! - [`Ref`]: Normalized pointer `{type, id}` to a stored entity
//! - [`StoredValue`]: Dehydrated field value as it lives in the state tree
//! - [`FieldMap`]: Field name to stored value map for one entity

pub mod error;
pub mod identifier;
pub mod refs;
pub mod value;

pub use error::TypeError;
pub use identifier::Identifier;
pub use refs::Ref;
pub use value::{FieldMap, StoredValue};

/// Reserved namespace: prefixes engine action types, keys the engine's
/// sub-tree inside the host state, and marks refs and keyed collections.
pub const NAMESPACE: &str = "@@scoop";
