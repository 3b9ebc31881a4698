//! Bijective registry between runtime types and stable string keys.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::object::{DomainObject, Object};

#[derive(Clone)]
struct TypeEntry {
    type_id: TypeId,
    type_name: &'static str,
    construct: fn() -> Object,
}

fn construct<T: DomainObject + Default>() -> Object {
    Object::new(T::default())
}

/// Maps each registered domain type to the key its entities are stored
/// under, and back.
///
/// The first registration under a name wins; a different type claiming the
/// same name is rejected.
#[derive(Default)]
pub struct TypeRegistry {
    by_key: RefCell<BTreeMap<String, TypeEntry>>,
    by_type: RefCell<HashMap<TypeId, String>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its display name and return that key.
    ///
    /// Registering the same type again is a no-op.
    pub fn register<T: DomainObject + Default>(&self) -> Result<String> {
        let type_id = TypeId::of::<T>();
        if let Some(key) = self.by_type.borrow().get(&type_id) {
            return Ok(key.clone());
        }

        let name = T::display_name();
        let mut by_key = self.by_key.borrow_mut();
        if by_key.contains_key(name) {
            return Err(EngineError::TypeNameConflict {
                name: name.to_string(),
            });
        }
        by_key.insert(
            name.to_string(),
            TypeEntry {
                type_id,
                type_name: std::any::type_name::<T>(),
                construct: construct::<T>,
            },
        );
        self.by_type.borrow_mut().insert(type_id, name.to_string());

        debug!(key = name, type_name = std::any::type_name::<T>(), "registered type");
        Ok(name.to_string())
    }

    /// Returns `true` if `type_id` has been registered.
    pub fn has_type(&self, type_id: TypeId) -> bool {
        self.by_type.borrow().contains_key(&type_id)
    }

    /// The key registered for `type_id`.
    pub fn key_of_type(&self, type_id: TypeId) -> Option<String> {
        self.by_type.borrow().get(&type_id).cloned()
    }

    /// The type registered under `key`.
    pub fn type_of_key(&self, key: &str) -> Option<TypeId> {
        self.by_key.borrow().get(key).map(|entry| entry.type_id)
    }

    /// The key for the runtime type of `object`, or an error if its type was
    /// never registered.
    pub fn require_key(&self, object: &Object) -> Result<String> {
        self.require_type_key(object.runtime_type(), object.type_name())
    }

    pub(crate) fn require_type_key(&self, type_id: TypeId, type_name: &str) -> Result<String> {
        self.key_of_type(type_id)
            .ok_or_else(|| EngineError::UnregisteredType {
                type_name: type_name.to_string(),
            })
    }

    /// Build a fresh object of the type registered under `key` using its
    /// `Default` constructor.
    pub fn construct(&self, key: &str) -> Result<Object> {
        let construct = self
            .by_key
            .borrow()
            .get(key)
            .map(|entry| entry.construct)
            .ok_or_else(|| EngineError::UnknownTypeKey {
                key: key.to_string(),
            })?;
        Ok(construct())
    }

    /// All registered keys in order.
    pub fn keys(&self) -> Vec<String> {
        self.by_key.borrow().keys().cloned().collect()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.by_key.borrow().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_key.borrow().is_empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let by_key = self.by_key.borrow();
        f.debug_map()
            .entries(by_key.iter().map(|(k, e)| (k, e.type_name)))
            .finish()
    }
}
