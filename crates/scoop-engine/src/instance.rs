//! Live binding between one domain object and its field state.

use std::any::TypeId;
use std::cell::{OnceCell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};
use std::future::Future;
use std::rc::{Rc, Weak};

use tracing::debug;

use scoop_types::Identifier;

use crate::error::{EngineError, Result};
use crate::object::Object;
use crate::pending::{PendingSet, PendingWait};
use crate::store::Store;
use crate::value::FieldValue;

type FieldListener = Rc<dyn Fn(&FieldValue)>;

/// The engine's view of one domain object.
///
/// Until it is attached to a [`Store`] an instance is a plain value holder:
/// reads and writes go to its local cache. Once attached, the store's
/// container is the source of truth and the cache mirrors it. Attachment
/// happens at most once.
pub struct Instance {
    wrapped: Object,
    type_id: TypeId,
    id: RefCell<Option<Identifier>>,
    store: OnceCell<Weak<Store>>,
    fields: RefCell<BTreeMap<String, FieldValue>>,
    listeners: RefCell<HashMap<String, Vec<FieldListener>>>,
    pendings: PendingSet,
}

impl Instance {
    pub(crate) fn new(wrapped: Object, type_id: TypeId) -> Self {
        Self {
            wrapped,
            type_id,
            id: RefCell::new(None),
            store: OnceCell::new(),
            fields: RefCell::new(BTreeMap::new()),
            listeners: RefCell::new(HashMap::new()),
            pendings: PendingSet::new(),
        }
    }

    /// The wrapped domain object.
    pub fn value(&self) -> &Object {
        &self.wrapped
    }

    /// The type the instance's fields are registered under.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.wrapped.type_name()
    }

    /// Resolved identifier; `None` for singletons and detached instances.
    pub fn id(&self) -> Option<Identifier> {
        self.id.borrow().clone()
    }

    pub fn is_attached(&self) -> bool {
        self.store.get().is_some()
    }

    /// The attached store, if any.
    pub fn store(&self) -> Result<Option<Rc<Store>>> {
        match self.store.get() {
            None => Ok(None),
            Some(store) => store
                .upgrade()
                .map(Some)
                .ok_or_else(|| EngineError::StoreReleased {
                    type_name: self.type_name().to_string(),
                }),
        }
    }

    /// Attach to `store`.
    ///
    /// Attaching to the store already attached is a no-op; any other store
    /// is rejected. Without an explicit `id` the wrapped object's own
    /// identifier is used when the engine is configured to allow it.
    pub fn set_store(self: &Rc<Self>, store: &Rc<Store>, id: Option<Identifier>) -> Result<()> {
        self.attach(store, id, true)
    }

    /// Attach with `id` taken as given, never falling back to the object's
    /// own identifier.
    pub(crate) fn attach_exact(self: &Rc<Self>, store: &Rc<Store>, id: Option<Identifier>) -> Result<()> {
        self.attach(store, id, false)
    }

    fn attach(self: &Rc<Self>, store: &Rc<Store>, id: Option<Identifier>, fallback: bool) -> Result<()> {
        if let Some(current) = self.store.get() {
            return if std::ptr::eq(current.as_ptr(), Rc::as_ptr(store)) {
                Ok(())
            } else {
                Err(EngineError::StoreConflict {
                    type_name: self.type_name().to_string(),
                })
            };
        }
        store.type_key(self)?;

        // The id must be settled before the store is set: once attached,
        // reads route through the store, which keys on the id.
        let id = match id {
            Some(id) => Some(id),
            None if fallback && store.config().implicit_identifiers => self.wrapped.identifier(),
            None => None,
        };
        *self.id.borrow_mut() = id;

        if self.store.set(Rc::downgrade(store)).is_err() {
            return Err(EngineError::StoreConflict {
                type_name: self.type_name().to_string(),
            });
        }

        let weak = Rc::downgrade(self);
        store.on_fields(self, move |fields| {
            if let Some(instance) = weak.upgrade() {
                instance.update_fields(fields);
            }
        })?;

        debug!(
            type_name = self.type_name(),
            id = ?self.id.borrow(),
            "instance attached"
        );
        Ok(())
    }

    /// Read a field: from the store when attached, from the cache otherwise.
    /// A field never written reads as `Null`.
    pub fn get_field_value(&self, name: &str) -> Result<FieldValue> {
        match self.store()? {
            Some(store) => store.field_value(self, name),
            None => Ok(self.fields.borrow().get(name).cloned().unwrap_or_default()),
        }
    }

    /// Write a field: through the store when attached, into the cache
    /// otherwise.
    pub fn set_field_value(self: &Rc<Self>, name: &str, value: FieldValue) -> Result<()> {
        match self.store()? {
            Some(store) => store.set_field_value(self, name, value),
            None => {
                self.update_fields(BTreeMap::from([(name.to_string(), value)]));
                Ok(())
            }
        }
    }

    /// Merge `incoming` into the cache, then notify listeners of the fields
    /// whose value actually changed.
    pub fn update_fields(&self, incoming: BTreeMap<String, FieldValue>) {
        let mut changed = Vec::new();
        {
            let mut fields = self.fields.borrow_mut();
            for (name, value) in incoming {
                if fields.get(&name) != Some(&value) {
                    changed.push((name.clone(), value.clone()));
                }
                fields.insert(name, value);
            }
        }

        for (name, value) in changed {
            let listeners = self
                .listeners
                .borrow()
                .get(&name)
                .cloned()
                .unwrap_or_default();
            for listener in listeners {
                listener(&value);
            }
        }
    }

    /// Call `listener` with the new value whenever field `name` changes.
    pub fn on_field_value(&self, name: &str, listener: impl Fn(&FieldValue) + 'static) {
        self.listeners
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push(Rc::new(listener));
    }

    /// Snapshot of the cached fields.
    pub fn fields(&self) -> BTreeMap<String, FieldValue> {
        self.fields.borrow().clone()
    }

    /// Track an asynchronous operation that mutates this instance.
    ///
    /// Must be called from within a [`tokio::task::LocalSet`].
    pub fn register_pending<F, T, E>(&self, op: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<T, E>> + 'static,
        T: 'static,
        E: Display + 'static,
    {
        self.pendings.register(op)
    }

    /// A wait over the operations outstanding right now, or `None`.
    pub fn get_pending(&self) -> Option<PendingWait> {
        self.pendings.wait()
    }

    pub fn pending_count(&self) -> usize {
        self.pendings.len()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name())
            .field("id", &self.id.borrow())
            .field("attached", &self.is_attached())
            .field("fields", &self.fields.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::object::DomainObject;

    #[derive(Default)]
    struct Note;
    impl DomainObject for Note {}

    fn detached() -> Rc<Instance> {
        let object = Object::new(Note);
        let type_id = object.runtime_type();
        Rc::new(Instance::new(object, type_id))
    }

    #[test]
    fn detached_instance_is_a_value_holder() {
        let instance = detached();
        assert!(!instance.is_attached());
        assert_eq!(instance.get_field_value("text").unwrap(), FieldValue::Null);

        instance.set_field_value("text", "hi".into()).unwrap();
        assert_eq!(instance.get_field_value("text").unwrap(), FieldValue::from("hi"));
        assert_eq!(instance.fields().len(), 1);
    }

    #[test]
    fn listeners_fire_only_on_change() {
        let instance = detached();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        instance.on_field_value("text", move |_| counter.set(counter.get() + 1));

        instance.update_fields(BTreeMap::from([("text".to_string(), "a".into())]));
        instance.update_fields(BTreeMap::from([("text".to_string(), "a".into())]));
        assert_eq!(calls.get(), 1);

        instance.update_fields(BTreeMap::from([("text".to_string(), "b".into())]));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn unrelated_fields_do_not_notify() {
        let instance = detached();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        instance.on_field_value("text", move |_| counter.set(counter.get() + 1));

        instance.set_field_value("other", 1.into()).unwrap();
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn listener_sees_new_value_and_may_reenter() {
        let instance = detached();
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        let weak = Rc::downgrade(&instance);
        instance.on_field_value("text", move |value| {
            // Reading the instance from inside a listener must not deadlock
            // on its own cache.
            let current = weak.upgrade().unwrap().get_field_value("text").unwrap();
            assert_eq!(&current, value);
            *sink.borrow_mut() = Some(value.clone());
        });

        instance.set_field_value("text", "x".into()).unwrap();
        assert_eq!(*seen.borrow(), Some(FieldValue::from("x")));
    }

    #[test]
    fn no_pending_without_operations() {
        let instance = detached();
        assert!(instance.get_pending().is_none());
        assert_eq!(instance.pending_count(), 0);
    }
}
