//! The engine: composition root for registries and handle tables.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::future::Future;
use std::rc::Rc;

use tracing::debug;

use scoop_state::StateContainer;
use scoop_types::{Identifier, Ref};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::instance::Instance;
use crate::object::{DomainObject, Object};
use crate::pending::PendingWait;
use crate::store::Store;
use crate::types::TypeRegistry;
use crate::view::{ViewAdapter, ViewRegistry};

pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    pub(crate) types: TypeRegistry,
    pub(crate) views: ViewRegistry,
    instances: RefCell<HashMap<usize, Rc<Instance>>>,
    stores: RefCell<HashMap<usize, Rc<Store>>>,
}

fn container_key(container: &dyn StateContainer) -> usize {
    std::ptr::from_ref(container).cast::<()>() as usize
}

impl EngineInner {
    /// The instance for `object`, created on first access.
    ///
    /// A view-owned object is attached to its owning container at its
    /// view-assigned id before it is handed out.
    pub(crate) fn instance(self: &Rc<Self>, object: &Object) -> Result<Rc<Instance>> {
        let existing = self.instances.borrow().get(&object.key()).cloned();
        if let Some(instance) = existing {
            return Ok(instance);
        }

        let view_owned = self.views.is_view_component(object)?;
        let type_id = if view_owned {
            self.views.view_component_type(object)?
        } else {
            object.runtime_type()
        };
        let instance = Rc::new(Instance::new(object.clone(), type_id));

        if view_owned {
            let store = self.store(self.views.view_component_store(object)?);
            let id = self.views.view_component_id(object)?;
            let key = self.types.require_type_key(type_id, object.type_name())?;
            if store.has_instance_at(&key, Some(&id)) {
                return Err(EngineError::DuplicateViewInstance {
                    entity: Ref::new(key, Some(id)).to_string(),
                });
            }
            instance.set_store(&store, Some(id))?;
            store.register(&instance)?;
        }

        self.instances
            .borrow_mut()
            .insert(object.key(), Rc::clone(&instance));
        Ok(instance)
    }

    /// The store for `container`, created on first access.
    pub(crate) fn store(self: &Rc<Self>, container: Rc<dyn StateContainer>) -> Rc<Store> {
        let key = container_key(&*container);
        let existing = self.stores.borrow().get(&key).cloned();
        if let Some(store) = existing {
            return store;
        }
        let store = Store::new(self, container);
        self.stores.borrow_mut().insert(key, Rc::clone(&store));
        store
    }

    fn existing_store(&self, container: &dyn StateContainer) -> Option<Rc<Store>> {
        self.stores.borrow().get(&container_key(container)).cloned()
    }
}

/// Owns the type and view registries and the identity-keyed instance and
/// store tables.
///
/// Cloning an `Engine` yields another handle to the same engine.
///
/// ```ignore
/// let engine = Engine::with_config(EngineConfig::headless());
/// engine.register_type::<Todo>()?;
/// let container = MemoryContainer::engine_only();
/// let todo = engine.attach(&Object::new(Todo::default()), container.clone(), Some(1.into()))?;
/// todo.set_field_value("done", true.into())?;
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

impl Engine {
    /// Create an engine with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let views = ViewRegistry::new(config.require_view_adapter);
        Self {
            inner: Rc::new(EngineInner {
                config,
                types: TypeRegistry::new(),
                views,
                instances: RefCell::new(HashMap::new()),
                stores: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.inner.types
    }

    /// Register `T` and return its key.
    pub fn register_type<T: DomainObject + Default>(&self) -> Result<String> {
        self.inner.types.register::<T>()
    }

    /// Install the view adapter. Accepted once per engine.
    pub fn register_view(&self, adapter: Rc<dyn ViewAdapter>) -> Result<()> {
        self.inner.views.register(adapter)
    }

    /// The instance for `object`, created on first access.
    pub fn instance(&self, object: &Object) -> Result<Rc<Instance>> {
        self.inner.instance(object)
    }

    /// The store for `container`, created on first access.
    pub fn store(&self, container: Rc<dyn StateContainer>) -> Rc<Store> {
        self.inner.store(container)
    }

    /// Look up the instance of `object` and attach it to the store of
    /// `container`.
    pub fn attach(
        &self,
        object: &Object,
        container: Rc<dyn StateContainer>,
        id: Option<Identifier>,
    ) -> Result<Rc<Instance>> {
        let instance = self.instance(object)?;
        let store = self.store(container);
        instance.set_store(&store, id)?;
        Ok(instance)
    }

    /// Forget the instance of `object`. Returns `false` if there was none.
    pub fn release_object(&self, object: &Object) -> bool {
        self.inner
            .instances
            .borrow_mut()
            .remove(&object.key())
            .is_some()
    }

    /// Forget the store of `container`. Instances attached to it fail with
    /// [`EngineError::StoreReleased`] afterwards.
    pub fn release_store(&self, container: &dyn StateContainer) -> bool {
        self.inner
            .stores
            .borrow_mut()
            .remove(&container_key(container))
            .is_some()
    }

    /// Purge view-owned instances from the store of `container`, typically
    /// between render passes. Returns how many were removed.
    pub fn reset_render(&self, container: &dyn StateContainer) -> Result<usize> {
        match self.inner.existing_store(container) {
            Some(store) => store.delete_view_instances(),
            None => Ok(0),
        }
    }

    /// A wait over every outstanding operation of the instances live in the
    /// store of `container`, or `None` if nothing is pending.
    pub fn get_pending(&self, container: &dyn StateContainer) -> Option<PendingWait> {
        self.inner.existing_store(container)?.get_pending()
    }

    /// Run `op` as a pending operation of `object`'s instance.
    ///
    /// Must be called from within a [`tokio::task::LocalSet`].
    pub fn track_pending<F, T, E>(&self, object: &Object, op: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<T, E>> + 'static,
        T: 'static,
        E: Display + 'static,
    {
        let instance = self.instance(object)?;
        debug!(type_name = instance.type_name(), "tracking pending operation");
        instance.register_pending(op)
    }

    /// Number of instances in the handle table.
    pub fn instance_count(&self) -> usize {
        self.inner.instances.borrow().len()
    }

    /// Number of stores in the handle table.
    pub fn store_count(&self) -> usize {
        self.inner.stores.borrow().len()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("types", &self.inner.types)
            .field("views", &self.inner.views)
            .field("instances", &self.instance_count())
            .field("stores", &self.store_count())
            .finish()
    }
}
