//! Synchronization between one state container and its attached instances.
//!
//! A [`Store`] owns the live-instance registry for its container. It turns
//! field writes into normalized CREATE / UPDATE actions (dehydrating nested
//! objects into refs on the way in) and turns container notifications back
//! into hydrated per-instance field updates.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, info, warn};

use scoop_state::{diff_slices, EngineAction, EngineState, StateContainer, TypeSlice};
use scoop_types::{FieldMap, Identifier, Ref, StoredValue, NAMESPACE};

use crate::config::EngineConfig;
use crate::engine::EngineInner;
use crate::error::{EngineError, Result};
use crate::instance::Instance;
use crate::object::Object;
use crate::pending::{join_waits, PendingWait};
use crate::value::{FieldType, FieldValue};

/// The engine's binding to one [`StateContainer`].
pub struct Store {
    engine: Weak<EngineInner>,
    config: EngineConfig,
    container: Rc<dyn StateContainer>,
    /// Live instances keyed by ref hash.
    instances: RefCell<HashMap<String, Rc<Instance>>>,
    /// Refs whose CREATE is being assembled; reaching one again means the
    /// object graph has a cycle.
    creating: RefCell<HashSet<String>>,
}

impl Store {
    pub(crate) fn new(engine: &Rc<EngineInner>, container: Rc<dyn StateContainer>) -> Rc<Self> {
        let entities = container.engine_state().entity_count();
        let store = Rc::new(Self {
            engine: Rc::downgrade(engine),
            config: engine.config.clone(),
            container,
            instances: RefCell::new(HashMap::new()),
            creating: RefCell::new(HashSet::new()),
        });
        info!(entities, "store created");
        store
    }

    fn engine(&self) -> Result<Rc<EngineInner>> {
        self.engine.upgrade().ok_or(EngineError::EngineDropped)
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn container(&self) -> &Rc<dyn StateContainer> {
        &self.container
    }

    /// The container's latest engine state.
    pub fn state(&self) -> Rc<EngineState> {
        self.container.engine_state()
    }

    pub(crate) fn type_key(&self, instance: &Instance) -> Result<String> {
        self.engine()?
            .types
            .require_type_key(instance.type_id(), instance.type_name())
    }

    /// The ref `instance` is stored under. Does not attach or create.
    pub fn ref_of(&self, instance: &Instance) -> Result<Ref> {
        Ok(Ref::new(self.type_key(instance)?, instance.id()))
    }

    pub fn has_instance(&self, target: &Ref) -> bool {
        self.instances.borrow().contains_key(&target.hash())
    }

    pub fn has_instance_at(&self, type_key: &str, id: Option<&Identifier>) -> bool {
        self.has_instance(&Ref::new(type_key, id.cloned()))
    }

    /// Number of live instances.
    pub fn instance_count(&self) -> usize {
        self.instances.borrow().len()
    }

    /// Add `instance` to the live registry without touching state. An entry
    /// already registered under the same ref is kept.
    pub(crate) fn register(&self, instance: &Rc<Instance>) -> Result<Ref> {
        let target = self.ref_of(instance)?;
        self.instances
            .borrow_mut()
            .entry(target.hash())
            .or_insert_with(|| Rc::clone(instance));
        Ok(target)
    }

    /// Attach `instance` if needed and make sure its entity exists in state.
    ///
    /// The first call for an entity missing from state dispatches a CREATE
    /// seeded with the instance's cached fields. An entity already in state
    /// is only registered as live. An entity whose id does not fit the
    /// stored slice kind of its type is rejected before anything is written.
    pub fn get_ref(self: &Rc<Self>, instance: &Rc<Instance>) -> Result<Ref> {
        instance.set_store(self, None)?;
        let target = self.ref_of(instance)?;
        self.check_slice_kind(&target)?;
        if self.state().contains(&target) {
            self.register(instance)?;
            return Ok(target);
        }

        let hash = target.hash();
        if !self.creating.borrow_mut().insert(hash.clone()) {
            return Ok(target);
        }
        self.register(instance)?;
        let data = self.dehydrate_fields(&instance.fields());
        self.creating.borrow_mut().remove(&hash);
        let data = data?;

        debug!(entity = %target, fields = data.len(), "create");
        self.container.dispatch_engine(EngineAction::Create {
            target: target.clone(),
            data,
        });
        Ok(target)
    }

    fn check_slice_kind(&self, target: &Ref) -> Result<()> {
        let state = self.state();
        let stored = match (state.type_slice(target.type_key()), target.id()) {
            (Some(TypeSlice::Collection(_)), None) => "keyed collection",
            (Some(TypeSlice::Singleton(_)), Some(_)) => "singleton",
            _ => return Ok(()),
        };
        warn!(entity = %target, stored, "entity does not fit its type's slice");
        Err(EngineError::SliceKindConflict {
            entity: target.to_string(),
            stored,
        })
    }

    /// Hydrated value of field `name` of `instance`; `Null` if the field was
    /// never stored.
    pub fn field_value(self: &Rc<Self>, instance: &Instance, name: &str) -> Result<FieldValue> {
        let target = self.ref_of(instance)?;
        let state = self.state();
        match state.field(&target, name) {
            Some(value) => self.hydrate(value),
            None => Ok(FieldValue::Null),
        }
    }

    /// Write field `name` of `instance`.
    ///
    /// Writing the value already stored dispatches nothing.
    pub fn set_field_value(
        self: &Rc<Self>,
        instance: &Rc<Instance>,
        name: &str,
        value: FieldValue,
    ) -> Result<()> {
        let target = self.get_ref(instance)?;
        let stored = self.dehydrate(&value)?;
        if self.state().field(&target, name) == Some(&stored) {
            debug!(entity = %target, field = name, "write skipped, value unchanged");
            return Ok(());
        }

        debug!(entity = %target, field = name, "update");
        self.container.dispatch_engine(EngineAction::Update {
            target,
            data: FieldMap::from([(name.to_string(), stored)]),
        });
        Ok(())
    }

    /// Turn a stored value into a domain value, resolving refs to objects.
    ///
    /// A ref missing from the current state is kept as plain data: a map in
    /// the ref's wire shape, which dehydrates back to the same ref.
    pub fn hydrate(self: &Rc<Self>, value: &StoredValue) -> Result<FieldValue> {
        Ok(match value {
            StoredValue::Null => FieldValue::Null,
            StoredValue::Bool(b) => FieldValue::Bool(*b),
            StoredValue::Number(n) => FieldValue::Number(n.clone()),
            StoredValue::String(s) => FieldValue::String(s.clone()),
            StoredValue::List(items) => FieldValue::List(
                items
                    .iter()
                    .map(|item| self.hydrate(item))
                    .collect::<Result<_>>()?,
            ),
            StoredValue::Map(map) => FieldValue::Map(
                map.iter()
                    .map(|(key, item)| Ok((key.clone(), self.hydrate(item)?)))
                    .collect::<Result<_>>()?,
            ),
            StoredValue::Ref(target) => {
                if self.state().contains(target) {
                    FieldValue::Object(self.resolve(target)?)
                } else {
                    warn!(entity = %target, "ref not in state, hydrated as data");
                    unresolved_ref(target)
                }
            }
        })
    }

    /// Turn a domain value into a stored value. Nested objects are replaced
    /// by their refs, creating their entities if needed.
    pub fn dehydrate(self: &Rc<Self>, value: &FieldValue) -> Result<StoredValue> {
        Ok(match value {
            FieldValue::Null => StoredValue::Null,
            FieldValue::Bool(b) => StoredValue::Bool(*b),
            FieldValue::Number(n) => StoredValue::Number(n.clone()),
            FieldValue::String(s) => StoredValue::String(s.clone()),
            FieldValue::List(items) => StoredValue::List(
                items
                    .iter()
                    .map(|item| self.dehydrate(item))
                    .collect::<Result<_>>()?,
            ),
            FieldValue::Map(map) => match ref_from_data(map) {
                Some(target) => StoredValue::Ref(target),
                None => StoredValue::Map(
                    map.iter()
                        .map(|(key, item)| Ok((key.clone(), self.dehydrate(item)?)))
                        .collect::<Result<_>>()?,
                ),
            },
            FieldValue::Object(object) => {
                let instance = self.engine()?.instance(object)?;
                StoredValue::Ref(self.get_ref(&instance)?)
            }
        })
    }

    fn dehydrate_fields(self: &Rc<Self>, fields: &BTreeMap<String, FieldValue>) -> Result<FieldMap> {
        fields
            .iter()
            .map(|(name, value)| Ok((name.clone(), self.dehydrate(value)?)))
            .collect()
    }

    fn hydrate_fields(self: &Rc<Self>, fields: Option<&FieldMap>) -> Result<BTreeMap<String, FieldValue>> {
        fields
            .into_iter()
            .flatten()
            .map(|(name, value)| Ok((name.clone(), self.hydrate(value)?)))
            .collect()
    }

    /// The live object for `target`, constructing and attaching a fresh one
    /// if none is registered.
    fn resolve(self: &Rc<Self>, target: &Ref) -> Result<Object> {
        let live = self.instances.borrow().get(&target.hash()).cloned();
        if let Some(instance) = live {
            return Ok(instance.value().clone());
        }

        let engine = self.engine()?;
        let object = engine.types.construct(target.type_key())?;
        let instance = engine.instance(&object)?;
        instance.attach_exact(self, target.id().cloned())?;
        self.register(&instance)?;
        debug!(entity = %target, "instance constructed from state");
        Ok(object)
    }

    /// Call `listener` with every hydrated field of `instance` after each
    /// container notification in which its slice changed.
    ///
    /// Nothing fires on subscribe.
    pub fn on_fields(
        self: &Rc<Self>,
        instance: &Instance,
        listener: impl Fn(BTreeMap<String, FieldValue>) + 'static,
    ) -> Result<()> {
        let target = self.ref_of(instance)?;
        let last = RefCell::new(self.state().slice(&target).cloned());
        let store = Rc::downgrade(self);

        self.container.subscribe(Rc::new(move || {
            let Some(store) = store.upgrade() else {
                return;
            };
            // Mid-graph CREATEs would hydrate refs to entities not yet in
            // state. The outermost CREATE notifies again once the graph is
            // complete.
            if !store.creating.borrow().is_empty() {
                return;
            }
            let state = store.state();
            let current = state.slice(&target);
            if diff_slices(last.borrow().as_ref(), current).is_empty() {
                return;
            }
            *last.borrow_mut() = current.cloned();

            match store.hydrate_fields(current) {
                Ok(fields) => listener(fields),
                Err(error) => warn!(entity = %target, %error, "field change notification dropped"),
            }
        }));
        Ok(())
    }

    /// Drop every live instance owned by the view layer. Returns how many
    /// were removed.
    pub fn delete_view_instances(&self) -> Result<usize> {
        let engine = self.engine()?;
        let live: Vec<(String, Rc<Instance>)> = self
            .instances
            .borrow()
            .iter()
            .map(|(hash, instance)| (hash.clone(), Rc::clone(instance)))
            .collect();

        let mut doomed = Vec::new();
        for (hash, instance) in live {
            if engine.views.is_view_component(instance.value())? {
                doomed.push(hash);
            }
        }

        let mut instances = self.instances.borrow_mut();
        for hash in &doomed {
            instances.remove(hash);
        }
        debug!(purged = doomed.len(), remaining = instances.len(), "view instances purged");
        Ok(doomed.len())
    }

    /// A wait over every live instance's outstanding operations, or `None`
    /// if nothing is pending.
    pub fn get_pending(&self) -> Option<PendingWait> {
        let live: Vec<Rc<Instance>> = self.instances.borrow().values().cloned().collect();
        join_waits(live.iter().filter_map(|instance| instance.get_pending()).collect())
    }
}

/// `target` as plain data, for refs that cannot be resolved.
fn unresolved_ref(target: &Ref) -> FieldValue {
    let id = target.id().cloned().map_or(FieldValue::Null, Identifier::into_value);
    FieldValue::Map(BTreeMap::from([
        (NAMESPACE.to_string(), FieldValue::from("ref")),
        ("type".to_string(), FieldValue::from(target.type_key())),
        ("id".to_string(), id),
    ]))
}

/// The ref encoded by `map`, if it has exactly the ref wire shape.
fn ref_from_data(map: &BTreeMap<String, FieldValue>) -> Option<Ref> {
    if map.len() != 3 || map.get(NAMESPACE)?.as_str()? != "ref" {
        return None;
    }
    let type_key = map.get("type")?.as_str()?;
    let id = match map.get("id")? {
        FieldValue::Null => None,
        other => Some(Identifier::from_value(other.clone())?),
    };
    Some(Ref::new(type_key, id))
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("instances", &self.instances.borrow().len())
            .field("entities", &self.state().entity_count())
            .finish()
    }
}
