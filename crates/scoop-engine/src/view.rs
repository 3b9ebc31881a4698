//! Pluggable view-layer integration.
//!
//! A UI framework tells the engine which objects it owns through a
//! [`ViewAdapter`]. View-owned objects are attached to their owning
//! container automatically when first seen, and are purged from live
//! registries between render passes.

use std::any::TypeId;
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use tracing::info;

use scoop_state::StateContainer;
use scoop_types::Identifier;

use crate::error::{EngineError, Result};
use crate::object::Object;

/// Capabilities a view layer provides to the engine.
pub trait ViewAdapter {
    /// Returns `true` if `object` is owned by the view layer.
    fn is_view_component(&self, object: &Object) -> bool;

    /// The type the component's fields are registered under.
    fn view_component_type(&self, component: &Object) -> TypeId {
        component.runtime_type()
    }

    /// The container that owns the component's state.
    fn view_component_store(&self, component: &Object) -> Option<Rc<dyn StateContainer>>;

    /// The component's identity within its type.
    fn view_component_id(&self, component: &Object) -> Option<Identifier>;
}

/// Adapter for hosts without a view layer: nothing is view-owned.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeadlessView;

impl ViewAdapter for HeadlessView {
    fn is_view_component(&self, _object: &Object) -> bool {
        false
    }

    fn view_component_store(&self, _component: &Object) -> Option<Rc<dyn StateContainer>> {
        None
    }

    fn view_component_id(&self, _component: &Object) -> Option<Identifier> {
        None
    }
}

/// Holds the one view adapter of an engine.
pub struct ViewRegistry {
    adapter: OnceCell<Rc<dyn ViewAdapter>>,
    required: bool,
}

impl ViewRegistry {
    /// Create an empty registry. With `required`, every query before
    /// registration fails with [`EngineError::ViewNotRegistered`].
    pub fn new(required: bool) -> Self {
        Self {
            adapter: OnceCell::new(),
            required,
        }
    }

    /// Install the adapter. Only one registration is accepted.
    pub fn register(&self, adapter: Rc<dyn ViewAdapter>) -> Result<()> {
        self.adapter
            .set(adapter)
            .map_err(|_| EngineError::ViewAlreadyRegistered)?;
        info!("view adapter registered");
        Ok(())
    }

    /// Returns `true` once an adapter is installed.
    pub fn is_registered(&self) -> bool {
        self.adapter.get().is_some()
    }

    fn adapter(&self) -> Result<Option<&Rc<dyn ViewAdapter>>> {
        match self.adapter.get() {
            Some(adapter) => Ok(Some(adapter)),
            None if self.required => Err(EngineError::ViewNotRegistered),
            None => Ok(None),
        }
    }

    pub fn is_view_component(&self, object: &Object) -> Result<bool> {
        Ok(self
            .adapter()?
            .is_some_and(|adapter| adapter.is_view_component(object)))
    }

    pub fn view_component_type(&self, component: &Object) -> Result<TypeId> {
        Ok(match self.adapter()? {
            Some(adapter) => adapter.view_component_type(component),
            None => component.runtime_type(),
        })
    }

    pub fn view_component_store(&self, component: &Object) -> Result<Rc<dyn StateContainer>> {
        self.adapter()?
            .and_then(|adapter| adapter.view_component_store(component))
            .ok_or_else(|| unbound(component, "no owning container"))
    }

    pub fn view_component_id(&self, component: &Object) -> Result<Identifier> {
        self.adapter()?
            .and_then(|adapter| adapter.view_component_id(component))
            .ok_or_else(|| unbound(component, "no identifier"))
    }
}

fn unbound(component: &Object, reason: &str) -> EngineError {
    EngineError::UnboundViewComponent {
        type_name: component.type_name().to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRegistry")
            .field("registered", &self.is_registered())
            .field("required", &self.required)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::DomainObject;

    #[derive(Default)]
    struct Widget;
    impl DomainObject for Widget {}

    #[test]
    fn queries_before_registration_fail_when_required() {
        let views = ViewRegistry::new(true);
        let obj = Object::new(Widget);
        assert_eq!(
            views.is_view_component(&obj),
            Err(EngineError::ViewNotRegistered)
        );
        assert_eq!(
            views.view_component_id(&obj).unwrap_err(),
            EngineError::ViewNotRegistered
        );
    }

    #[test]
    fn optional_registry_treats_objects_as_plain() {
        let views = ViewRegistry::new(false);
        let obj = Object::new(Widget);
        assert_eq!(views.is_view_component(&obj), Ok(false));
        assert_eq!(
            views.view_component_type(&obj),
            Ok(TypeId::of::<Widget>())
        );
    }

    #[test]
    fn registers_exactly_once() {
        let views = ViewRegistry::new(true);
        views.register(Rc::new(HeadlessView)).unwrap();
        assert!(views.is_registered());
        assert_eq!(
            views.register(Rc::new(HeadlessView)),
            Err(EngineError::ViewAlreadyRegistered)
        );
    }

    #[test]
    fn headless_view_owns_nothing() {
        let views = ViewRegistry::new(true);
        views.register(Rc::new(HeadlessView)).unwrap();
        let obj = Object::new(Widget);
        assert_eq!(views.is_view_component(&obj), Ok(false));
        assert!(matches!(
            views.view_component_store(&obj),
            Err(EngineError::UnboundViewComponent { .. })
        ));
    }
}
