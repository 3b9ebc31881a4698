//! Domain objects and shared object handles.
//!
//! Application types implement [`DomainObject`] and are shared through
//! [`Object`] handles. An object's identity is the identity of its
//! allocation; two handles are equal only if they point at the same object.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use scoop_types::Identifier;

/// Upcasting helpers for [`DomainObject`] trait objects.
///
/// Implemented for every `'static` type; never implement it by hand.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// An application type whose fields are synchronized through the engine.
///
/// Registered types must also implement `Default`: the engine uses it to
/// reconstruct objects it finds in state but has never seen live.
pub trait DomainObject: AsAny {
    /// Stable name the type is registered under. Defaults to the type's own
    /// name without its module path.
    fn display_name() -> &'static str
    where
        Self: Sized,
    {
        short_type_name(std::any::type_name::<Self>())
    }

    /// The object's own identifier, used when it is attached to a store
    /// without an explicit one.
    ///
    /// Read exactly once, before attachment completes. Implementations must
    /// not read store-backed fields here.
    fn identifier(&self) -> Option<Identifier> {
        None
    }
}

/// `my_app::model::Todo<T>` -> `Todo`
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Shared handle to a domain object.
#[derive(Clone)]
pub struct Object(Rc<dyn DomainObject>);

impl Object {
    /// Move `value` into a new shared object.
    pub fn new<T: DomainObject>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// Wrap an existing shared object.
    pub fn from_rc<T: DomainObject>(rc: Rc<T>) -> Self {
        Self(rc)
    }

    /// Identity key: the address of the shared allocation.
    pub fn key(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// The concrete runtime type of the object.
    pub fn runtime_type(&self) -> TypeId {
        <dyn DomainObject as AsAny>::as_any(&*self.0).type_id()
    }

    /// Full name of the concrete runtime type.
    pub fn type_name(&self) -> &'static str {
        <dyn DomainObject as AsAny>::type_name(&*self.0)
    }

    /// Borrow the object as its concrete type.
    pub fn downcast_ref<T: DomainObject>(&self) -> Option<&T> {
        <dyn DomainObject as AsAny>::as_any(&*self.0).downcast_ref::<T>()
    }

    /// A typed handle to the same object.
    pub fn downcast<T: DomainObject>(&self) -> Option<Rc<T>> {
        <dyn DomainObject as AsAny>::into_any(Rc::clone(&self.0))
            .downcast::<T>()
            .ok()
    }

    /// The object's own identifier.
    pub fn identifier(&self) -> Option<Identifier> {
        self.0.identifier()
    }

    /// Returns `true` if both handles point at the same object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        self.key() == other.key()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

impl<T: DomainObject> From<Rc<T>> for Object {
    fn from(rc: Rc<T>) -> Self {
        Self::from_rc(rc)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({:#x})", self.key())
    }
}
