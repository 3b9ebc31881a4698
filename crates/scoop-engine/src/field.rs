//! Typed field accessors.
//!
//! A [`Field`] names one field of one domain type and converts between the
//! engine's [`FieldValue`] and a Rust type. Reads and writes go through the
//! target's [`Instance`](crate::Instance), so they follow the detached or
//! attached routing of that instance.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::object::{DomainObject, Object};
use crate::value::{FieldType, FieldValue};

/// Accessor for field `name` of objects of type `O`, holding `T` values.
pub struct Field<O, T> {
    name: String,
    _marker: PhantomData<fn(&O) -> T>,
}

impl<O: DomainObject + Default, T: FieldType> Field<O, T> {
    /// Register `O` with `engine` and create the accessor.
    ///
    /// Fails if another type is already registered under `O`'s name.
    pub fn install(engine: &Engine, name: impl Into<String>) -> Result<Self> {
        engine.register_type::<O>()?;
        Ok(Self {
            name: name.into(),
            _marker: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, engine: &Engine, target: &Rc<O>) -> Result<T> {
        let value = engine
            .instance(&Object::from_rc(Rc::clone(target)))?
            .get_field_value(&self.name)?;
        let found = value.kind();
        T::from_value(value).ok_or_else(|| EngineError::FieldType {
            field: self.name.clone(),
            expected: T::EXPECTED,
            found: found.to_string(),
        })
    }

    pub fn set(&self, engine: &Engine, target: &Rc<O>, value: T) -> Result<()> {
        engine
            .instance(&Object::from_rc(Rc::clone(target)))?
            .set_field_value(&self.name, value.into_value())
    }

    /// Call `listener` whenever the field changes on `target`.
    pub fn on_change(
        &self,
        engine: &Engine,
        target: &Rc<O>,
        listener: impl Fn(&FieldValue) + 'static,
    ) -> Result<()> {
        engine
            .instance(&Object::from_rc(Rc::clone(target)))?
            .on_field_value(&self.name, listener);
        Ok(())
    }
}

impl<O, T> fmt::Debug for Field<O, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("owner", &std::any::type_name::<O>())
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::config::EngineConfig;
    use scoop_state::{MemoryContainer, StateContainer};

    #[derive(Default)]
    struct Account;
    impl DomainObject for Account {}

    #[derive(Default)]
    struct Owner;
    impl DomainObject for Owner {}

    mod clash {
        use crate::object::DomainObject;

        #[derive(Default)]
        pub struct Account;
        impl DomainObject for Account {}
    }

    fn engine() -> Engine {
        Engine::with_config(EngineConfig::headless())
    }

    #[test]
    fn install_registers_owner_type() {
        let engine = engine();
        let balance = Field::<Account, i64>::install(&engine, "balance").unwrap();
        assert_eq!(balance.name(), "balance");
        assert_eq!(engine.types().keys(), vec!["Account".to_string()]);

        let err = Field::<clash::Account, i64>::install(&engine, "balance").unwrap_err();
        assert!(matches!(err, EngineError::TypeNameConflict { .. }));
    }

    #[test]
    fn typed_read_of_other_shape_fails() {
        let engine = engine();
        let balance = Field::<Account, i64>::install(&engine, "balance").unwrap();
        let label = Field::<Account, String>::install(&engine, "balance").unwrap();
        let account = Rc::new(Account);

        label.set(&engine, &account, "lots".into()).unwrap();
        assert_eq!(
            balance.get(&engine, &account).unwrap_err(),
            EngineError::FieldType {
                field: "balance".into(),
                expected: "integer",
                found: "string".into(),
            }
        );
    }

    #[test]
    fn optional_field_reads_unset_as_none() {
        let engine = engine();
        let nickname = Field::<Account, Option<String>>::install(&engine, "nickname").unwrap();
        let account = Rc::new(Account);
        assert_eq!(nickname.get(&engine, &account).unwrap(), None);
    }

    #[test]
    fn object_field_through_a_store() {
        let engine = engine();
        let owner = Field::<Account, Rc<Owner>>::install(&engine, "owner").unwrap();
        engine.register_type::<Owner>().unwrap();
        let container = MemoryContainer::engine_only();

        let account = Rc::new(Account);
        engine
            .attach(&Object::from_rc(Rc::clone(&account)), container.clone(), Some(1.into()))
            .unwrap();
        let person = Rc::new(Owner);
        engine
            .attach(&Object::from_rc(Rc::clone(&person)), container.clone(), Some(9.into()))
            .unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        owner
            .on_change(&engine, &account, move |value| {
                sink.borrow_mut().push(value.kind())
            })
            .unwrap();

        owner.set(&engine, &account, Rc::clone(&person)).unwrap();
        assert!(Rc::ptr_eq(&owner.get(&engine, &account).unwrap(), &person));
        assert_eq!(*seen.borrow(), vec!["object"]);
        assert_eq!(container.engine_state().entity_count(), 2);
    }
}
