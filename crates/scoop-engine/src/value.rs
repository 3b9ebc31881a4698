//! Hydrated, domain-facing field values.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Number;

use scoop_types::Identifier;

use crate::object::{DomainObject, Object};

/// A field value as domain code sees it.
///
/// Mirrors [`StoredValue`](scoop_types::StoredValue), except that nested
/// entities are live [`Object`]s instead of refs. Equality is structural for
/// data and identity-based for objects.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
    Object(Object),
}

impl FieldValue {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Number(_) => "number",
            FieldValue::String(_) => "string",
            FieldValue::List(_) => "list",
            FieldValue::Map(_) => "map",
            FieldValue::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            FieldValue::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n.into())
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Number(n.into())
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(FieldValue::Null, FieldValue::Number)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<Object> for FieldValue {
    fn from(o: Object) -> Self {
        FieldValue::Object(o)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// Rust types a typed [`Field`](crate::Field) accessor can read and write.
pub trait FieldType: Sized {
    /// Human-readable description of the accepted shape.
    const EXPECTED: &'static str;

    fn into_value(self) -> FieldValue;

    /// Convert back, or `None` if `value` has another shape.
    fn from_value(value: FieldValue) -> Option<Self>;
}

impl FieldType for FieldValue {
    const EXPECTED: &'static str = "any value";

    fn into_value(self) -> FieldValue {
        self
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        Some(value)
    }
}

impl FieldType for bool {
    const EXPECTED: &'static str = "bool";

    fn into_value(self) -> FieldValue {
        self.into()
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FieldType for i64 {
    const EXPECTED: &'static str = "integer";

    fn into_value(self) -> FieldValue {
        self.into()
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        value.as_i64()
    }
}

impl FieldType for f64 {
    const EXPECTED: &'static str = "number";

    fn into_value(self) -> FieldValue {
        self.into()
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        value.as_f64()
    }
}

impl FieldType for String {
    const EXPECTED: &'static str = "string";

    fn into_value(self) -> FieldValue {
        self.into()
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl FieldType for Identifier {
    const EXPECTED: &'static str = "identifier";

    fn into_value(self) -> FieldValue {
        match self {
            Identifier::Int(n) => n.into(),
            Identifier::Str(s) => s.into(),
        }
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Number(n) => n.as_i64().map(Identifier::Int),
            FieldValue::String(s) => Some(Identifier::Str(s)),
            _ => None,
        }
    }
}

impl FieldType for Object {
    const EXPECTED: &'static str = "object";

    fn into_value(self) -> FieldValue {
        self.into()
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl<T: DomainObject> FieldType for Rc<T> {
    const EXPECTED: &'static str = "object of the field's type";

    fn into_value(self) -> FieldValue {
        FieldValue::Object(Object::from_rc(self))
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        value.as_object()?.downcast::<T>()
    }
}

/// `Null` reads as `None`.
impl<T: FieldType> FieldType for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn into_value(self) -> FieldValue {
        self.map_or(FieldValue::Null, FieldType::into_value)
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FieldType> FieldType for Vec<T> {
    const EXPECTED: &'static str = "list";

    fn into_value(self) -> FieldValue {
        FieldValue::List(self.into_iter().map(FieldType::into_value).collect())
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::List(items) => items.into_iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}
