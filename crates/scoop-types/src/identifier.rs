use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::value::StoredValue;

/// Identity of one entity within its type.
///
/// Identifiers are either integers or strings. Keyed collections in the state
/// tree are addressed by the [`Display`](fmt::Display) form, so `1` and `"1"`
/// name the same entry.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Int(i64),
    Str(String),
}

impl Identifier {
    /// The key under which this identifier's entry lives in a collection.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Int(n) => write!(f, "Identifier({n})"),
            Identifier::Str(s) => write!(f, "Identifier({s:?})"),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Int(n) => write!(f, "{n}"),
            Identifier::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Identifier {
    fn from(n: i64) -> Self {
        Identifier::Int(n)
    }
}

impl From<i32> for Identifier {
    fn from(n: i32) -> Self {
        Identifier::Int(n.into())
    }
}

impl From<u32> for Identifier {
    fn from(n: u32) -> Self {
        Identifier::Int(n.into())
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier::Str(s.to_string())
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Identifier::Str(s)
    }
}

impl TryFrom<&StoredValue> for Identifier {
    type Error = TypeError;

    fn try_from(value: &StoredValue) -> Result<Self, Self::Error> {
        match value {
            StoredValue::String(s) => Ok(Identifier::Str(s.clone())),
            StoredValue::Number(n) => n
                .as_i64()
                .map(Identifier::Int)
                .ok_or_else(|| TypeError::InvalidIdentifier(n.to_string())),
            other => Err(TypeError::InvalidIdentifier(format!("{other:?}"))),
        }
    }
}
