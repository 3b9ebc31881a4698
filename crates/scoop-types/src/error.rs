use thiserror::Error;

/// Errors produced by type conversions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("value cannot be used as an identifier: {0}")]
    InvalidIdentifier(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
