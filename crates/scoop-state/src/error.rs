//! Error types for state operations.

use thiserror::Error;

/// Errors that can occur while loading or exporting state.
#[derive(Debug, Error)]
pub enum StateError {
    /// The input is not a valid engine sub-tree.
    #[error("invalid engine state: {0}")]
    InvalidState(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for state operations.
pub type Result<T> = std::result::Result<T, StateError>;
