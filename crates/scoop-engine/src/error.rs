//! Error types for engine operations.

use thiserror::Error;

/// Usage errors raised by the engine.
///
/// None of these are retried; they signal a programming mistake in the host
/// application and surface at the call that made it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// An instance already attached to one store was attached to another.
    #[error("instance of `{type_name}` cannot belong to more than one store")]
    StoreConflict { type_name: String },

    /// Two view-owned objects resolved to the same entity.
    #[error("view component instance {entity} is not uniquely identifiable")]
    DuplicateViewInstance { entity: String },

    /// A type name is already bound to a different type.
    #[error("type name '{name}' already in use")]
    TypeNameConflict { name: String },

    /// The runtime type of an object was never registered.
    #[error("type `{type_name}` is not registered")]
    UnregisteredType { type_name: String },

    /// A stored ref names a type key nobody registered.
    #[error("no type registered under key '{key}'")]
    UnknownTypeKey { key: String },

    /// A view capability was queried before a view adapter was registered.
    #[error("view needs to be registered before using this function")]
    ViewNotRegistered,

    /// The adapter recognized a view component but could not bind it.
    #[error("view component `{type_name}` cannot be bound: {reason}")]
    UnboundViewComponent { type_name: String, reason: String },

    /// A view adapter was registered twice.
    #[error("view adapter is already registered")]
    ViewAlreadyRegistered,

    /// A typed field accessor read a value of another shape.
    #[error("field '{field}' holds {found}, expected {expected}")]
    FieldType {
        field: String,
        expected: &'static str,
        found: String,
    },

    /// An instance's store was released from the engine.
    #[error("store of `{type_name}` instance has been released")]
    StoreReleased { type_name: String },

    /// A pending operation was registered outside any tokio runtime.
    #[error("pending operations need a tokio runtime with a LocalSet")]
    NoAsyncRuntime,

    /// An entity's id does not fit the kind of slice its type is stored as:
    /// an id-less entity against a keyed collection, or a keyed one against
    /// a singleton.
    #[error("entity {entity} does not fit the stored {stored} slice of its type")]
    SliceKindConflict { entity: String, stored: &'static str },

    /// The engine owning a store or instance has been dropped.
    #[error("engine has been dropped")]
    EngineDropped,
}

/// Convenience type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
