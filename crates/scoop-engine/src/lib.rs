//! Synchronization engine for scoop.
//!
//! Plain domain objects keep their fields in one normalized state tree owned
//! by a host [`StateContainer`](scoop_state::StateContainer). The engine sits
//! in between:
//!
//! - An [`Instance`] binds one domain object to its field state. Detached, it
//!   is a plain value holder; attached, the container is the source of truth.
//! - A [`Store`] binds one container. It dehydrates writes into CREATE /
//!   UPDATE actions (nested objects become refs) and hydrates state back into
//!   objects, notifying instances only when their own slice changed.
//! - The [`Engine`] owns the [`TypeRegistry`], the view integration, and the
//!   identity-keyed instance and store tables.
//!
//! Everything is single-threaded. The only asynchrony is pending operations,
//! tracked per instance so a caller can await quiescence.

pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod instance;
pub mod object;
pub mod pending;
pub mod store;
pub mod types;
pub mod value;
pub mod view;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use field::Field;
pub use instance::Instance;
pub use object::{AsAny, DomainObject, Object};
pub use pending::{join_waits, PendingError, PendingResult, PendingSet, PendingWait};
pub use store::Store;
pub use types::TypeRegistry;
pub use value::{FieldType, FieldValue};
pub use view::{HeadlessView, ViewAdapter, ViewRegistry};

pub use scoop_types::{Identifier, Ref};
