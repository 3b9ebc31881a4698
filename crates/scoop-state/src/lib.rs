//! Normalized state for scoop.
//!
//! The engine keeps every entity in a private sub-tree of the host
//! application's state, nested under the reserved [`NAMESPACE`] key. This
//! crate provides:
//! - The [`EngineState`] tree and its [`TypeSlice`]s
//! - The [`EngineAction`] wire format (CREATE / UPDATE)
//! - The pure [`reduce`] transition function
//! - Slice diffing used to decide when an entity really changed
//! - The [`StateContainer`] contract and an in-memory [`MemoryContainer`]
//!   with the [`MemoryContainer::enhance`] composition helper

pub mod action;
pub mod container;
pub mod diff;
pub mod error;
pub mod reducer;
pub mod state;

pub use action::EngineAction;
pub use container::{Action, MemoryContainer, RootState, StateContainer};
pub use diff::{diff_slices, FieldChange, SliceDiff};
pub use error::{Result, StateError};
pub use reducer::reduce;
pub use scoop_types::NAMESPACE;
pub use state::{EngineState, TypeSlice};
