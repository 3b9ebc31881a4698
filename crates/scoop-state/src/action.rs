//! Engine actions and their wire format.
//!
//! ```json
//! { "type": "@@scoop/CREATE", "ref": { "@@scoop": "ref", "type": "Todo", "id": 1 }, "data": { "done": true } }
//! { "type": "@@scoop/UPDATE", "ref": { "@@scoop": "ref", "type": "Todo", "id": 1 }, "data": { "done": false } }
//! ```

use serde::{Deserialize, Serialize};

use scoop_types::{FieldMap, Ref};

/// An action the engine dispatches into the host container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineAction {
    /// Seed (or replace) an entity with a full field map.
    #[serde(rename = "@@scoop/CREATE")]
    Create {
        #[serde(rename = "ref")]
        target: Ref,
        data: FieldMap,
    },
    /// Shallow-merge the given fields into an existing entity.
    #[serde(rename = "@@scoop/UPDATE")]
    Update {
        #[serde(rename = "ref")]
        target: Ref,
        data: FieldMap,
    },
}

impl EngineAction {
    /// The entity this action applies to.
    pub fn target(&self) -> &Ref {
        match self {
            EngineAction::Create { target, .. } | EngineAction::Update { target, .. } => target,
        }
    }

    /// The carried fields.
    pub fn data(&self) -> &FieldMap {
        match self {
            EngineAction::Create { data, .. } | EngineAction::Update { data, .. } => data,
        }
    }

    /// The namespaced action type string.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineAction::Create { .. } => "@@scoop/CREATE",
            EngineAction::Update { .. } => "@@scoop/UPDATE",
        }
    }

    /// Returns `true` for a CREATE action.
    pub fn is_create(&self) -> bool {
        matches!(self, EngineAction::Create { .. })
    }
}
