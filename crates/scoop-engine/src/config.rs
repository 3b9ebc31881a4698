use serde::{Deserialize, Serialize};

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// When attaching an instance without an explicit id, fall back to the
    /// domain object's own identifier. When `false` the id stays unset and
    /// the instance maps to its type's singleton slice.
    pub implicit_identifiers: bool,
    /// When `true`, querying view capabilities before an adapter is
    /// registered is an error. When `false`, an unregistered adapter treats
    /// every object as plain (not view-owned).
    pub require_view_adapter: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            implicit_identifiers: true,
            require_view_adapter: true,
        }
    }
}

impl EngineConfig {
    /// Configuration for hosts without any view layer.
    pub fn headless() -> Self {
        Self {
            require_view_adapter: false,
            ..Default::default()
        }
    }
}
