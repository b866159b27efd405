//! # Object Lifecycle Types
//!
//! Lifecycle of registry entries and per-client visibility of shared objects.

use serde::{Deserialize, Serialize};

/// The current state of a registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectLifecycleState {
    /// Instantiated at the staging pose, not yet placed by anyone
    Staged,

    /// Placed at least once (shared pose written or detected somewhere)
    Active,

    /// Torn down; the registry entry is gone
    Released,
}

/// Per-client visibility of a shared object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    /// Colliders and graphics disabled, on the non-interactive layer
    Hidden,

    /// Rendered and interactive
    Visible,
}

impl Visibility {
    pub fn is_visible(&self) -> bool {
        matches!(self, Visibility::Visible)
    }

    /// Hidden objects live on the non-interactive layer
    pub fn is_interactive(&self) -> bool {
        self.is_visible()
    }
}
