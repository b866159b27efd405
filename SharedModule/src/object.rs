//! # Shared Object System
//!
//! Object identifiers and the replicated records describing shared objects
//! and their grabbable sub-objects.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::connection::PlayerId;
use crate::types::{Pose, Quat, Vector3};

/// Unique identifier for a live shared object instance
pub type InstanceId = u64;

/// Opaque key naming a class of shared object, e.g. `"SolarPanel"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectTypeId(pub String);

impl ObjectTypeId {
    pub fn new(id: impl Into<String>) -> Self {
        ObjectTypeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectTypeId {
    fn from(id: &str) -> Self {
        ObjectTypeId(id.to_string())
    }
}

/// Replicated description of a live shared object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedObjectRecord {
    /// Class of the object
    pub type_id: ObjectTypeId,

    /// Network instance id assigned by the registry
    pub instance_id: InstanceId,

    /// Authoritative world pose; binding only for devices without markers
    pub shared_world_pose: Pose,

    /// Offset of the object from its anchor (unused by AR clients)
    pub anchor_local_offset: Pose,

    /// Whether the object carries a grabbable sub-object
    pub grabbable: bool,

    /// Per-client flag, never replicated
    #[serde(skip)]
    pub detected_locally: bool,
}

/// Dock state of a grabbable sub-object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockState {
    /// Rest state; world pose is `anchor ∘ relative`
    pub is_docked: bool,

    /// Position relative to the anchor
    pub relative_position: Vector3,

    /// Rotation relative to the anchor
    pub relative_rotation: Quat,

    /// Peer allowed to author the pose; `None` until the authority assigns one
    pub current_owner: Option<PlayerId>,
}

impl DockState {
    /// Docked at `offset`, owned by `owner`
    pub fn docked(offset: Pose, owner: Option<PlayerId>) -> Self {
        Self {
            is_docked: true,
            relative_position: offset.position,
            relative_rotation: offset.rotation,
            current_owner: owner,
        }
    }

    pub fn relative_pose(&self) -> Pose {
        Pose::new(self.relative_position, self.relative_rotation)
    }

    pub fn set_relative_pose(&mut self, pose: Pose) {
        self.relative_position = pose.position;
        self.relative_rotation = pose.rotation;
    }

    pub fn is_owned_by(&self, player_id: &PlayerId) -> bool {
        self.current_owner.as_ref() == Some(player_id)
    }
}
