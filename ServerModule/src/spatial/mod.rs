//! # Authoritative Object State
//!
//! The authority's copy of every live shared object: its replicated shared
//! pose and, for grabbable objects, the replicated dock state. Request
//! handlers that mutate this state live in the submodules.

use xrs_shared::{
    DockState, InstanceId, ObjectLifecycleState, ObjectTypeId, PlayerId, Pose, Replicated,
    SharedObjectRecord,
};

use crate::object::catalog::PrefabEntry;

// Submodules
pub mod transform;  // Shared pose writes
pub mod grab;       // Ownership and dock transitions

/// Authority-side grabbable sub-object
#[derive(Debug)]
pub struct GrabAuthority {
    /// Replicated dock state, including the current owner
    pub dock: Replicated<DockState>,

    /// Offset restored by a re-dock
    pub original_offset: Pose,

    /// Highest push sequence accepted from the current owner
    pub last_push_sequence: Option<u32>,
}

/// Authority-side shared object
#[derive(Debug)]
pub struct AuthorityObject {
    /// Object class
    pub type_id: ObjectTypeId,

    /// Network instance id
    pub instance_id: InstanceId,

    /// Registry lifecycle state
    pub state: ObjectLifecycleState,

    /// Authoritative world pose
    pub shared_pose: Replicated<Pose>,

    /// Offset of the object from its anchor
    pub anchor_local_offset: Pose,

    /// Present when the prefab carries a grabbable sub-object
    pub grab: Option<GrabAuthority>,
}

impl AuthorityObject {
    /// Instantiate a prefab at the staging pose. Grabbable sub-objects start
    /// docked and owned by `default_owner`.
    pub fn instantiate(
        type_id: ObjectTypeId,
        instance_id: InstanceId,
        prefab: &PrefabEntry,
        staging_pose: Pose,
        default_owner: &PlayerId,
    ) -> Self {
        let grab = prefab.grabbable.as_ref().map(|spec| GrabAuthority {
            dock: Replicated::authority(DockState::docked(
                spec.dock_offset,
                Some(default_owner.clone()),
            )),
            original_offset: spec.dock_offset,
            last_push_sequence: None,
        });

        Self {
            type_id,
            instance_id,
            state: ObjectLifecycleState::Staged,
            shared_pose: Replicated::authority(staging_pose),
            anchor_local_offset: prefab.anchor_local_offset,
            grab,
        }
    }

    /// Snapshot for replication
    pub fn record(&self) -> SharedObjectRecord {
        SharedObjectRecord {
            type_id: self.type_id.clone(),
            instance_id: self.instance_id,
            shared_world_pose: *self.shared_pose.get(),
            anchor_local_offset: self.anchor_local_offset,
            grabbable: self.grab.is_some(),
            detected_locally: false,
        }
    }

    pub fn dock_state(&self) -> Option<&DockState> {
        self.grab.as_ref().map(|g| g.dock.get())
    }
}
