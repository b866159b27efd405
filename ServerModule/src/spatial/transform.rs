//! # Shared Pose Writes
//!
//! The authority is the single writer of every object's shared world pose.
//! Markerless peers request a write; the applied value reaches every peer
//! through the replication flush.

use log::debug;
use xrs_shared::{NetRole, ObjectLifecycleState, Pose, SyncResult};

use super::AuthorityObject;

/// Apply a shared pose write. Returns whether the pose changed.
pub fn write_shared_pose(object: &mut AuthorityObject, pose: Pose) -> SyncResult<bool> {
    let changed = object.shared_pose.set(NetRole::Authority, pose)?;
    if object.state == ObjectLifecycleState::Staged {
        debug!("{} placed for the first time", object.type_id);
        object.state = ObjectLifecycleState::Active;
    }
    Ok(changed)
}
