//! # Authorization
//!
//! Checks the authority runs before applying a request. Every check returns
//! `PermissionDenied` naming the refused operation.

use log::warn;
use xrs_shared::{DeviceKind, DockState, PlayerId, SyncError, SyncResult};

use super::PeerRegistry;

/// Device kind of a connected requester
pub fn require_connected(peers: &PeerRegistry, requester: &PlayerId) -> SyncResult<DeviceKind> {
    match peers.device_of(requester) {
        Some(device) => Ok(device),
        None => {
            warn!("Request from unknown peer {}", requester);
            Err(SyncError::permission_denied("request from unconnected peer"))
        }
    }
}

/// Marker-based devices keep their anchor local and never write the shared pose
pub fn can_write_shared_pose(device: DeviceKind) -> bool {
    !device.uses_markers()
}

pub fn require_shared_pose_writer(requester: &PlayerId, device: DeviceKind) -> SyncResult<()> {
    if can_write_shared_pose(device) {
        Ok(())
    } else {
        warn!("Rejected shared pose write from {} ({:?} device)", requester, device);
        Err(SyncError::permission_denied("write shared pose"))
    }
}

/// Only the current owner may author the pose or give ownership back
pub fn require_owner(dock: &DockState, requester: &PlayerId, operation: &str) -> SyncResult<()> {
    if dock.is_owned_by(requester) {
        Ok(())
    } else {
        warn!(
            "Rejected {} from {}: owner is {:?}",
            operation, requester, dock.current_owner
        );
        Err(SyncError::permission_denied(operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrs_shared::Pose;

    #[test]
    fn only_markerless_devices_write_the_shared_pose() {
        assert!(!can_write_shared_pose(DeviceKind::Ar));
        assert!(can_write_shared_pose(DeviceKind::Vr));
        assert!(can_write_shared_pose(DeviceKind::Simulator));
    }

    #[test]
    fn owner_check() {
        let dock = DockState::docked(Pose::identity(), Some(PlayerId::from("a")));
        assert!(require_owner(&dock, &PlayerId::from("a"), "push grab pose").is_ok());
        assert_eq!(
            require_owner(&dock, &PlayerId::from("b"), "push grab pose"),
            Err(SyncError::permission_denied("push grab pose"))
        );
    }
}
