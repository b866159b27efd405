//! # Outgoing Targeted Calls
//!
//! Authority-invoked calls delivered to a single peer.

use log::{debug, warn};
use xrs_shared::rpc::RejectionArgs;
use xrs_shared::{
    ObjectTypeId, PlayerId, Request, ServerMessage, SharedObjectRecord, SyncError, Targeted,
    TargetedOp,
};

use crate::connection::PeerRegistry;

fn send_targeted<A: serde::Serialize>(
    peers: &PeerRegistry,
    call_id: Option<u64>,
    op: TargetedOp,
    type_id: &ObjectTypeId,
    args: &A,
    target: &PlayerId,
) -> bool {
    let targeted = match Targeted::new(call_id, op, type_id.clone(), args, target.clone()) {
        Ok(targeted) => targeted,
        Err(err) => {
            warn!("Failed to encode {:?} for {}: {}", op, target, err);
            return false;
        }
    };
    debug!("Sending {:?} for {} to {}", op, type_id, target);
    peers.send_to(target, ServerMessage::Targeted(targeted))
}

/// Reply to `GetOrSpawn`
pub fn send_spawn_result(peers: &PeerRegistry, request: &Request, record: &SharedObjectRecord) -> bool {
    send_targeted(
        peers,
        Some(request.call_id),
        TargetedOp::SpawnResult,
        &request.type_id,
        record,
        &request.requester,
    )
}

/// Tell the requester why its request was refused
pub fn send_rejection(peers: &PeerRegistry, request: &Request, error: SyncError) -> bool {
    send_targeted(
        peers,
        Some(request.call_id),
        TargetedOp::RequestRejected,
        &request.type_id,
        &RejectionArgs { error },
        &request.requester,
    )
}

/// Tell the losing grabber another peer holds the object
pub fn send_ownership_denied(peers: &PeerRegistry, request: &Request, holder: &PlayerId) -> bool {
    let error = SyncError::permission_denied(&format!("ownership held by {}", holder));
    send_targeted(
        peers,
        Some(request.call_id),
        TargetedOp::OwnershipDenied,
        &request.type_id,
        &RejectionArgs { error },
        &request.requester,
    )
}
