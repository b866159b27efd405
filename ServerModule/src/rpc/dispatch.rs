//! # Request Dispatch
//!
//! Routes each incoming `Request` to its handler. A failed handler answers
//! the requester with `RequestRejected`; nothing is broadcast for it.

use log::{debug, warn};
use xrs_shared::rpc::{GrabPushArgs, PoseArgs};
use xrs_shared::{ObjectTypeId, Request, RequestOp, SyncError, SyncResult};

use super::outgoing;
use crate::connection::auth;
use crate::spatial::{grab, transform, AuthorityObject};
use crate::AuthorityServer;

/// Execute one request against the authority state
pub fn dispatch_request(server: &mut AuthorityServer, request: &Request) {
    debug!(
        "Dispatching {:?} on {} from {} (call {})",
        request.op, request.type_id, request.requester, request.call_id
    );

    if let Err(error) = execute(server, request) {
        warn!(
            "{:?} on {} from {} rejected: {}",
            request.op, request.type_id, request.requester, error
        );
        outgoing::send_rejection(&server.peers, request, error);
    }
}

fn execute(server: &mut AuthorityServer, request: &Request) -> SyncResult<()> {
    let device = auth::require_connected(&server.peers, &request.requester)?;

    match request.op {
        RequestOp::GetOrSpawn => {
            let record = server.get_or_spawn(&request.type_id)?;
            outgoing::send_spawn_result(&server.peers, request, &record);
        }
        RequestOp::WriteSharedPose => {
            auth::require_shared_pose_writer(&request.requester, device)?;
            let args: PoseArgs = request.args()?;
            server.get_or_spawn(&request.type_id)?;
            transform::write_shared_pose(live_object(server, &request.type_id)?, args.pose)?;
        }
        RequestOp::RequestOwnership => {
            let policy = server.config.ownership_policy;
            let host_id = server.host_id.clone();
            let object = live_object(server, &request.type_id)?;
            if let grab::OwnershipOutcome::Denied { holder } =
                grab::request_ownership(object, &request.requester, &host_id, policy)?
            {
                outgoing::send_ownership_denied(&server.peers, request, &holder);
            }
        }
        RequestOp::ReleaseOwnership => {
            let host_id = server.host_id.clone();
            let object = live_object(server, &request.type_id)?;
            grab::release_ownership(object, &request.requester, &host_id)?;
        }
        RequestOp::RequestUndock => {
            grab::request_undock(live_object(server, &request.type_id)?)?;
        }
        RequestOp::RequestRedock => {
            grab::request_redock(live_object(server, &request.type_id)?)?;
        }
        RequestOp::PushGrabPose => {
            let args: GrabPushArgs = request.args()?;
            grab::push_grab_pose(live_object(server, &request.type_id)?, &request.requester, args)?;
        }
    }
    Ok(())
}

fn live_object<'a>(
    server: &'a mut AuthorityServer,
    type_id: &ObjectTypeId,
) -> SyncResult<&'a mut AuthorityObject> {
    if !server.registry.catalog().contains(type_id) {
        return Err(SyncError::UnknownTypeId(type_id.to_string()));
    }
    server
        .registry
        .get_mut(type_id)
        .ok_or_else(|| SyncError::InvalidArgument(format!("{} has no live instance", type_id)))
}

