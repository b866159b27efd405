//! # Grab Arbitration
//!
//! Ownership transfer and dock transitions of grabbable sub-objects. Any peer
//! may request a transition; requests are serialized by the authority's
//! message loop, so the dock state seen here is always the latest one.

use log::{debug, info};
use xrs_shared::rpc::GrabPushArgs;
use xrs_shared::{NetRole, OwnershipPolicy, PlayerId, SyncError, SyncResult};

use super::{AuthorityObject, GrabAuthority};
use crate::connection::auth;

/// Result of an ownership request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipOutcome {
    /// Ownership moved to the requester
    Granted,

    /// The requester already owned the object
    AlreadyOwner,

    /// Another peer holds the object under first-request-wins
    Denied { holder: PlayerId },
}

fn grab_mut(object: &mut AuthorityObject) -> SyncResult<&mut GrabAuthority> {
    let type_id = object.type_id.clone();
    object
        .grab
        .as_mut()
        .ok_or_else(|| SyncError::InvalidArgument(format!("{} has no grabbable sub-object", type_id)))
}

/// Hand ownership to `requester` according to `policy`
pub fn request_ownership(
    object: &mut AuthorityObject,
    requester: &PlayerId,
    default_owner: &PlayerId,
    policy: OwnershipPolicy,
) -> SyncResult<OwnershipOutcome> {
    let type_id = object.type_id.clone();
    let grab = grab_mut(object)?;
    let mut next = grab.dock.get().clone();

    if next.is_owned_by(requester) {
        return Ok(OwnershipOutcome::AlreadyOwner);
    }

    if policy == OwnershipPolicy::FirstRequestWins {
        if let Some(holder) = next.current_owner.as_ref().filter(|h| *h != default_owner) {
            debug!("{} keeps {}; denied to {}", holder, type_id, requester);
            return Ok(OwnershipOutcome::Denied { holder: holder.clone() });
        }
    }

    info!("Ownership of {} transferred to {}", type_id, requester);
    next.current_owner = Some(requester.clone());
    grab.dock.set(NetRole::Authority, next)?;
    grab.last_push_sequence = None;
    Ok(OwnershipOutcome::Granted)
}

/// The owner hands the object back to the default owner
pub fn release_ownership(
    object: &mut AuthorityObject,
    requester: &PlayerId,
    default_owner: &PlayerId,
) -> SyncResult<bool> {
    let grab = grab_mut(object)?;
    auth::require_owner(grab.dock.get(), requester, "release ownership")?;
    set_owner(grab, default_owner)
}

/// Give back everything `player_id` owns. Used when a peer disconnects.
pub fn return_ownership(
    object: &mut AuthorityObject,
    player_id: &PlayerId,
    default_owner: &PlayerId,
) -> SyncResult<bool> {
    match object.grab.as_mut() {
        Some(grab) if grab.dock.get().is_owned_by(player_id) => set_owner(grab, default_owner),
        _ => Ok(false),
    }
}

fn set_owner(grab: &mut GrabAuthority, owner: &PlayerId) -> SyncResult<bool> {
    let mut next = grab.dock.get().clone();
    next.current_owner = Some(owner.clone());
    grab.last_push_sequence = None;
    grab.dock.set(NetRole::Authority, next)
}

/// Leave the docked state. Repeated requests are no-ops.
pub fn request_undock(object: &mut AuthorityObject) -> SyncResult<bool> {
    let type_id = object.type_id.clone();
    let grab = grab_mut(object)?;
    if !grab.dock.get().is_docked {
        debug!("Undock of {} ignored, already undocked", type_id);
        return Ok(false);
    }
    let mut next = grab.dock.get().clone();
    next.is_docked = false;
    info!("{} undocked", type_id);
    grab.dock.set(NetRole::Authority, next)
}

/// Restore the original offset and dock again
pub fn request_redock(object: &mut AuthorityObject) -> SyncResult<bool> {
    let type_id = object.type_id.clone();
    let grab = grab_mut(object)?;
    let mut next = grab.dock.get().clone();
    next.is_docked = true;
    next.set_relative_pose(grab.original_offset);
    let changed = grab.dock.set(NetRole::Authority, next)?;
    if changed {
        info!("{} re-docked", type_id);
    }
    Ok(changed)
}

/// Apply the owner's pose relative to the anchor. Stale sequences are dropped.
pub fn push_grab_pose(
    object: &mut AuthorityObject,
    requester: &PlayerId,
    args: GrabPushArgs,
) -> SyncResult<bool> {
    let type_id = object.type_id.clone();
    let grab = grab_mut(object)?;
    auth::require_owner(grab.dock.get(), requester, "push grab pose")?;

    if grab.dock.get().is_docked {
        return Err(SyncError::InvalidArgument(format!("{} is docked", type_id)));
    }
    if let Some(last) = grab.last_push_sequence {
        if args.sequence <= last {
            debug!("Dropping stale push {} for {} (last {})", args.sequence, type_id, last);
            return Ok(false);
        }
    }
    grab.last_push_sequence = Some(args.sequence);

    let mut next = grab.dock.get().clone();
    next.set_relative_pose(args.relative);
    grab.dock.set(NetRole::Authority, next)
}
