//! # Replication
//!
//! Turns authority-side state into `ReplicatedChange` broadcasts. Spawns and
//! releases are announced immediately; pose and dock writes are collected
//! from dirty replicated values on every flush.

use log::debug;
use xrs_shared::{ObjectTypeId, ReplicatedChange, ServerMessage};

use crate::connection::PeerRegistry;
use crate::object::ObjectRegistry;
use crate::spatial::AuthorityObject;

/// Messages that describe an object from scratch
pub fn describe(object: &AuthorityObject) -> Vec<ServerMessage> {
    let mut messages = vec![ServerMessage::Replicated(ReplicatedChange::Spawned(object.record()))];
    if let Some(dock) = object.dock_state() {
        messages.push(ServerMessage::Replicated(ReplicatedChange::Dock {
            type_id: object.type_id.clone(),
            state: dock.clone(),
        }));
    }
    messages
}

/// Full state of every live object, for a late joiner
pub fn snapshot(registry: &ObjectRegistry) -> Vec<ServerMessage> {
    registry.iter().flat_map(describe).collect()
}

pub fn announce_spawn(object: &AuthorityObject, peers: &PeerRegistry) {
    for message in describe(object) {
        peers.broadcast(&message);
    }
}

pub fn announce_release(type_id: &ObjectTypeId, peers: &PeerRegistry) {
    peers.broadcast(&ServerMessage::Replicated(ReplicatedChange::Released {
        type_id: type_id.clone(),
    }));
}

/// Broadcast every value written since the last flush. Returns the number of changes.
pub fn flush(registry: &mut ObjectRegistry, peers: &PeerRegistry) -> usize {
    let mut changes = Vec::new();
    for object in registry.iter_mut() {
        if let Some(pose) = object.shared_pose.take_dirty() {
            changes.push(ReplicatedChange::SharedPose {
                type_id: object.type_id.clone(),
                pose,
            });
        }
        if let Some(grab) = object.grab.as_mut() {
            if let Some(state) = grab.dock.take_dirty() {
                changes.push(ReplicatedChange::Dock {
                    type_id: object.type_id.clone(),
                    state,
                });
            }
        }
    }

    if !changes.is_empty() {
        debug!("Flushing {} replicated changes to {} peers", changes.len(), peers.len());
    }
    let count = changes.len();
    for change in changes {
        peers.broadcast(&ServerMessage::Replicated(change));
    }
    count
}
