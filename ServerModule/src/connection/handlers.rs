//! # Connection Handlers
//!
//! Handles peer connection and disconnection events.

use log::{info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use xrs_shared::{PeerInfo, PlayerId, ServerMessage};

use crate::replication;
use crate::spatial::grab;
use crate::AuthorityServer;

/// Register a peer and send it the state of every live object.
///
/// The returned receiver carries every message addressed to the peer.
pub fn connect_peer(server: &mut AuthorityServer, info: PeerInfo) -> UnboundedReceiver<ServerMessage> {
    let (tx, rx) = mpsc::unbounded_channel();

    let snapshot = replication::snapshot(&server.registry);
    info!(
        "Peer connected: {} ({:?}), sending {} snapshot messages",
        info.player_id,
        info.device,
        snapshot.len()
    );
    for message in snapshot {
        // Receiver is still in hand, so this cannot fail
        let _ = tx.send(message);
    }

    server.peers.insert(info, tx);
    rx
}

/// Unregister a peer. Objects it owned go back to the default owner.
pub fn disconnect_peer(server: &mut AuthorityServer, player_id: &PlayerId) -> bool {
    if server.peers.remove(player_id).is_none() {
        warn!("Peer disconnected but wasn't registered: {}", player_id);
        return false;
    }
    info!("Peer disconnected: {}", player_id);

    let host_id = server.host_id.clone();
    let mut returned = 0;
    for object in server.registry.iter_mut() {
        match grab::return_ownership(object, player_id, &host_id) {
            Ok(true) => returned += 1,
            Ok(false) => {}
            Err(err) => warn!("Could not return {} to {}: {}", object.type_id, host_id, err),
        }
    }
    if returned > 0 {
        info!("Returned {} objects owned by {} to {}", returned, player_id, host_id);
    }

    replication::flush(&mut server.registry, &server.peers);
    true
}
