//! # Connection Management
//!
//! Peers connected to the authority, each with the outgoing half of its
//! message channel.

use log::{debug, warn};
use std::collections::BTreeMap;
use tokio::sync::mpsc::UnboundedSender;
use xrs_shared::{DeviceKind, PeerInfo, PlayerId, ServerMessage};

// Module declarations
pub mod handlers;  // Connect and disconnect events
pub mod auth;      // Authorization checks

pub use handlers::{connect_peer, disconnect_peer};

/// A connected peer
#[derive(Debug)]
pub struct PeerConnection {
    /// Identity and device class
    pub info: PeerInfo,

    /// Outgoing messages to this peer
    sender: UnboundedSender<ServerMessage>,
}

/// Connected peers keyed by player id
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: BTreeMap<PlayerId, PeerConnection>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a peer, replacing a previous connection with the same id
    pub fn insert(&mut self, info: PeerInfo, sender: UnboundedSender<ServerMessage>) {
        if self.peers.contains_key(&info.player_id) {
            debug!("Peer {} reconnected, replacing its channel", info.player_id);
        }
        self.peers.insert(info.player_id.clone(), PeerConnection { info, sender });
    }

    pub fn remove(&mut self, player_id: &PlayerId) -> Option<PeerConnection> {
        self.peers.remove(player_id)
    }

    pub fn contains(&self, player_id: &PlayerId) -> bool {
        self.peers.contains_key(player_id)
    }

    pub fn device_of(&self, player_id: &PlayerId) -> Option<DeviceKind> {
        self.peers.get(player_id).map(|peer| peer.info.device)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.peers.keys().cloned().collect()
    }

    /// Send to one peer. Returns `false` if the peer is unknown or gone.
    pub fn send_to(&self, player_id: &PlayerId, message: ServerMessage) -> bool {
        let peer = match self.peers.get(player_id) {
            Some(peer) => peer,
            None => {
                warn!("Dropping message for unknown peer {}", player_id);
                return false;
            }
        };
        if peer.sender.send(message).is_err() {
            warn!("Channel to peer {} is closed", player_id);
            return false;
        }
        true
    }

    /// Send to every connected peer. Returns the number of deliveries.
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        let mut delivered = 0;
        for (player_id, peer) in &self.peers {
            if peer.sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                warn!("Channel to peer {} is closed", player_id);
            }
        }
        delivered
    }
}
