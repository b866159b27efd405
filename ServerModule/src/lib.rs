//! # Authority Server Module
//!
//! The authority side of the spatial sync layer. The host process owns one
//! [`AuthorityServer`]: it is the single writer of every shared pose and
//! dock state, and it serializes concurrent ownership requests.
//!
//! The system is organized into several sub-modules:
//! - `object`: Object registry and prefab catalog
//! - `spatial`: Authority-side object state, pose writes and grab arbitration
//! - `connection`: Peer bookkeeping and authorization
//! - `rpc`: Request dispatch and targeted replies
//! - `replication`: Broadcast of replicated changes

use log::info;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use xrs_shared::{ObjectTypeId, PeerInfo, PlayerId, ServerMessage, SharedObjectRecord, SyncConfig, SyncResult};

// Module declarations
pub mod object;       // Registry and catalog
pub mod spatial;      // Authoritative object state
pub mod connection;   // Connection management
pub mod rpc;          // Request handling
pub mod replication;  // Change broadcast

// Re-export commonly used items
pub use object::{ObjectRegistry, PrefabCatalog, PrefabEntry};
pub use spatial::AuthorityObject;
pub use connection::PeerRegistry;
pub use rpc::{RequestInbox, RequestSender};

/// The authority of one session
#[derive(Debug)]
pub struct AuthorityServer {
    /// Default owner of every grabbable sub-object
    pub(crate) host_id: PlayerId,

    pub(crate) config: SyncConfig,

    pub(crate) registry: ObjectRegistry,

    pub(crate) peers: PeerRegistry,

    /// Kept so `request_sender` can hand out clones
    inbox_tx: RequestSender,

    pub(crate) inbox: RequestInbox,
}

impl AuthorityServer {
    pub fn new(host_id: PlayerId, catalog: PrefabCatalog, config: SyncConfig) -> Self {
        info!("Authority initialized for host {} with {} object types", host_id, catalog.len());
        let registry = ObjectRegistry::new(catalog, config.staging_pose);
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        Self {
            host_id,
            config,
            registry,
            peers: PeerRegistry::new(),
            inbox_tx,
            inbox,
        }
    }

    pub fn host_id(&self) -> &PlayerId {
        &self.host_id
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    /// Channel peers use to reach the authority
    pub fn request_sender(&self) -> RequestSender {
        self.inbox_tx.clone()
    }

    /// Handle a peer connection; the receiver carries its messages
    pub fn connect(&mut self, info: PeerInfo) -> UnboundedReceiver<ServerMessage> {
        connection::connect_peer(self, info)
    }

    pub fn disconnect(&mut self, player_id: &PlayerId) -> bool {
        connection::disconnect_peer(self, player_id)
    }

    /// Authority-local `getOrSpawn`. A fresh instance is announced to every peer.
    pub fn get_or_spawn(&mut self, type_id: &ObjectTypeId) -> SyncResult<SharedObjectRecord> {
        let (object, spawned) = self.registry.get_or_spawn(type_id, &self.host_id)?;
        if spawned {
            replication::announce_spawn(object, &self.peers);
        }
        Ok(object.record())
    }

    /// Tear down one object
    pub fn release(&mut self, type_id: &ObjectTypeId) -> bool {
        match self.registry.release(type_id) {
            Some(_) => {
                replication::announce_release(type_id, &self.peers);
                true
            }
            None => false,
        }
    }

    /// Scene teardown: release every live object
    pub fn teardown(&mut self) -> usize {
        let type_ids = self.registry.type_ids();
        info!("Tearing down {} live objects", type_ids.len());
        type_ids.iter().filter(|type_id| self.release(type_id)).count()
    }

    /// One tick of the message loop: dispatch queued requests, then flush
    /// replicated changes. Returns the number of requests handled.
    pub fn pump(&mut self) -> usize {
        let handled = rpc::process_inbox(self);
        replication::flush(&mut self.registry, &self.peers);
        handled
    }
}
