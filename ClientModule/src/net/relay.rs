//! # Relay Service
//!
//! Realtime relay allocation and the host/client transport primitives.

use serde::{Deserialize, Serialize};
use xrs_shared::ProviderResult;

use super::PendingCall;

/// A relay allocation, identified to other peers by its join code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayAllocation {
    /// Code non-authority peers use to join
    pub join_code: String,

    /// Peer limit of the allocation
    pub max_peers: usize,
}

/// Remote relay allocator plus the local transport it configures
pub trait RelayService: Send {
    /// Reserve a relay for up to `max_peers` peers
    fn allocate(&self, max_peers: usize) -> PendingCall<RelayAllocation>;

    /// Resolve a join code to its allocation
    fn join(&self, join_code: &str) -> PendingCall<RelayAllocation>;

    /// Start listening as host on an allocation
    fn start_host(&self, allocation: &RelayAllocation) -> ProviderResult<()>;

    /// Connect as client to an allocation
    fn start_client(&self, allocation: &RelayAllocation) -> ProviderResult<()>;

    /// Stop the local transport
    fn shutdown(&self);
}
