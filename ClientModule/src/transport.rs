//! # Transport Bootstrap
//!
//! Allocates or joins a relay and starts the local transport as host or
//! client. Each step is a one-shot call: failures are logged and reported
//! as `None`/`false`, and the caller decides whether to try again.

use log::{info, warn};
use xrs_shared::{ProviderResult, TransportRole};

use crate::net::{PendingCall, RelayAllocation, RelayService};

pub struct TransportBootstrap {
    relay: Box<dyn RelayService>,

    /// What the local transport is doing
    role: TransportRole,

    /// Allocation the transport is running on
    allocation: Option<RelayAllocation>,

    /// Client joins attempted, successful or not
    join_attempts: usize,
}

impl TransportBootstrap {
    pub fn new(relay: Box<dyn RelayService>) -> Self {
        Self {
            relay,
            role: TransportRole::Idle,
            allocation: None,
            join_attempts: 0,
        }
    }

    /// Request a relay allocation for `max_peers` peers
    pub fn create_realtime_allocation(&mut self, max_peers: usize) -> PendingCall<RelayAllocation> {
        info!("Requesting relay allocation for {} peers", max_peers);
        self.relay.allocate(max_peers)
    }

    /// Finish `create_realtime_allocation`: start hosting and return the join code
    pub fn complete_host(&mut self, result: ProviderResult<RelayAllocation>) -> Option<String> {
        let allocation = match result {
            Ok(allocation) => allocation,
            Err(err) => {
                warn!("Relay allocation failed: {}", err);
                return None;
            }
        };
        if let Err(err) = self.relay.start_host(&allocation) {
            warn!("Failed to start host transport: {}", err);
            return None;
        }
        info!("Hosting relay {}", allocation.join_code);
        let join_code = allocation.join_code.clone();
        self.role = TransportRole::Host;
        self.allocation = Some(allocation);
        Some(join_code)
    }

    /// Resolve a join code to its allocation
    pub fn join_realtime_allocation(&mut self, join_code: &str) -> PendingCall<RelayAllocation> {
        self.join_attempts += 1;
        info!("Joining relay {} (attempt {})", join_code, self.join_attempts);
        self.relay.join(join_code)
    }

    /// Finish `join_realtime_allocation`: start the client transport
    pub fn complete_client(&mut self, result: ProviderResult<RelayAllocation>) -> bool {
        let allocation = match result {
            Ok(allocation) => allocation,
            Err(err) => {
                warn!("Relay join failed: {}", err);
                return false;
            }
        };
        if let Err(err) = self.relay.start_client(&allocation) {
            warn!("Failed to start client transport: {}", err);
            return false;
        }
        info!("Connected to relay {}", allocation.join_code);
        self.role = TransportRole::Client;
        self.allocation = Some(allocation);
        true
    }

    /// Listening as host or connected as client
    pub fn is_active(&self) -> bool {
        self.role != TransportRole::Idle
    }

    pub fn role(&self) -> TransportRole {
        self.role
    }

    pub fn join_code(&self) -> Option<&str> {
        self.allocation.as_ref().map(|a| a.join_code.as_str())
    }

    pub fn join_attempts(&self) -> usize {
        self.join_attempts
    }

    pub fn shutdown(&mut self) {
        if !self.is_active() {
            return;
        }
        info!("Shutting down {:?} transport", self.role);
        self.relay.shutdown();
        self.role = TransportRole::Idle;
        self.allocation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::LocalRelayService;
    use xrs_shared::ProviderError;

    #[test]
    fn host_then_client() {
        let relay = LocalRelayService::new();
        let mut host = TransportBootstrap::new(Box::new(relay.clone()));
        let mut client = TransportBootstrap::new(Box::new(relay.clone()));

        let result = host.create_realtime_allocation(4).poll().unwrap();
        let code = host.complete_host(result).unwrap();
        assert_eq!(host.role(), TransportRole::Host);

        let result = client.join_realtime_allocation(&code).poll().unwrap();
        assert!(client.complete_client(result));
        assert!(client.is_active());
        assert_eq!(client.join_code(), Some(code.as_str()));
    }

    #[test]
    fn failures_report_without_retrying() {
        let relay = LocalRelayService::new();
        let mut bootstrap = TransportBootstrap::new(Box::new(relay.clone()));

        relay.fail_next(ProviderError::Transient("relay down".into()));
        let result = bootstrap.create_realtime_allocation(4).poll().unwrap();
        assert_eq!(bootstrap.complete_host(result), None);

        let result = bootstrap.join_realtime_allocation("NOPE00").poll().unwrap();
        assert!(!bootstrap.complete_client(result));
        assert!(!bootstrap.is_active());
        assert_eq!(bootstrap.join_attempts(), 1);
        assert_eq!(relay.allocation_count(), 0);
    }
}
