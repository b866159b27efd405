//! # RPC Module (Server-Side)
//!
//! The authority's message loop:
//! - draining client `Request`s from the shared inbox
//! - dispatching each to its handler
//! - answering single peers with `Targeted` calls

use log::debug;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use xrs_shared::Request;

use crate::AuthorityServer;

// Module for dispatching requests
pub mod dispatch;

// Module for sending targeted calls to peers
pub mod outgoing;

pub use dispatch::dispatch_request;

/// Sending half of the authority inbox, cloned into every peer
pub type RequestSender = UnboundedSender<Request>;

/// Receiving half of the authority inbox
pub type RequestInbox = UnboundedReceiver<Request>;

/// Dispatch every queued request without waiting. Returns the number handled.
pub fn process_inbox(server: &mut AuthorityServer) -> usize {
    let mut handled = 0;
    while let Ok(request) = server.inbox.try_recv() {
        dispatch_request(server, &request);
        handled += 1;
    }
    if handled > 0 {
        debug!("Processed {} requests", handled);
    }
    handled
}
