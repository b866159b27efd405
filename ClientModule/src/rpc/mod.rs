//! # RPC Module
//!
//! The client end of the authority channel: requests go out on the shared
//! inbox, authority messages come back on this peer's own receiver.

use log::{debug, warn};
use serde::Serialize;
use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver, UnboundedSender};
use xrs_shared::{ObjectTypeId, PlayerId, Request, RequestOp, ServerMessage, SyncError, SyncResult};

/// Channel pair connecting one peer to the authority
#[derive(Debug)]
pub struct AuthorityLink {
    player_id: PlayerId,
    requests: UnboundedSender<Request>,
    inbox: UnboundedReceiver<ServerMessage>,
    next_call_id: u64,
}

impl AuthorityLink {
    pub fn new(
        player_id: PlayerId,
        requests: UnboundedSender<Request>,
        inbox: UnboundedReceiver<ServerMessage>,
    ) -> Self {
        Self {
            player_id,
            requests,
            inbox,
            next_call_id: 1,
        }
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    /// Send a request to the authority. Returns its call id.
    pub fn call<A: Serialize>(&mut self, op: RequestOp, type_id: &ObjectTypeId, args: &A) -> SyncResult<u64> {
        let call_id = self.next_call_id;
        self.next_call_id += 1;

        let request = Request::new(call_id, op, type_id.clone(), args, self.player_id.clone())?;
        debug!("Calling {:?} on {} (call {})", op, type_id, call_id);
        if self.requests.send(request).is_err() {
            warn!("Authority channel closed, dropping {:?} on {}", op, type_id);
            return Err(SyncError::ProviderTransient("authority unreachable".to_string()));
        }
        Ok(call_id)
    }

    /// Next authority message, if one has arrived
    pub fn try_next(&mut self) -> Option<ServerMessage> {
        match self.inbox.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                debug!("Authority channel closed");
                None
            }
        }
    }
}
