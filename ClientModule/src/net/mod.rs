//! # Network Module
//!
//! Non-blocking calls to external collaborators. A collaborator hands back a
//! [`PendingCall`] immediately and resolves it later through the paired
//! [`Completer`]; the tick loop polls the call and never waits on it.

use log::debug;
use tokio::sync::oneshot::{self, error::TryRecvError};
use xrs_shared::{ProviderError, ProviderResult};

// Module declarations
pub mod provider;  // Lobby service interface
pub mod relay;     // Relay allocation interface
pub mod loopback;  // In-process collaborators

pub use provider::LobbyProvider;
pub use relay::{RelayAllocation, RelayService};
pub use loopback::{LocalIdentityProvider, LocalLobbyService, LocalRelayService};

/// A provider call whose result arrives on a later tick
#[derive(Debug)]
pub struct PendingCall<T> {
    rx: oneshot::Receiver<ProviderResult<T>>,
}

/// Resolves the paired [`PendingCall`]
#[derive(Debug)]
pub struct Completer<T> {
    tx: oneshot::Sender<ProviderResult<T>>,
}

/// Create a linked completer and pending call
pub fn pending_call<T>() -> (Completer<T>, PendingCall<T>) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, PendingCall { rx })
}

impl<T> PendingCall<T> {
    /// A call that is already resolved
    pub fn ready(result: ProviderResult<T>) -> Self {
        let (completer, call) = pending_call();
        completer.complete(result);
        call
    }

    /// Take the result if it has arrived. A completer dropped without
    /// answering counts as a transient failure.
    ///
    /// Returns `Some` at most once; drop the call afterwards.
    pub fn poll(&mut self) -> Option<ProviderResult<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(ProviderError::Transient(
                "call abandoned by provider".to_string(),
            ))),
        }
    }
}

impl<T> Completer<T> {
    pub fn complete(self, result: ProviderResult<T>) {
        if self.tx.send(result).is_err() {
            debug!("Completed a call nobody is waiting for");
        }
    }

    pub fn succeed(self, value: T) {
        self.complete(Ok(value));
    }

    pub fn fail(self, error: ProviderError) {
        self.complete(Err(error));
    }
}

/// Poll an optional in-flight call, clearing the slot once it resolves
pub fn poll_slot<T>(slot: &mut Option<PendingCall<T>>) -> Option<ProviderResult<T>> {
    let result = slot.as_mut()?.poll();
    if result.is_some() {
        *slot = None;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_on_a_later_poll() {
        let (completer, mut call) = pending_call::<u32>();
        assert_eq!(call.poll(), None);
        completer.succeed(7);
        assert_eq!(call.poll(), Some(Ok(7)));
    }

    #[test]
    fn dropped_completer_is_transient() {
        let (completer, mut call) = pending_call::<u32>();
        drop(completer);
        assert!(matches!(call.poll(), Some(Err(ProviderError::Transient(_)))));
    }

    #[test]
    fn slot_clears_after_resolution() {
        let mut slot = Some(PendingCall::ready(Ok("done")));
        assert_eq!(poll_slot(&mut slot), Some(Ok("done")));
        assert!(slot.is_none());
        assert_eq!(poll_slot(&mut slot), None);
    }
}
