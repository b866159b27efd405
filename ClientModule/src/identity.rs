//! # Identity Client
//!
//! Anonymous sign-in. The player id is issued once and stays stable for the
//! lifetime of the process; every other component keys on it.

use log::{info, warn};
use once_cell::sync::OnceCell;
use xrs_shared::{PlayerId, SyncError, SyncResult};

use crate::net::{poll_slot, PendingCall};

/// Remote identity service
pub trait IdentityProvider: Send {
    fn sign_in_anonymously(&self) -> PendingCall<PlayerId>;
}

/// Caches the player id produced by anonymous sign-in
pub struct IdentityClient {
    provider: Box<dyn IdentityProvider>,

    /// Written once on the first successful sign-in
    player_id: OnceCell<PlayerId>,

    in_flight: Option<PendingCall<PlayerId>>,
}

impl IdentityClient {
    pub fn new(provider: Box<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            player_id: OnceCell::new(),
            in_flight: None,
        }
    }

    /// Start anonymous sign-in.
    ///
    /// Returns `Ok(true)` when a sign-in was started. Returns `Ok(false)` when
    /// already signed in or while a sign-in is in flight; the second request
    /// is dropped, not queued.
    pub fn sign_in(&mut self) -> SyncResult<bool> {
        if self.is_signed_in() {
            return Ok(false);
        }
        if self.in_flight.is_some() {
            warn!("Sign-in already in flight, ignoring request");
            return Ok(false);
        }
        self.in_flight = Some(self.provider.sign_in_anonymously());
        Ok(true)
    }

    /// Resolve an in-flight sign-in. Returns `Some` once, when it completes.
    pub fn poll(&mut self) -> Option<SyncResult<PlayerId>> {
        let result = poll_slot(&mut self.in_flight)?;
        Some(match result {
            Ok(player_id) => {
                let cached = self.player_id.get_or_init(|| player_id);
                info!("Signed in as {}", cached);
                Ok(cached.clone())
            }
            Err(err) => {
                warn!("Anonymous sign-in failed: {}", err);
                Err(SyncError::AuthFailure(err.to_string()))
            }
        })
    }

    pub fn player_id(&self) -> Option<&PlayerId> {
        self.player_id.get()
    }

    pub fn is_signed_in(&self) -> bool {
        self.player_id.get().is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}
