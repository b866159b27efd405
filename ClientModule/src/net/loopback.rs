//! # Loopback Collaborators
//!
//! In-process implementations of the lobby, relay and identity services.
//! They are cloneable handles onto shared state so a test or a local demo
//! can keep one handle while the session manager owns another.
//!
//! Calls complete immediately by default. In deferred mode they queue until
//! [`LocalLobbyService::flush`] (or the matching method on the other
//! services), which lets callers observe in-flight operations.

use log::debug;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use xrs_shared::constants::transport::{JOIN_CODE_ALPHABET, JOIN_CODE_LENGTH};
use xrs_shared::{
    CreateSessionRequest, Member, PlayerId, ProviderError, ProviderResult, Session, SessionId,
    SessionQuery, SessionRef, SessionUpdate, TransportRole,
};

use super::{pending_call, LobbyProvider, PendingCall, RelayAllocation, RelayService};
use crate::identity::IdentityProvider;

type QueuedCall<S> = Box<dyn FnOnce(&mut S) + Send>;

struct Shared<S> {
    state: S,
    deferred: bool,
    queued: Vec<QueuedCall<S>>,
    fail_next: Option<ProviderError>,
}

/// Shared state plus the deferral and fault-injection machinery
struct Loopback<S> {
    inner: Arc<Mutex<Shared<S>>>,
}

impl<S> Clone for Loopback<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Send + 'static> Loopback<S> {
    fn new(state: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Shared {
                state,
                deferred: false,
                queued: Vec::new(),
                fail_next: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared<S>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn call<T: Send + 'static>(
        &self,
        op: impl FnOnce(&mut S) -> ProviderResult<T> + Send + 'static,
    ) -> PendingCall<T> {
        let (completer, call) = pending_call();
        let mut shared = self.lock();
        if let Some(err) = shared.fail_next.take() {
            completer.fail(err);
            return call;
        }
        let job = move |state: &mut S| completer.complete(op(state));
        if shared.deferred {
            shared.queued.push(Box::new(job));
        } else {
            job(&mut shared.state);
        }
        call
    }

    fn flush(&self) -> usize {
        let mut shared = self.lock();
        let queued = std::mem::take(&mut shared.queued);
        let count = queued.len();
        for job in queued {
            job(&mut shared.state);
        }
        count
    }

    fn set_deferred(&self, deferred: bool) {
        self.lock().deferred = deferred;
    }

    fn fail_next(&self, error: ProviderError) {
        self.lock().fail_next = Some(error);
    }

    fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.lock().state)
    }

    fn write<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.lock().state)
    }
}

fn random_code() -> String {
    let mut rng = rand::thread_rng();
    (0..JOIN_CODE_LENGTH)
        .map(|_| JOIN_CODE_ALPHABET[rng.gen_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

// ----------------------------------------------------------------------------
// Lobby
// ----------------------------------------------------------------------------

#[derive(Default)]
struct LobbyState {
    sessions: BTreeMap<SessionId, Session>,
    next_seq: u64,
    heartbeats: HashMap<SessionId, usize>,
    queries: usize,
}

impl LobbyState {
    fn find(&mut self, session: &SessionRef) -> Option<&mut Session> {
        match session {
            // Private sessions are only reachable by code
            SessionRef::Id(id) => self.sessions.get_mut(id).filter(|s| !s.is_private),
            SessionRef::Code(code) => self.sessions.values_mut().find(|s| &s.lobby_code == code),
        }
    }
}

/// In-process lobby service. Status is stored as written by the host; the
/// service itself only enforces capacity and promotes a new host.
#[derive(Clone)]
pub struct LocalLobbyService {
    shared: Loopback<LobbyState>,
}

impl Default for LocalLobbyService {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalLobbyService {
    pub fn new() -> Self {
        Self {
            shared: Loopback::new(LobbyState::default()),
        }
    }

    pub fn set_deferred(&self, deferred: bool) {
        self.shared.set_deferred(deferred);
    }

    /// Complete every queued call. Returns how many ran.
    pub fn flush(&self) -> usize {
        self.shared.flush()
    }

    /// Fail the next call with `error`
    pub fn fail_next(&self, error: ProviderError) {
        self.shared.fail_next(error);
    }

    pub fn session(&self, session_id: &SessionId) -> Option<Session> {
        self.shared.read(|state| state.sessions.get(session_id).cloned())
    }

    pub fn session_count(&self) -> usize {
        self.shared.read(|state| state.sessions.len())
    }

    pub fn heartbeat_count(&self, session_id: &SessionId) -> usize {
        self.shared.read(|state| state.heartbeats.get(session_id).copied().unwrap_or(0))
    }

    pub fn query_count(&self) -> usize {
        self.shared.read(|state| state.queries)
    }

    /// Drop a session as if it expired server-side
    pub fn expire(&self, session_id: &SessionId) -> bool {
        self.shared.write(|state| state.sessions.remove(session_id).is_some())
    }
}

impl LobbyProvider for LocalLobbyService {
    fn create_session(&self, request: CreateSessionRequest) -> PendingCall<Session> {
        self.shared.call(move |state| {
            if request.max_capacity == 0 {
                return Err(ProviderError::Fatal("capacity must be at least 1".to_string()));
            }
            state.next_seq += 1;
            let session = Session {
                session_id: format!("session-{}", state.next_seq),
                lobby_code: random_code(),
                name: request.name,
                host_id: request.host.player_id.clone(),
                max_capacity: request.max_capacity,
                is_private: request.is_private,
                status: request.status,
                selected_experience: None,
                relay_join_code: String::new(),
                members: vec![request.host],
                created_seq: state.next_seq,
            };
            debug!("Lobby created {} ({})", session.session_id, session.lobby_code);
            state.sessions.insert(session.session_id.clone(), session.clone());
            Ok(session)
        })
    }

    fn join_session(&self, session: &SessionRef, member: Member) -> PendingCall<Session> {
        let session = session.clone();
        self.shared.call(move |state| {
            let target = state.find(&session).ok_or(ProviderError::NotFound)?;
            if target.is_member(&member.player_id) {
                return Ok(target.clone());
            }
            if target.member_count() >= target.max_capacity {
                return Err(ProviderError::Full);
            }
            debug!("{} joined {}", member.player_id, target.session_id);
            target.members.push(member);
            Ok(target.clone())
        })
    }

    fn get_session(&self, session_id: &SessionId) -> PendingCall<Session> {
        let session_id = session_id.clone();
        self.shared
            .call(move |state| state.sessions.get(&session_id).cloned().ok_or(ProviderError::NotFound))
    }

    fn query_sessions(&self, query: SessionQuery) -> PendingCall<Vec<Session>> {
        self.shared.call(move |state| {
            state.queries += 1;
            let mut found: Vec<Session> = state
                .sessions
                .values()
                .filter(|s| !s.is_private)
                .filter(|s| match &query.experience {
                    Some(tag) => s.selected_experience.as_ref() == Some(tag),
                    None => true,
                })
                .cloned()
                .collect();
            found.sort_by(|a, b| b.created_seq.cmp(&a.created_seq));
            found.truncate(query.page_size);
            Ok(found)
        })
    }

    fn update_session(&self, session_id: &SessionId, update: SessionUpdate) -> PendingCall<Session> {
        let session_id = session_id.clone();
        self.shared.call(move |state| {
            let session = state.sessions.get_mut(&session_id).ok_or(ProviderError::NotFound)?;
            update.apply_to(session);
            Ok(session.clone())
        })
    }

    fn remove_player(&self, session_id: &SessionId, player_id: &PlayerId) -> PendingCall<()> {
        let session_id = session_id.clone();
        let player_id = player_id.clone();
        self.shared.call(move |state| {
            let session = state.sessions.get_mut(&session_id).ok_or(ProviderError::NotFound)?;
            session.members.retain(|m| m.player_id != player_id);

            if session.members.is_empty() {
                debug!("Lobby {} is empty, deleting", session_id);
                state.sessions.remove(&session_id);
                state.heartbeats.remove(&session_id);
                return Ok(());
            }
            if session.host_id == player_id {
                if let Some(next) = session.members.first() {
                    debug!("Host {} left {}, promoting {}", player_id, session_id, next.player_id);
                    session.host_id = next.player_id.clone();
                }
            }
            Ok(())
        })
    }

    fn send_heartbeat(&self, session_id: &SessionId) -> PendingCall<()> {
        let session_id = session_id.clone();
        self.shared.call(move |state| {
            if !state.sessions.contains_key(&session_id) {
                return Err(ProviderError::NotFound);
            }
            *state.heartbeats.entry(session_id).or_insert(0) += 1;
            Ok(())
        })
    }
}

// ----------------------------------------------------------------------------
// Relay
// ----------------------------------------------------------------------------

struct RelayState {
    allocations: HashMap<String, RelayAllocation>,
    role: TransportRole,
    client_starts: usize,
}

/// In-process relay allocator and transport
#[derive(Clone)]
pub struct LocalRelayService {
    shared: Loopback<RelayState>,
}

impl Default for LocalRelayService {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalRelayService {
    pub fn new() -> Self {
        Self {
            shared: Loopback::new(RelayState {
                allocations: HashMap::new(),
                role: TransportRole::Idle,
                client_starts: 0,
            }),
        }
    }

    pub fn set_deferred(&self, deferred: bool) {
        self.shared.set_deferred(deferred);
    }

    pub fn flush(&self) -> usize {
        self.shared.flush()
    }

    pub fn fail_next(&self, error: ProviderError) {
        self.shared.fail_next(error);
    }

    /// Role of the most recently started transport on this handle
    pub fn role(&self) -> TransportRole {
        self.shared.read(|state| state.role)
    }

    /// Number of times a client transport was started
    pub fn client_starts(&self) -> usize {
        self.shared.read(|state| state.client_starts)
    }

    pub fn allocation_count(&self) -> usize {
        self.shared.read(|state| state.allocations.len())
    }
}

impl RelayService for LocalRelayService {
    fn allocate(&self, max_peers: usize) -> PendingCall<RelayAllocation> {
        self.shared.call(move |state| {
            let allocation = RelayAllocation {
                join_code: random_code(),
                max_peers,
            };
            state.allocations.insert(allocation.join_code.clone(), allocation.clone());
            Ok(allocation)
        })
    }

    fn join(&self, join_code: &str) -> PendingCall<RelayAllocation> {
        let join_code = join_code.to_string();
        self.shared
            .call(move |state| state.allocations.get(&join_code).cloned().ok_or(ProviderError::NotFound))
    }

    fn start_host(&self, allocation: &RelayAllocation) -> ProviderResult<()> {
        debug!("Relay host listening on {}", allocation.join_code);
        self.shared.write(|state| state.role = TransportRole::Host);
        Ok(())
    }

    fn start_client(&self, allocation: &RelayAllocation) -> ProviderResult<()> {
        debug!("Relay client connecting to {}", allocation.join_code);
        self.shared.write(|state| {
            state.role = TransportRole::Client;
            state.client_starts += 1;
        });
        Ok(())
    }

    fn shutdown(&self) {
        self.shared.write(|state| state.role = TransportRole::Idle);
    }
}

// ----------------------------------------------------------------------------
// Identity
// ----------------------------------------------------------------------------

/// In-process anonymous sign-in issuing random opaque ids
#[derive(Clone)]
pub struct LocalIdentityProvider {
    shared: Loopback<usize>,
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        Self {
            shared: Loopback::new(0),
        }
    }

    pub fn set_deferred(&self, deferred: bool) {
        self.shared.set_deferred(deferred);
    }

    pub fn flush(&self) -> usize {
        self.shared.flush()
    }

    pub fn fail_next(&self, error: ProviderError) {
        self.shared.fail_next(error);
    }

    /// Number of ids issued
    pub fn issued(&self) -> usize {
        self.shared.read(|issued| *issued)
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn sign_in_anonymously(&self) -> PendingCall<PlayerId> {
        self.shared.call(|issued| {
            *issued += 1;
            let id: u64 = rand::thread_rng().gen();
            Ok(PlayerId::new(format!("player-{:016x}", id)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrs_shared::SessionStatus;

    fn host(id: &str) -> Member {
        Member::new(PlayerId::from(id), id)
    }

    fn create(lobby: &LocalLobbyService, name: &str, capacity: usize, private: bool) -> Session {
        lobby
            .create_session(CreateSessionRequest {
                name: name.into(),
                max_capacity: capacity,
                is_private: private,
                host: host(name),
                status: SessionStatus::Waiting,
            })
            .poll()
            .unwrap()
            .unwrap()
    }

    #[test]
    fn capacity_is_enforced() {
        let lobby = LocalLobbyService::new();
        let session = create(&lobby, "a", 2, false);
        let by_id = SessionRef::Id(session.session_id.clone());

        assert!(lobby.join_session(&by_id, host("b")).poll().unwrap().is_ok());
        assert_eq!(
            lobby.join_session(&by_id, host("c")).poll(),
            Some(Err(ProviderError::Full))
        );
    }

    #[test]
    fn private_sessions_join_by_code_only() {
        let lobby = LocalLobbyService::new();
        let session = create(&lobby, "a", 4, true);

        assert_eq!(
            lobby
                .join_session(&SessionRef::Id(session.session_id.clone()), host("b"))
                .poll(),
            Some(Err(ProviderError::NotFound))
        );
        assert!(lobby
            .join_session(&SessionRef::Code(session.lobby_code.clone()), host("b"))
            .poll()
            .unwrap()
            .is_ok());

        let listed = lobby
            .query_sessions(SessionQuery { experience: None, page_size: 10 })
            .poll()
            .unwrap()
            .unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn host_leaving_promotes_a_member() {
        let lobby = LocalLobbyService::new();
        let session = create(&lobby, "a", 4, false);
        let id = session.session_id.clone();
        lobby.join_session(&SessionRef::Id(id.clone()), host("b")).poll();

        lobby.remove_player(&id, &PlayerId::from("a")).poll();
        assert_eq!(lobby.session(&id).unwrap().host_id, PlayerId::from("b"));

        lobby.remove_player(&id, &PlayerId::from("b")).poll();
        assert!(lobby.session(&id).is_none());
    }

    #[test]
    fn query_is_newest_first_and_filtered() {
        let lobby = LocalLobbyService::new();
        let first = create(&lobby, "a", 4, false);
        let second = create(&lobby, "b", 4, false);
        lobby
            .update_session(
                &first.session_id,
                SessionUpdate {
                    selected_experience: Some(Some("solar".into())),
                    ..SessionUpdate::default()
                },
            )
            .poll();

        let all = lobby
            .query_sessions(SessionQuery { experience: None, page_size: 10 })
            .poll()
            .unwrap()
            .unwrap();
        assert_eq!(all[0].session_id, second.session_id);

        let solar = lobby
            .query_sessions(SessionQuery { experience: Some("solar".into()), page_size: 10 })
            .poll()
            .unwrap()
            .unwrap();
        assert_eq!(solar.len(), 1);
        assert_eq!(solar[0].session_id, first.session_id);
    }

    #[test]
    fn deferred_calls_wait_for_flush() {
        let lobby = LocalLobbyService::new();
        lobby.set_deferred(true);
        let mut call = lobby.query_sessions(SessionQuery { experience: None, page_size: 5 });
        assert!(call.poll().is_none());
        assert_eq!(lobby.flush(), 1);
        assert_eq!(call.poll(), Some(Ok(Vec::new())));
    }

    #[test]
    fn relay_codes_resolve() {
        let relay = LocalRelayService::new();
        let allocation = relay.allocate(4).poll().unwrap().unwrap();
        assert_eq!(allocation.join_code.len(), JOIN_CODE_LENGTH);
        assert_eq!(relay.join(&allocation.join_code).poll(), Some(Ok(allocation)));
        assert_eq!(relay.join("NOPE00").poll(), Some(Err(ProviderError::NotFound)));
    }
}
