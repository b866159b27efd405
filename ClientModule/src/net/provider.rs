//! # Lobby Provider
//!
//! The external session service as the session manager sees it. Every call
//! returns immediately; results arrive through the returned pending call.

use xrs_shared::{
    CreateSessionRequest, Member, PlayerId, Session, SessionId, SessionQuery, SessionRef,
    SessionUpdate,
};

use super::PendingCall;

/// Remote lobby service
pub trait LobbyProvider: Send {
    /// Create a session with the requesting member as host
    fn create_session(&self, request: CreateSessionRequest) -> PendingCall<Session>;

    /// Add `member` to a session. Fails with `NotFound` or `Full`.
    fn join_session(&self, session: &SessionRef, member: Member) -> PendingCall<Session>;

    fn get_session(&self, session_id: &SessionId) -> PendingCall<Session>;

    /// Public sessions, newest first
    fn query_sessions(&self, query: SessionQuery) -> PendingCall<Vec<Session>>;

    fn update_session(&self, session_id: &SessionId, update: SessionUpdate) -> PendingCall<Session>;

    /// Remove a member (leave or kick). The service promotes a new host when
    /// the host leaves and deletes the session once it is empty.
    fn remove_player(&self, session_id: &SessionId, player_id: &PlayerId) -> PendingCall<()>;

    /// Keep the session alive; sessions without heartbeats expire server-side
    fn send_heartbeat(&self, session_id: &SessionId) -> PendingCall<()>;
}
