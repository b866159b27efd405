//! # Session Events
//!
//! What the session manager reports to the UI and the scene loader, and the
//! states it moves through.

use xrs_shared::{Member, PlayerId, Session, SessionStatus, SyncError};

/// Lobby lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Unauthenticated,
    Authenticating,

    /// Signed in, no list fetched yet
    Authenticated,

    /// Signed in and not in a session
    Browsing,

    /// Create or join in flight
    Joining,

    /// Member of a session with the given local status
    InLobby(SessionStatus),

    /// Leave in flight
    Leaving,
}

impl ManagerState {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, ManagerState::Unauthenticated | ManagerState::Authenticating)
    }

    pub fn in_lobby(&self) -> bool {
        matches!(self, ManagerState::InLobby(_))
    }

    /// Joining, joined or leaving
    pub fn holds_session(&self) -> bool {
        matches!(
            self,
            ManagerState::Joining | ManagerState::InLobby(_) | ManagerState::Leaving
        )
    }
}

/// Operation named in an `OperationFailed` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    Authenticate,
    Create,
    Join,
    Leave,
    ChangeExperience,
    Kick,
    TransferAuthority,
    StatusWriteBack,
    Handoff,
}

/// Notification for the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Authenticated(PlayerId),
    SessionJoined(Session),

    /// Left voluntarily, kicked, or the session disappeared
    SessionLeft,

    /// Always fired after a refresh, empty on provider failure
    ListRefreshed(Vec<Session>),

    MembersChanged(Vec<Member>),
    ExperienceChanged(Option<String>),

    /// The session's host changed
    AuthorityChanged(PlayerId),

    /// The realtime transport is up; load the experience scene
    HandoffReady,

    /// A remote operation failed; the UI offers "try again"
    OperationFailed { op: SessionOp, error: SyncError },
}
