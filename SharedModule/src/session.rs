//! # Session Types
//!
//! The session (lobby) record as the external session provider stores it, plus
//! the request shapes used to create, query and update it.

use serde::{Deserialize, Serialize};

use crate::connection::PlayerId;

/// Opaque session identifier assigned by the provider
pub type SessionId = String;

/// Lifecycle status stored on the session record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Accepting members
    Waiting,

    /// Member count reached capacity
    Full,

    /// Handed off to the realtime transport; sticky until explicitly changed
    InProgress,
}

impl SessionStatus {
    /// Status implied by a member count. `InProgress` is never overridden by
    /// capacity bookkeeping.
    pub fn derive(current: SessionStatus, member_count: usize, capacity: usize) -> SessionStatus {
        match current {
            SessionStatus::InProgress => SessionStatus::InProgress,
            _ if member_count >= capacity => SessionStatus::Full,
            _ => SessionStatus::Waiting,
        }
    }
}

/// A member of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Player id of the member
    pub player_id: PlayerId,

    /// Name shown in lobby menus
    pub display_name: String,
}

impl Member {
    pub fn new(player_id: PlayerId, display_name: impl Into<String>) -> Self {
        Self {
            player_id,
            display_name: display_name.into(),
        }
    }
}

/// Session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Provider-assigned id
    pub session_id: SessionId,

    /// Short code used to join private sessions
    pub lobby_code: String,

    /// Session name shown in the list
    pub name: String,

    /// Player id of the authority
    pub host_id: PlayerId,

    /// Maximum number of members including the authority
    pub max_capacity: usize,

    /// Private sessions are never listed and only joinable by code
    pub is_private: bool,

    /// Current lifecycle status
    pub status: SessionStatus,

    /// Experience selected by the authority, used as a list filter tag
    pub selected_experience: Option<String>,

    /// Relay join code; empty until the session is handed off
    pub relay_join_code: String,

    /// Current members; order is not meaningful
    pub members: Vec<Member>,

    /// Provider creation sequence, used for newest-first ordering
    pub created_seq: u64,
}

impl Session {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_member(&self, player_id: &PlayerId) -> bool {
        self.members.iter().any(|m| &m.player_id == player_id)
    }

    pub fn is_host(&self, player_id: &PlayerId) -> bool {
        &self.host_id == player_id
    }

    pub fn has_join_code(&self) -> bool {
        !self.relay_join_code.is_empty()
    }

    /// Recompute `status` from the member count. A session that already
    /// carries a relay join code is treated as in progress even if the
    /// status write has not been observed yet.
    ///
    /// Returns whether the status changed.
    pub fn refresh_status(&mut self) -> bool {
        let current = if self.has_join_code() {
            SessionStatus::InProgress
        } else {
            self.status
        };
        let next = SessionStatus::derive(current, self.member_count(), self.max_capacity);
        let changed = next != self.status;
        self.status = next;
        changed
    }

    /// Sorted member ids, for order-insensitive comparison
    pub fn member_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.members.iter().map(|m| m.player_id.clone()).collect();
        ids.sort();
        ids
    }
}

/// How a client addresses a session it wants to join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionRef {
    /// Public session picked from the list
    Id(SessionId),

    /// Private (or public) session by its lobby code
    Code(String),
}

/// Parameters for creating a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// Session name
    pub name: String,

    /// Maximum number of members
    pub max_capacity: usize,

    /// Whether the session is hidden from the list
    pub is_private: bool,

    /// The creating member, who becomes authority
    pub host: Member,

    /// Initial status
    pub status: SessionStatus,
}

/// Parameters for listing sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionQuery {
    /// Only sessions whose selected experience equals this tag
    pub experience: Option<String>,

    /// Maximum number of results, newest first
    pub page_size: usize,
}

/// Partial update of a session record; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    pub selected_experience: Option<Option<String>>,
    pub relay_join_code: Option<String>,
    pub host_id: Option<PlayerId>,
}

impl SessionUpdate {
    /// Apply this update to a record
    pub fn apply_to(&self, session: &mut Session) {
        if let Some(status) = self.status {
            session.status = status;
        }
        if let Some(experience) = &self.selected_experience {
            session.selected_experience = experience.clone();
        }
        if let Some(code) = &self.relay_join_code {
            session.relay_join_code = code.clone();
        }
        if let Some(host) = &self.host_id {
            session.host_id = host.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(capacity: usize, members: usize) -> Session {
        Session {
            session_id: "s".into(),
            lobby_code: "CODE".into(),
            name: "test".into(),
            host_id: PlayerId::from("p0"),
            max_capacity: capacity,
            is_private: false,
            status: SessionStatus::Waiting,
            selected_experience: None,
            relay_join_code: String::new(),
            members: (0..members)
                .map(|i| Member::new(PlayerId::new(format!("p{i}")), format!("Player {i}")))
                .collect(),
            created_seq: 0,
        }
    }

    #[test]
    fn full_exactly_at_capacity() {
        for capacity in 1..=8 {
            let mut s = session_with(capacity, capacity);
            s.refresh_status();
            assert_eq!(s.status, SessionStatus::Full, "capacity {capacity}");

            let mut s = session_with(capacity, capacity - 1);
            s.refresh_status();
            assert_eq!(s.status, SessionStatus::Waiting, "capacity {capacity}");
        }
    }

    #[test]
    fn in_progress_is_sticky() {
        let mut s = session_with(4, 4);
        s.status = SessionStatus::InProgress;
        s.members.pop();
        assert!(!s.refresh_status());
        assert_eq!(s.status, SessionStatus::InProgress);
    }

    #[test]
    fn join_code_without_status_counts_as_in_progress() {
        let mut s = session_with(4, 2);
        s.relay_join_code = "ABC123".into();
        assert!(s.refresh_status());
        assert_eq!(s.status, SessionStatus::InProgress);
    }
}
