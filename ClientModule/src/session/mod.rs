//! # Session Manager
//!
//! Owns the lobby lifecycle: sign-in, list refresh, create and join,
//! capacity and status bookkeeping, heartbeat and poll timers, host
//! migration, kick, and the handoff to the realtime transport.
//!
//! Every operation checks its local preconditions first and returns `Err`
//! without touching the network when they fail. Accepted operations start a
//! provider call and return at once; the outcome arrives as a
//! [`SessionEvent`] on a later [`SessionManager::tick`].

use log::{debug, info, warn};
use std::collections::VecDeque;
use std::time::Duration;
use xrs_shared::{
    CreateSessionRequest, Member, PlayerId, Session, SessionId, SessionQuery, SessionRef,
    SessionStatus, SessionUpdate, SyncConfig, SyncError, SyncResult,
};

use crate::identity::IdentityClient;
use crate::net::{LobbyProvider, PendingCall, RelayAllocation};
use crate::transport::TransportBootstrap;

// Submodules
pub mod events;      // Events and states
pub mod timer;       // Heartbeat and poll timers
mod completion;      // Resolution of in-flight calls

pub use events::{ManagerState, SessionEvent, SessionOp};
pub use timer::IntervalTimer;

/// The create, join or leave call currently in flight
enum MembershipCall {
    Create(PendingCall<Session>),
    Join(PendingCall<Session>),
    Leave(PendingCall<()>),
}

/// A call tagged with the membership generation it was issued under
struct Tagged<T> {
    generation: u64,
    op: SessionOp,
    call: PendingCall<T>,
}

/// Progress of the realtime handoff
enum Handoff {
    Idle,

    /// Authority: waiting for a relay allocation
    Allocating(PendingCall<RelayAllocation>),

    /// Authority: writing the join code into the session
    Publishing(PendingCall<Session>),

    /// Member: joining the relay named by the session
    Joining(PendingCall<RelayAllocation>),

    Done,
}

/// Lobby lifecycle state machine for one local player
pub struct SessionManager {
    config: SyncConfig,
    identity: IdentityClient,
    lobby: Box<dyn LobbyProvider>,
    transport: TransportBootstrap,

    state: ManagerState,

    /// Local snapshot of the joined session, refreshed by polling
    session: Option<Session>,

    /// Name shown to other members
    display_name: String,

    /// Experience tag applied to list refreshes
    list_filter: Option<String>,

    /// Bumped by every membership change; older completions are stale
    generation: u64,

    membership: Option<MembershipCall>,

    /// Superseded creates and joins; a late success is undone
    orphans: Vec<PendingCall<Session>>,

    /// Fire-and-forget cleanup calls
    background: Vec<PendingCall<()>>,

    /// List query in flight and the experience filter it was issued with
    refresh: Option<(Option<String>, PendingCall<Vec<Session>>)>,
    updates: Vec<Tagged<Session>>,
    kicks: Vec<Tagged<()>>,
    /// Periodic re-fetch of the joined session, tagged with its generation
    poll_call: Option<(u64, PendingCall<Session>)>,
    heartbeat_call: Option<PendingCall<()>>,
    handoff: Handoff,

    heartbeat_timer: IntervalTimer,
    poll_timer: IntervalTimer,

    events: VecDeque<SessionEvent>,
}

impl SessionManager {
    pub fn new(
        config: SyncConfig,
        identity: IdentityClient,
        lobby: Box<dyn LobbyProvider>,
        transport: TransportBootstrap,
    ) -> Self {
        let heartbeat_timer = IntervalTimer::new(config.heartbeat_interval());
        let poll_timer = IntervalTimer::new(config.poll_interval());
        Self {
            config,
            identity,
            lobby,
            transport,
            state: ManagerState::Unauthenticated,
            session: None,
            display_name: String::new(),
            list_filter: None,
            generation: 0,
            membership: None,
            orphans: Vec::new(),
            background: Vec::new(),
            refresh: None,
            updates: Vec::new(),
            kicks: Vec::new(),
            poll_call: None,
            heartbeat_call: None,
            handoff: Handoff::Idle,
            heartbeat_timer,
            poll_timer,
            events: VecDeque::new(),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn player_id(&self) -> Option<&PlayerId> {
        self.identity.player_id()
    }

    /// Whether the local player is the session's host
    pub fn is_authority(&self) -> bool {
        match (&self.session, self.identity.player_id()) {
            (Some(session), Some(me)) => session.is_host(me),
            _ => false,
        }
    }

    /// Whether the realtime transport is up for this session
    pub fn is_handed_off(&self) -> bool {
        matches!(self.handoff, Handoff::Done)
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn list_filter(&self) -> Option<&str> {
        self.list_filter.as_deref()
    }

    pub fn transport(&self) -> &TransportBootstrap {
        &self.transport
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Take every event emitted since the last call
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Anonymous sign-in. Idempotent once signed in; ignored while in flight.
    pub fn authenticate(&mut self) -> SyncResult<()> {
        if self.identity.sign_in()? {
            self.state = ManagerState::Authenticating;
        }
        Ok(())
    }

    /// Create a session hosted by the local player. A capacity of one is
    /// full from the start.
    pub fn create_session(&mut self, display_name: &str, capacity: usize, is_private: bool) -> SyncResult<()> {
        let me = self.require_free("create session")?;
        if capacity == 0 || capacity > self.config.max_capacity {
            warn!("Rejected session capacity {} (max {})", capacity, self.config.max_capacity);
            return Err(SyncError::InvalidArgument(format!("capacity {}", capacity)));
        }

        let status = if capacity == 1 {
            SessionStatus::Full
        } else {
            SessionStatus::Waiting
        };
        let request = CreateSessionRequest {
            name: format!("{}'s session", display_name),
            max_capacity: capacity,
            is_private,
            host: Member::new(me, display_name),
            status,
        };

        info!("Creating session '{}' for {} players", request.name, capacity);
        self.display_name = display_name.to_string();
        self.generation += 1;
        self.membership = Some(MembershipCall::Create(self.lobby.create_session(request)));
        self.state = ManagerState::Joining;
        Ok(())
    }

    /// Join a listed session by id or a private one by code
    pub fn join_session(&mut self, session: SessionRef, display_name: &str) -> SyncResult<()> {
        let me = self.require_free("join session")?;

        info!("Joining session {:?}", session);
        self.display_name = display_name.to_string();
        self.generation += 1;
        let member = Member::new(me, display_name);
        self.membership = Some(MembershipCall::Join(self.lobby.join_session(&session, member)));
        self.state = ManagerState::Joining;
        Ok(())
    }

    /// Leave the current session. A create or join still in flight is
    /// abandoned and undone if it completes.
    pub fn leave_session(&mut self) -> SyncResult<()> {
        match self.state {
            ManagerState::InLobby(_) => {
                let session_id = self.current_session_id()?;
                let me = self.require_player()?;
                info!("Leaving session {}", session_id);
                self.generation += 1;
                self.state = ManagerState::Leaving;
                self.membership = Some(MembershipCall::Leave(self.lobby.remove_player(&session_id, &me)));
                Ok(())
            }
            ManagerState::Joining => {
                info!("Leaving while a join is in flight");
                match self.membership.take() {
                    Some(MembershipCall::Create(call)) | Some(MembershipCall::Join(call)) => {
                        self.orphans.push(call)
                    }
                    Some(MembershipCall::Leave(call)) => self.background.push(call),
                    None => {}
                }
                self.finish_leave();
                Ok(())
            }
            ManagerState::Leaving => {
                warn!("Leave already in progress");
                Err(SyncError::NotInSession)
            }
            _ => {
                warn!("Cannot leave, not in a session");
                Err(SyncError::NotInSession)
            }
        }
    }

    /// Authority: tag the session with an experience, used as a list filter
    pub fn change_experience(&mut self, name: Option<String>) -> SyncResult<()> {
        let session_id = self.require_authority("change experience")?;
        info!("Changing experience to {:?}", name);
        let update = SessionUpdate {
            selected_experience: Some(name),
            ..SessionUpdate::default()
        };
        self.issue_update(&session_id, SessionOp::ChangeExperience, update);
        Ok(())
    }

    /// Authority: remove another member
    pub fn kick(&mut self, player_id: &PlayerId) -> SyncResult<()> {
        let session_id = self.require_authority("kick")?;
        self.require_other_member(player_id)?;
        info!("Kicking {} from {}", player_id, session_id);
        self.kicks.push(Tagged {
            generation: self.generation,
            op: SessionOp::Kick,
            call: self.lobby.remove_player(&session_id, player_id),
        });
        Ok(())
    }

    /// Authority: make another member the host
    pub fn transfer_authority(&mut self, player_id: &PlayerId) -> SyncResult<()> {
        let session_id = self.require_authority("transfer authority")?;
        self.require_other_member(player_id)?;
        info!("Transferring authority of {} to {}", session_id, player_id);
        let update = SessionUpdate {
            host_id: Some(player_id.clone()),
            ..SessionUpdate::default()
        };
        self.issue_update(&session_id, SessionOp::TransferAuthority, update);
        Ok(())
    }

    /// Fetch the newest public sessions. `filter` replaces the experience
    /// filter; `clear_filters` drops it first. Always ends in `ListRefreshed`.
    pub fn refresh_list(&mut self, filter: Option<String>, clear_filters: bool) -> SyncResult<()> {
        if !self.state.is_authenticated() {
            warn!("Cannot refresh the session list before sign-in");
            return Err(SyncError::permission_denied("refresh list before sign-in"));
        }
        if clear_filters {
            self.list_filter = None;
        }
        if filter.is_some() {
            self.list_filter = filter;
        }
        self.start_refresh();
        Ok(())
    }

    /// Authority: allocate the relay, publish its join code and go in progress
    pub fn prepare_realtime_handoff(&mut self) -> SyncResult<()> {
        self.require_authority("prepare realtime handoff")?;
        if !matches!(self.handoff, Handoff::Idle) {
            warn!("Realtime handoff already started");
            return Err(SyncError::InvalidArgument("handoff already started".to_string()));
        }
        let max_peers = self.session.as_ref().map(|s| s.max_capacity).unwrap_or(1);
        self.handoff = Handoff::Allocating(self.transport.create_realtime_allocation(max_peers));
        Ok(())
    }

    /// Advance timers by `dt` and resolve every call that has completed
    pub fn tick(&mut self, dt: Duration) {
        self.poll_identity();
        self.poll_membership();
        self.poll_background();
        self.poll_refresh();
        self.poll_kicks();
        self.poll_updates();
        self.poll_handoff();
        self.poll_session_fetch();
        self.poll_heartbeat();
        self.run_timers(dt);
    }

    // ------------------------------------------------------------------
    // Preconditions
    // ------------------------------------------------------------------

    fn require_player(&self) -> SyncResult<PlayerId> {
        match self.identity.player_id() {
            Some(player_id) if self.state.is_authenticated() => Ok(player_id.clone()),
            _ => {
                warn!("Operation requires sign-in");
                Err(SyncError::permission_denied("operation before sign-in"))
            }
        }
    }

    /// Signed in and not holding a session
    fn require_free(&self, operation: &str) -> SyncResult<PlayerId> {
        let me = self.require_player()?;
        if self.state.holds_session() {
            warn!("Cannot {}: already in a session", operation);
            return Err(SyncError::AlreadyInSession);
        }
        Ok(me)
    }

    fn current_session_id(&self) -> SyncResult<SessionId> {
        match (&self.session, self.state.in_lobby()) {
            (Some(session), true) => Ok(session.session_id.clone()),
            _ => Err(SyncError::NotInSession),
        }
    }

    /// In a session as its host; returns the session id
    fn require_authority(&self, operation: &str) -> SyncResult<SessionId> {
        let session_id = match self.current_session_id() {
            Ok(session_id) => session_id,
            Err(err) => {
                warn!("Cannot {}: not in a session", operation);
                return Err(err);
            }
        };
        if !self.is_authority() {
            warn!("Cannot {}: only the session authority may", operation);
            return Err(SyncError::permission_denied(operation));
        }
        Ok(session_id)
    }

    fn require_other_member(&self, player_id: &PlayerId) -> SyncResult<()> {
        let is_other_member = self
            .session
            .as_ref()
            .map(|s| s.is_member(player_id) && !s.is_host(player_id))
            .unwrap_or(false);
        if is_other_member {
            Ok(())
        } else {
            warn!("{} is not another member of the session", player_id);
            Err(SyncError::InvalidArgument(format!("{} is not another member", player_id)))
        }
    }

    // ------------------------------------------------------------------
    // Internal transitions
    // ------------------------------------------------------------------

    fn emit(&mut self, event: SessionEvent) {
        debug!("Session event: {:?}", event);
        self.events.push_back(event);
    }

    fn issue_update(&mut self, session_id: &SessionId, op: SessionOp, update: SessionUpdate) {
        self.updates.push(Tagged {
            generation: self.generation,
            op,
            call: self.lobby.update_session(session_id, update),
        });
    }

    /// Start a list query unless one is in flight. An in-flight query with a
    /// different filter is re-issued when its result lands.
    fn start_refresh(&mut self) {
        if let Some((filter, _)) = &self.refresh {
            if *filter == self.list_filter {
                debug!("List refresh already in flight");
            } else {
                debug!("List filter changed to {:?} mid-refresh, re-querying on completion", self.list_filter);
            }
            return;
        }
        let query = SessionQuery {
            experience: self.list_filter.clone(),
            page_size: self.config.query_page_size,
        };
        self.refresh = Some((self.list_filter.clone(), self.lobby.query_sessions(query)));
        if self.state == ManagerState::Authenticated {
            self.state = ManagerState::Browsing;
        }
    }

    /// Drop every trace of the current session and report `SessionLeft`
    fn finish_leave(&mut self) {
        self.generation += 1;
        self.session = None;
        self.state = ManagerState::Browsing;
        self.list_filter = None;
        self.updates.clear();
        self.kicks.clear();
        self.poll_call = None;
        self.heartbeat_call = None;
        self.handoff = Handoff::Idle;
        self.transport.shutdown();
        self.emit(SessionEvent::SessionLeft);
    }

    fn run_timers(&mut self, dt: Duration) {
        if !self.state.in_lobby() {
            return;
        }
        let session_id = match self.current_session_id() {
            Ok(session_id) => session_id,
            Err(_) => return,
        };

        if self.is_authority() {
            if self.heartbeat_timer.advance(dt) && self.heartbeat_call.is_none() {
                debug!("Sending heartbeat for {}", session_id);
                self.heartbeat_call = Some(self.lobby.send_heartbeat(&session_id));
            }
        } else {
            self.heartbeat_timer.reset();
        }

        if matches!(self.handoff, Handoff::Idle)
            && self.poll_timer.advance(dt)
            && self.poll_call.is_none()
        {
            self.poll_call = Some((self.generation, self.lobby.get_session(&session_id)));
        }
    }
}
