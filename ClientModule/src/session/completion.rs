//! Resolution of in-flight provider calls. Runs on every tick; each poll
//! consumes results that have arrived and leaves the rest in flight.

use log::{debug, info, warn};
use xrs_shared::{ProviderError, ProviderResult, Session, SessionStatus, SessionUpdate, SyncError};

use super::{Handoff, ManagerState, MembershipCall, SessionEvent, SessionManager, SessionOp, Tagged};
use crate::net::{poll_slot, RelayAllocation};

enum MembershipOutcome {
    Created(ProviderResult<Session>),
    Joined(ProviderResult<Session>),
    Left(ProviderResult<()>),
}

enum HandoffOutcome {
    Allocated(ProviderResult<RelayAllocation>),
    Published(ProviderResult<Session>),
    Joined(ProviderResult<RelayAllocation>),
}

/// Poll every call in `calls`, returning the finished ones
fn drain_finished<T>(calls: &mut Vec<Tagged<T>>) -> Vec<(u64, SessionOp, ProviderResult<T>)> {
    let mut finished = Vec::new();
    calls.retain_mut(|tagged| match tagged.call.poll() {
        Some(result) => {
            finished.push((tagged.generation, tagged.op, result));
            false
        }
        None => true,
    });
    finished
}

impl SessionManager {
    pub(super) fn poll_identity(&mut self) {
        match self.identity.poll() {
            Some(Ok(player_id)) => {
                if !self.state.is_authenticated() {
                    self.state = ManagerState::Authenticated;
                }
                self.emit(SessionEvent::Authenticated(player_id));
            }
            Some(Err(error)) => {
                self.state = ManagerState::Unauthenticated;
                self.emit(SessionEvent::OperationFailed {
                    op: SessionOp::Authenticate,
                    error,
                });
            }
            None => {}
        }
    }

    pub(super) fn poll_membership(&mut self) {
        let outcome = match self.membership.as_mut() {
            Some(MembershipCall::Create(call)) => call.poll().map(MembershipOutcome::Created),
            Some(MembershipCall::Join(call)) => call.poll().map(MembershipOutcome::Joined),
            Some(MembershipCall::Leave(call)) => call.poll().map(MembershipOutcome::Left),
            None => None,
        };
        let outcome = match outcome {
            Some(outcome) => outcome,
            None => return,
        };
        self.membership = None;

        match outcome {
            MembershipOutcome::Created(Ok(session)) => {
                info!("Created session {} ({})", session.session_id, session.lobby_code);
                self.enter_session(session, false);
            }
            MembershipOutcome::Joined(Ok(session)) => {
                info!("Joined session {}", session.session_id);
                self.enter_session(session, true);
            }
            MembershipOutcome::Created(Err(err)) => self.membership_failed(SessionOp::Create, err),
            MembershipOutcome::Joined(Err(err)) => self.membership_failed(SessionOp::Join, err),
            MembershipOutcome::Left(result) => {
                match result {
                    Ok(()) => info!("Left session"),
                    Err(ProviderError::NotFound) => info!("Session already gone, leave treated as done"),
                    Err(err) => warn!("Leave failed remotely, clearing local session anyway: {}", err),
                }
                self.finish_leave();
            }
        }
    }

    fn membership_failed(&mut self, op: SessionOp, err: ProviderError) {
        let error = SyncError::from(err);
        warn!("{:?} failed: {}", op, error);
        self.state = ManagerState::Browsing;
        let not_found = error == SyncError::SessionNotFound;
        self.emit(SessionEvent::OperationFailed { op, error });
        if not_found {
            // The list the user picked from is stale
            self.start_refresh();
        }
    }

    /// Superseded joins that still succeed are undone; cleanup calls are drained
    pub(super) fn poll_background(&mut self) {
        let mut undo = Vec::new();
        self.orphans.retain_mut(|call| match call.poll() {
            Some(Ok(session)) => {
                undo.push(session);
                false
            }
            Some(Err(_)) => false,
            None => true,
        });

        if let Some(me) = self.identity.player_id().cloned() {
            for session in undo {
                info!("Undoing superseded join of {}", session.session_id);
                let call = self.lobby.remove_player(&session.session_id, &me);
                self.background.push(call);
            }
        }

        self.background.retain_mut(|call| match call.poll() {
            Some(Err(err)) => {
                debug!("Cleanup call failed: {}", err);
                false
            }
            Some(Ok(())) => false,
            None => true,
        });
    }

    pub(super) fn poll_refresh(&mut self) {
        let (filter, result) = match self.refresh.as_mut() {
            Some((filter, call)) => match call.poll() {
                Some(result) => (filter.clone(), result),
                None => return,
            },
            None => return,
        };
        self.refresh = None;
        if filter != self.list_filter {
            debug!("Dropping list for stale filter {:?}", filter);
            self.start_refresh();
            return;
        }
        let sessions = match result {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!("Session list refresh failed: {}", err);
                Vec::new()
            }
        };
        debug!("Session list refreshed: {} sessions", sessions.len());
        self.emit(SessionEvent::ListRefreshed(sessions));
    }

    pub(super) fn poll_kicks(&mut self) {
        for (generation, op, result) in drain_finished(&mut self.kicks) {
            if generation != self.generation {
                continue;
            }
            match result {
                Ok(()) => {
                    // Resynchronize status from the record the kick produced
                    if let Ok(session_id) = self.current_session_id() {
                        let call = self.lobby.get_session(&session_id);
                        self.updates.push(Tagged { generation, op, call });
                    }
                }
                Err(err) => self.remote_failed(op, err),
            }
        }
    }

    pub(super) fn poll_updates(&mut self) {
        for (generation, op, result) in drain_finished(&mut self.updates) {
            if generation != self.generation {
                debug!("Discarding stale {:?} result", op);
                continue;
            }
            match result {
                Ok(session) => self.apply_remote(session),
                Err(err) => self.remote_failed(op, err),
            }
        }
    }

    fn remote_failed(&mut self, op: SessionOp, err: ProviderError) {
        if err == ProviderError::NotFound {
            info!("Session disappeared during {:?}", op);
            if self.state.in_lobby() {
                self.finish_leave();
            }
            return;
        }
        let error = SyncError::from(err);
        warn!("{:?} failed: {}", op, error);
        self.emit(SessionEvent::OperationFailed { op, error });
    }

    pub(super) fn poll_handoff(&mut self) {
        let outcome = match &mut self.handoff {
            Handoff::Allocating(call) => call.poll().map(HandoffOutcome::Allocated),
            Handoff::Publishing(call) => call.poll().map(HandoffOutcome::Published),
            Handoff::Joining(call) => call.poll().map(HandoffOutcome::Joined),
            Handoff::Idle | Handoff::Done => None,
        };
        let outcome = match outcome {
            Some(outcome) => outcome,
            None => return,
        };
        if !self.state.in_lobby() {
            debug!("Dropping handoff result, no longer in a session");
            self.handoff = Handoff::Idle;
            self.transport.shutdown();
            return;
        }

        match outcome {
            HandoffOutcome::Allocated(result) => {
                let join_code = match self.transport.complete_host(result) {
                    Some(join_code) => join_code,
                    None => {
                        self.handoff_failed(SyncError::ProviderTransient("relay allocation failed".into()));
                        return;
                    }
                };
                let session_id = match self.current_session_id() {
                    Ok(session_id) => session_id,
                    Err(err) => {
                        self.handoff_failed(err);
                        return;
                    }
                };
                let update = SessionUpdate {
                    status: Some(SessionStatus::InProgress),
                    relay_join_code: Some(join_code),
                    ..SessionUpdate::default()
                };
                self.handoff = Handoff::Publishing(self.lobby.update_session(&session_id, update));
            }
            HandoffOutcome::Published(Ok(session)) => {
                self.handoff = Handoff::Done;
                self.apply_remote(session);
                if self.state.in_lobby() {
                    info!("Realtime handoff ready (authority)");
                    self.emit(SessionEvent::HandoffReady);
                }
            }
            HandoffOutcome::Published(Err(err)) => self.handoff_failed(SyncError::from(err)),
            HandoffOutcome::Joined(result) => {
                if self.transport.complete_client(result) {
                    info!("Realtime handoff ready (member)");
                    self.handoff = Handoff::Done;
                    self.emit(SessionEvent::HandoffReady);
                } else {
                    // Polling resumes and retries once it sees the code again
                    self.handoff_failed(SyncError::ProviderTransient("relay join failed".into()));
                }
            }
        }
    }

    fn handoff_failed(&mut self, error: SyncError) {
        warn!("Realtime handoff failed: {}", error);
        self.transport.shutdown();
        self.handoff = Handoff::Idle;
        self.emit(SessionEvent::OperationFailed {
            op: SessionOp::Handoff,
            error,
        });
    }

    pub(super) fn poll_session_fetch(&mut self) {
        let (generation, result) = match self.poll_call.as_mut() {
            Some((generation, call)) => match call.poll() {
                Some(result) => (*generation, result),
                None => return,
            },
            None => return,
        };
        self.poll_call = None;
        if generation != self.generation {
            return;
        }
        match result {
            Ok(session) => self.apply_remote(session),
            Err(ProviderError::NotFound) => {
                info!("Session no longer exists");
                self.finish_leave();
            }
            Err(err) => warn!("Session poll failed, retrying next interval: {}", err),
        }
    }

    pub(super) fn poll_heartbeat(&mut self) {
        match poll_slot(&mut self.heartbeat_call) {
            Some(Err(err)) => warn!("Heartbeat failed, retrying next interval: {}", err),
            Some(Ok(())) => debug!("Heartbeat acknowledged"),
            None => {}
        }
    }

    /// Install a freshly created or joined session
    fn enter_session(&mut self, session: Session, announce_members: bool) {
        self.handoff = Handoff::Idle;
        self.heartbeat_timer.reset();
        self.poll_timer.reset();

        let mut local = session;
        let stored_status = local.status;
        local.refresh_status();
        self.state = ManagerState::InLobby(local.status);
        self.session = Some(local.clone());

        let members = local.members.clone();
        self.emit(SessionEvent::SessionJoined(local.clone()));
        if announce_members {
            self.emit(SessionEvent::MembersChanged(members));
        }
        self.write_back_status(&local, stored_status);
    }

    /// Merge a fetched session record into the local snapshot, emitting an
    /// event for each actual change
    pub(super) fn apply_remote(&mut self, mut remote: Session) {
        if !self.state.in_lobby() {
            debug!("Ignoring session record, not in a session");
            return;
        }
        let me = match self.identity.player_id() {
            Some(me) => me.clone(),
            None => return,
        };
        if !remote.is_member(&me) {
            info!("No longer a member of {}, leaving", remote.session_id);
            self.finish_leave();
            return;
        }

        let stored_status = remote.status;
        remote.refresh_status();
        let previous = self.session.replace(remote.clone());
        self.state = ManagerState::InLobby(remote.status);

        if let Some(previous) = previous {
            if previous.member_ids() != remote.member_ids() {
                self.emit(SessionEvent::MembersChanged(remote.members.clone()));
            }
            if previous.selected_experience != remote.selected_experience {
                self.emit(SessionEvent::ExperienceChanged(remote.selected_experience.clone()));
            }
            if previous.host_id != remote.host_id {
                info!("Authority moved from {} to {}", previous.host_id, remote.host_id);
                self.heartbeat_timer.reset();
                self.emit(SessionEvent::AuthorityChanged(remote.host_id.clone()));
            }
        }

        self.write_back_status(&remote, stored_status);

        if !remote.is_host(&me) && remote.has_join_code() && matches!(self.handoff, Handoff::Idle) {
            info!("Join code published, joining realtime transport");
            self.handoff = Handoff::Joining(self.transport.join_realtime_allocation(&remote.relay_join_code));
        }
    }

    /// Authority: store a locally derived status the record does not carry yet
    fn write_back_status(&mut self, local: &Session, stored_status: SessionStatus) {
        if !self.is_authority() || local.status == stored_status {
            return;
        }
        if self.updates.iter().any(|u| u.op == SessionOp::StatusWriteBack) {
            return;
        }
        debug!("Writing back status {:?} (was {:?})", local.status, stored_status);
        let update = SessionUpdate {
            status: Some(local.status),
            ..SessionUpdate::default()
        };
        let session_id = local.session_id.clone();
        self.issue_update(&session_id, SessionOp::StatusWriteBack, update);
    }
}
