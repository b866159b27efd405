//! # Client-side Object System
//!
//! Spatial reconciliation of shared objects on one peer. AR devices anchor
//! objects on their own marker observations and never write the shared
//! pose; VR and simulator devices forward placements to the authority and
//! display the replicated shared pose. Grabbable sub-objects are authored
//! locally only while this peer owns them.

// Submodules
pub mod shared_object; // Per-object view
pub mod grabbable;     // Grabbable sub-object state

use log::{debug, info, warn};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use xrs_shared::rpc::{GrabPushArgs, PoseArgs, RejectionArgs};
use xrs_shared::{
    DeviceKind, DockState, ObjectTypeId, PlayerId, Pose, ReplicatedChange, RequestOp,
    ServerMessage, SharedObjectRecord, SyncConfig, SyncError, SyncResult, Targeted, TargetedOp,
};

pub use grabbable::GrabbableView;
pub use shared_object::SharedObjectView;

use crate::rpc::AuthorityLink;
use crate::throttle::PushThrottle;

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialEvent {
    /// The record of an object arrived
    Spawned(ObjectTypeId),

    /// The object was detected or placed locally for the first time and is now visible
    Detected(ObjectTypeId),

    /// The replicated shared pose changed
    SharedPoseChanged { type_id: ObjectTypeId, pose: Pose },

    /// The replicated dock state (or owner) changed
    DockChanged { type_id: ObjectTypeId, state: DockState },

    /// The object was torn down
    Released(ObjectTypeId),

    /// The authority refused a request from this peer
    RequestRejected {
        type_id: ObjectTypeId,
        call_id: Option<u64>,
        error: SyncError,
    },

    /// Another peer holds the grabbable sub-object
    OwnershipDenied { type_id: ObjectTypeId, error: SyncError },
}

/// Shared objects as seen by one peer
#[derive(Debug)]
pub struct SpatialClient {
    device: DeviceKind,
    config: SyncConfig,
    link: AuthorityLink,
    objects: BTreeMap<ObjectTypeId, SharedObjectView>,
    events: VecDeque<SpatialEvent>,
}

impl SpatialClient {
    pub fn new(link: AuthorityLink, device: DeviceKind, config: SyncConfig) -> Self {
        Self {
            device,
            config,
            link,
            objects: BTreeMap::new(),
            events: VecDeque::new(),
        }
    }

    pub fn player_id(&self) -> &PlayerId {
        self.link.player_id()
    }

    pub fn device(&self) -> DeviceKind {
        self.device
    }

    pub fn view(&self, type_id: &ObjectTypeId) -> Option<&SharedObjectView> {
        self.objects.get(type_id)
    }

    pub fn views(&self) -> impl Iterator<Item = &SharedObjectView> {
        self.objects.values()
    }

    /// Register a change listener on an object's shared pose
    pub fn on_shared_pose_changed(
        &mut self,
        type_id: &ObjectTypeId,
        callback: impl FnMut(&Pose, &Pose) + Send + 'static,
    ) {
        self.view_entry(type_id).on_shared_pose_changed(callback);
    }

    /// Displayed world pose of an object on this device
    pub fn world_pose(&self, type_id: &ObjectTypeId) -> Option<Pose> {
        self.objects.get(type_id)?.anchor_pose(self.device)
    }

    /// Displayed world pose of an object's grabbable sub-object
    pub fn grab_world_pose(&self, type_id: &ObjectTypeId) -> Option<Pose> {
        let view = self.objects.get(type_id)?;
        let anchor = view.anchor_pose(self.device)?;
        Some(view.grab.as_ref()?.world_pose(&anchor, self.link.player_id()))
    }

    /// Drain pending notifications
    pub fn drain_events(&mut self) -> Vec<SpatialEvent> {
        self.events.drain(..).collect()
    }

    /// A marker was recognized (AR) or the user placed the object (VR)
    pub fn report_local_detection(
        &mut self,
        type_id: &ObjectTypeId,
        pose: Pose,
        approx_size: f32,
    ) -> SyncResult<()> {
        if !approx_size.is_finite() {
            return Err(SyncError::InvalidArgument(format!("approx size {} for {}", approx_size, type_id)));
        }

        if self.device.uses_markers() {
            // Marker poses stay on this device; the shared pose is not touched
            let view = self.view_entry(type_id);
            view.set_local_anchor(pose, approx_size);
            if !view.is_resolved() && !view.spawn_requested {
                view.spawn_requested = true;
                if let Err(err) = self.link.call(RequestOp::GetOrSpawn, type_id, &()) {
                    self.view_entry(type_id).spawn_requested = false;
                    return Err(err);
                }
            }
            debug!("{} anchored locally at {:?}", type_id, pose.position);
        } else {
            self.link.call(RequestOp::WriteSharedPose, type_id, &PoseArgs { pose })?;
            self.view_entry(type_id).set_anchor_scale(approx_size);
            debug!("{} placement sent to authority", type_id);
        }

        if self.view_entry(type_id).mark_detected() {
            self.events.push_back(SpatialEvent::Detected(type_id.clone()));
        }
        Ok(())
    }

    /// Ask the authority for the live instance of `type_id`
    pub fn request_spawn(&mut self, type_id: &ObjectTypeId) -> SyncResult<u64> {
        let call_id = self.link.call(RequestOp::GetOrSpawn, type_id, &())?;
        self.view_entry(type_id).spawn_requested = true;
        Ok(call_id)
    }

    /// The local user starts holding the grabbable sub-object
    pub fn begin_grab(&mut self, type_id: &ObjectTypeId) -> SyncResult<()> {
        let me = self.link.player_id().clone();
        let grab = grabbable_mut(&mut self.objects, type_id)?;
        if grab.held {
            return Ok(());
        }
        grab.held = true;
        grab.held_pose = None;
        grab.throttle.reset();

        if !grab.is_owned_by(&me) && !grab.ownership_requested {
            grab.ownership_requested = true;
            if let Err(err) = self.link.call(RequestOp::RequestOwnership, type_id, &()) {
                if let Ok(grab) = grabbable_mut(&mut self.objects, type_id) {
                    grab.ownership_requested = false;
                }
                return Err(err);
            }
        }
        info!("Grab of {} started", type_id);
        Ok(())
    }

    /// The local hand moved while holding
    pub fn update_held_pose(&mut self, type_id: &ObjectTypeId, world_pose: Pose) -> SyncResult<()> {
        let grab = grabbable_mut(&mut self.objects, type_id)?;
        if !grab.held {
            return Err(SyncError::InvalidArgument(format!("{} is not held", type_id)));
        }
        grab.held_pose = Some(world_pose);
        Ok(())
    }

    /// The local user let go
    pub fn end_grab(&mut self, type_id: &ObjectTypeId) -> SyncResult<()> {
        let me = self.link.player_id().clone();
        let view = self
            .objects
            .get_mut(type_id)
            .ok_or_else(|| SyncError::InvalidArgument(format!("{} is not known", type_id)))?;
        let anchor = view.anchor_pose(self.device);
        let grab = view
            .grab
            .as_mut()
            .ok_or_else(|| SyncError::InvalidArgument(format!("{} is not grabbable", type_id)))?;
        if !grab.held {
            return Ok(());
        }

        // Last pose first, so the release does not lose the final position
        if let (Some(anchor), true) = (anchor, grab.is_owned_by(&me)) {
            push_held_pose(&mut self.link, type_id, grab, &anchor);
        }

        grab.held = false;
        grab.held_pose = None;
        grab.throttle.reset();

        if grab.is_owned_by(&me) {
            self.link.call(RequestOp::ReleaseOwnership, type_id, &())?;
        }
        info!("Grab of {} ended", type_id);
        Ok(())
    }

    /// Reset the sub-object to its original offset and dock it
    pub fn redock(&mut self, type_id: &ObjectTypeId) -> SyncResult<u64> {
        grabbable_mut(&mut self.objects, type_id)?;
        self.link.call(RequestOp::RequestRedock, type_id, &())
    }

    /// Apply authority messages, then run per-object reconciliation
    pub fn tick(&mut self, _dt: Duration) {
        while let Some(message) = self.link.try_next() {
            match message {
                ServerMessage::Replicated(change) => self.apply_change(change),
                ServerMessage::Targeted(targeted) => self.apply_targeted(targeted),
            }
        }
        self.step_grabbables();
    }

    fn view_entry(&mut self, type_id: &ObjectTypeId) -> &mut SharedObjectView {
        self.objects
            .entry(type_id.clone())
            .or_insert_with(|| SharedObjectView::unresolved(type_id.clone()))
    }

    fn resolve(&mut self, record: SharedObjectRecord) {
        let type_id = record.type_id.clone();
        if self.view_entry(&type_id).resolve(record) {
            debug!("{} resolved", type_id);
            self.events.push_back(SpatialEvent::Spawned(type_id));
        }
    }

    fn apply_change(&mut self, change: ReplicatedChange) {
        match change {
            ReplicatedChange::Spawned(record) => self.resolve(record),
            ReplicatedChange::SharedPose { type_id, pose } => {
                if self.view_entry(&type_id).apply_shared_pose(pose) {
                    self.events.push_back(SpatialEvent::SharedPoseChanged { type_id, pose });
                }
            }
            ReplicatedChange::Dock { type_id, state } => self.apply_dock(type_id, state),
            ReplicatedChange::Released { type_id } => {
                if self.objects.remove(&type_id).is_some() {
                    info!("{} released", type_id);
                    self.events.push_back(SpatialEvent::Released(type_id));
                }
            }
        }
    }

    fn apply_dock(&mut self, type_id: ObjectTypeId, state: DockState) {
        let me = self.link.player_id().clone();
        let throttle = PushThrottle::from_config(&self.config);
        let view = self.view_entry(&type_id);

        let changed = match view.grab.as_mut() {
            Some(grab) => grab.apply_dock(state.clone()),
            None => {
                view.grab = Some(GrabbableView::new(state.clone(), throttle));
                true
            }
        };
        let grab = match view.grab.as_mut() {
            Some(grab) => grab,
            None => return,
        };

        let mut release = false;
        if grab.ownership_requested && grab.is_owned_by(&me) {
            grab.ownership_requested = false;
            // Let go before the grant arrived
            release = !grab.held;
        }
        if !grab.is_owned_by(&me) {
            grab.throttle.reset();
        }

        if release {
            debug!("Ownership of {} arrived after release, handing back", type_id);
            if let Err(err) = self.link.call(RequestOp::ReleaseOwnership, &type_id, &()) {
                warn!("Could not hand back {}: {}", type_id, err);
            }
        }
        if changed {
            self.events.push_back(SpatialEvent::DockChanged { type_id, state });
        }
    }

    fn apply_targeted(&mut self, targeted: Targeted) {
        if &targeted.target != self.link.player_id() {
            warn!("Ignoring {:?} addressed to {}", targeted.op, targeted.target);
            return;
        }
        let type_id = targeted.type_id.clone();

        match targeted.op {
            TargetedOp::SpawnResult => match targeted.args::<SharedObjectRecord>() {
                Ok(record) => self.resolve(record),
                Err(err) => warn!("Undecodable spawn result for {}: {}", type_id, err),
            },
            TargetedOp::RequestRejected | TargetedOp::OwnershipDenied => {
                let error = match targeted.args::<RejectionArgs>() {
                    Ok(args) => args.error,
                    Err(err) => err,
                };
                if let Some(view) = self.objects.get_mut(&type_id) {
                    view.spawn_requested = false;
                    if let Some(grab) = view.grab.as_mut() {
                        grab.ownership_requested = false;
                    }
                }
                warn!("{:?} for {}: {}", targeted.op, type_id, error);
                let event = if targeted.op == TargetedOp::OwnershipDenied {
                    SpatialEvent::OwnershipDenied { type_id, error }
                } else {
                    SpatialEvent::RequestRejected {
                        type_id,
                        call_id: targeted.call_id,
                        error,
                    }
                };
                self.events.push_back(event);
            }
        }
    }

    /// Auto-undock held sub-objects that left the dock radius and push the
    /// owner's pose while undocked
    fn step_grabbables(&mut self) {
        let me = self.link.player_id().clone();
        for (type_id, view) in self.objects.iter_mut() {
            let anchor = match view.anchor_pose(self.device) {
                Some(anchor) => anchor,
                None => continue,
            };
            let threshold = view.anchor_scale() * self.config.dock_multiplier;
            let grab = match view.grab.as_mut() {
                Some(grab) if grab.held => grab,
                _ => continue,
            };

            if grab.is_docked() {
                if !grab.undock_requested && grab.beyond_dock_threshold(&anchor, threshold) {
                    info!("{} left the dock radius, requesting undock", type_id);
                    match self.link.call(RequestOp::RequestUndock, type_id, &()) {
                        Ok(_) => grab.undock_requested = true,
                        Err(err) => warn!("Undock request for {} failed: {}", type_id, err),
                    }
                }
            } else if grab.is_owned_by(&me) {
                push_held_pose(&mut self.link, type_id, grab, &anchor);
            }
        }
    }
}

fn grabbable_mut<'a>(
    objects: &'a mut BTreeMap<ObjectTypeId, SharedObjectView>,
    type_id: &ObjectTypeId,
) -> SyncResult<&'a mut GrabbableView> {
    let view = objects
        .get_mut(type_id)
        .ok_or_else(|| SyncError::InvalidArgument(format!("{} is not known", type_id)))?;
    if !view.visibility().is_interactive() {
        return Err(SyncError::InvalidArgument(format!("{} is not interactive yet", type_id)));
    }
    view.grab
        .as_mut()
        .ok_or_else(|| SyncError::InvalidArgument(format!("{} is not grabbable", type_id)))
}

/// Send the held pose relative to `anchor` if it moved past the push thresholds
fn push_held_pose(link: &mut AuthorityLink, type_id: &ObjectTypeId, grab: &mut GrabbableView, anchor: &Pose) {
    if grab.is_docked() {
        return;
    }
    let held = match grab.held_pose {
        Some(held) => held,
        None => return,
    };
    let relative = anchor.relative_to_self(&held);
    if let Some(sequence) = grab.throttle.next(relative) {
        let args = GrabPushArgs { relative, sequence };
        if let Err(err) = link.call(RequestOp::PushGrabPose, type_id, &args) {
            warn!("Pose push for {} failed: {}", type_id, err);
        }
    }
}
