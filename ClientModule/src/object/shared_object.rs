//! Client-side view of one shared object: the replicated record, the
//! binding shared pose and this device's private anchor.

use log::debug;
use xrs_shared::constants::spatial::DEFAULT_ANCHOR_SCALE;
use xrs_shared::{DeviceKind, ObjectTypeId, Pose, Replicated, SharedObjectRecord, Visibility};

use super::grabbable::GrabbableView;

/// Local state of a shared object on one peer
#[derive(Debug)]
pub struct SharedObjectView {
    /// Class of the object
    pub type_id: ObjectTypeId,

    /// Replicated record; `None` until the spawn announcement arrives
    record: Option<SharedObjectRecord>,

    /// Authority-written world pose, applied from the network only
    shared_pose: Replicated<Pose>,

    /// Marker pose observed by this device (AR only)
    local_anchor: Option<Pose>,

    /// Approximate size reported with the last detection
    anchor_scale: f32,

    /// Hidden until this peer detects or places the object
    visibility: Visibility,

    /// A `GetOrSpawn` is in flight
    pub(crate) spawn_requested: bool,

    /// Present when the object carries a grabbable sub-object
    pub(crate) grab: Option<GrabbableView>,
}

impl SharedObjectView {
    /// A view with nothing known yet
    pub fn unresolved(type_id: ObjectTypeId) -> Self {
        Self {
            type_id,
            record: None,
            shared_pose: Replicated::authority(Pose::identity()),
            local_anchor: None,
            anchor_scale: DEFAULT_ANCHOR_SCALE,
            visibility: Visibility::Hidden,
            spawn_requested: false,
            grab: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.record.is_some()
    }

    pub fn record(&self) -> Option<&SharedObjectRecord> {
        self.record.as_ref()
    }

    /// Fill in the record. Returns `true` the first time.
    ///
    /// A pose streamed before the record arrived is newer than the one the
    /// record carries, so it is kept.
    pub fn resolve(&mut self, mut record: SharedObjectRecord) -> bool {
        let first = self.record.is_none();
        if first && self.shared_pose.version() == 0 {
            self.shared_pose.apply_remote(record.shared_world_pose);
        }
        record.shared_world_pose = *self.shared_pose.get();
        record.detected_locally = self.is_detected();
        self.record = Some(record);
        self.spawn_requested = false;
        first
    }

    pub fn shared_pose(&self) -> &Pose {
        self.shared_pose.get()
    }

    /// Apply a replicated shared pose. Returns whether it changed.
    pub fn apply_shared_pose(&mut self, pose: Pose) -> bool {
        let changed = self.shared_pose.apply_remote(pose);
        if let Some(record) = self.record.as_mut() {
            record.shared_world_pose = pose;
        }
        changed
    }

    /// Listen for shared pose changes
    pub fn on_shared_pose_changed(&mut self, callback: impl FnMut(&Pose, &Pose) + Send + 'static) {
        self.shared_pose.subscribe(callback);
    }

    pub fn local_anchor(&self) -> Option<&Pose> {
        self.local_anchor.as_ref()
    }

    /// Move the private anchor to a marker observation
    pub fn set_local_anchor(&mut self, pose: Pose, approx_size: f32) {
        self.local_anchor = Some(pose);
        self.set_anchor_scale(approx_size);
    }

    pub fn anchor_scale(&self) -> f32 {
        self.anchor_scale
    }

    /// A non-positive size means the detector did not report one
    pub fn set_anchor_scale(&mut self, approx_size: f32) {
        self.anchor_scale = if approx_size > 0.0 { approx_size } else { DEFAULT_ANCHOR_SCALE };
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_detected(&self) -> bool {
        self.visibility.is_visible()
    }

    /// Record a local detection. Returns `true` the first time.
    pub fn mark_detected(&mut self) -> bool {
        if self.is_detected() {
            return false;
        }
        debug!("{} detected locally, now visible", self.type_id);
        self.visibility = Visibility::Visible;
        if let Some(record) = self.record.as_mut() {
            record.detected_locally = true;
        }
        true
    }

    /// Where `device` displays the object: the marker anchor on AR, the
    /// shared pose plus the catalog offset otherwise
    pub fn anchor_pose(&self, device: DeviceKind) -> Option<Pose> {
        if device.uses_markers() {
            return self.local_anchor;
        }
        self.record
            .as_ref()
            .map(|record| self.shared_pose.get().compose(&record.anchor_local_offset))
    }

    pub fn grab(&self) -> Option<&GrabbableView> {
        self.grab.as_ref()
    }
}
