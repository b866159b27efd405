//! Client-side state of a grabbable sub-object.
//!
//! The dock state is authority-written and only ever applied from the
//! network. The local hand pose is authored here only while this peer owns
//! the object.

use xrs_shared::{DockState, PlayerId, Pose, Replicated};

use crate::throttle::PushThrottle;

#[derive(Debug)]
pub struct GrabbableView {
    /// Replicated dock state including the current owner
    dock: Replicated<DockState>,

    /// The local user is holding the object
    pub(crate) held: bool,

    /// Latest world pose of the local hand while held
    pub(crate) held_pose: Option<Pose>,

    /// Bounds pose push traffic while owned and undocked
    pub(crate) throttle: PushThrottle,

    /// An undock request was sent for the current docked period
    pub(crate) undock_requested: bool,

    /// An ownership request is awaiting its answer
    pub(crate) ownership_requested: bool,
}

impl GrabbableView {
    pub fn new(state: DockState, throttle: PushThrottle) -> Self {
        Self {
            dock: Replicated::authority(state),
            held: false,
            held_pose: None,
            throttle,
            undock_requested: false,
            ownership_requested: false,
        }
    }

    pub fn dock(&self) -> &DockState {
        self.dock.get()
    }

    pub fn is_docked(&self) -> bool {
        self.dock.get().is_docked
    }

    pub fn owner(&self) -> Option<&PlayerId> {
        self.dock.get().current_owner.as_ref()
    }

    pub fn is_owned_by(&self, player_id: &PlayerId) -> bool {
        self.dock.get().is_owned_by(player_id)
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Apply a replicated dock state. Returns whether it changed.
    pub fn apply_dock(&mut self, state: DockState) -> bool {
        let was_docked = self.is_docked();
        let changed = self.dock.apply_remote(state);
        if !was_docked && self.is_docked() {
            self.undock_requested = false;
            self.throttle.reset();
        }
        changed
    }

    /// Displayed world pose for `viewer`, given the object's anchor
    pub fn world_pose(&self, anchor: &Pose, viewer: &PlayerId) -> Pose {
        match self.held_pose {
            Some(held) if self.held && self.is_owned_by(viewer) => held,
            _ => anchor.compose(&self.dock.get().relative_pose()),
        }
    }

    /// Whether the held pose left the dock radius around `anchor`
    pub fn beyond_dock_threshold(&self, anchor: &Pose, threshold: f32) -> bool {
        match self.held_pose {
            Some(held) => anchor.position.distance(&held.position) > threshold,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrs_shared::Vector3;

    fn view() -> GrabbableView {
        let offset = Pose::from_position(Vector3::new(0.0, 0.2, 0.0));
        GrabbableView::new(
            DockState::docked(offset, Some(PlayerId::from("host"))),
            PushThrottle::new(0.005, 0.01),
        )
    }

    #[test]
    fn non_owner_sees_replicated_pose() {
        let mut grab = view();
        grab.held = true;
        grab.held_pose = Some(Pose::from_position(Vector3::new(9.0, 9.0, 9.0)));

        let anchor = Pose::from_position(Vector3::new(1.0, 0.0, 0.0));
        let shown = grab.world_pose(&anchor, &PlayerId::from("guest"));
        assert_eq!(shown, Pose::from_position(Vector3::new(1.0, 0.2, 0.0)));

        let shown = grab.world_pose(&anchor, &PlayerId::from("host"));
        assert_eq!(shown.position, Vector3::new(9.0, 9.0, 9.0));
    }

    #[test]
    fn undock_flag_clears_only_on_redock() {
        let mut grab = view();
        grab.undock_requested = true;

        // Ownership change while still docked keeps the flag
        let mut owned = grab.dock().clone();
        owned.current_owner = Some(PlayerId::from("guest"));
        grab.apply_dock(owned.clone());
        assert!(grab.undock_requested);

        let mut undocked = owned.clone();
        undocked.is_docked = false;
        grab.apply_dock(undocked);
        assert!(grab.undock_requested);

        grab.apply_dock(owned);
        assert!(!grab.undock_requested);
    }

    #[test]
    fn threshold_uses_held_position() {
        let mut grab = view();
        let anchor = Pose::identity();
        assert!(!grab.beyond_dock_threshold(&anchor, 0.5));
        grab.held_pose = Some(Pose::from_position(Vector3::new(0.4, 0.0, 0.0)));
        assert!(!grab.beyond_dock_threshold(&anchor, 0.5));
        grab.held_pose = Some(Pose::from_position(Vector3::new(0.6, 0.0, 0.0)));
        assert!(grab.beyond_dock_threshold(&anchor, 0.5));
    }
}
