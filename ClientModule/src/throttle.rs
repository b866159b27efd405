use xrs_shared::{Pose, SyncConfig};

/// Sequence number attached to each pose push
pub type SequenceNumber = u32;

/// Bounds pose push traffic: a pose is pushed only once it moved or turned
/// past a threshold since the last push
#[derive(Debug, Clone)]
pub struct PushThrottle {
    /// Minimum positional delta in metres
    position_threshold: f32,

    /// Minimum angular delta in radians
    angle_threshold: f32,

    /// Last pose pushed, if any since the last reset
    last_pushed: Option<Pose>,

    /// Sequence of the next push; never reused
    next_sequence: SequenceNumber,
}

impl PushThrottle {
    pub fn new(position_threshold: f32, angle_threshold_rad: f32) -> Self {
        Self {
            position_threshold,
            angle_threshold: angle_threshold_rad,
            last_pushed: None,
            next_sequence: 1,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.push_position_threshold, config.push_angle_threshold_rad())
    }

    /// Whether `pose` differs enough from the last push
    pub fn should_push(&self, pose: &Pose) -> bool {
        match &self.last_pushed {
            None => true,
            Some(last) => {
                last.position.distance(&pose.position) > self.position_threshold
                    || last.rotation.angle_to(&pose.rotation) > self.angle_threshold
            }
        }
    }

    /// Record a push of `pose` and return its sequence number, or `None`
    /// when the change is below both thresholds
    pub fn next(&mut self, pose: Pose) -> Option<SequenceNumber> {
        if !self.should_push(&pose) {
            return None;
        }
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.last_pushed = Some(pose);
        Some(sequence)
    }

    /// Forget the last pushed pose so the next one always goes out
    pub fn reset(&mut self) {
        self.last_pushed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrs_shared::{Quat, Vector3};

    #[test]
    fn small_moves_are_held_back() {
        let mut throttle = PushThrottle::new(0.01, 1f32.to_radians());
        let start = Pose::from_position(Vector3::new(0.0, 0.0, 0.0));

        assert_eq!(throttle.next(start), Some(1));
        assert_eq!(throttle.next(Pose::from_position(Vector3::new(0.005, 0.0, 0.0))), None);
        assert_eq!(throttle.next(Pose::from_position(Vector3::new(0.02, 0.0, 0.0))), Some(2));
    }

    #[test]
    fn rotation_alone_triggers_a_push() {
        let mut throttle = PushThrottle::new(0.01, 1f32.to_radians());
        throttle.next(Pose::identity());
        let turned = Pose::new(
            Vector3::zero(),
            Quat::from_axis_angle(Vector3::new(0.0, 1.0, 0.0), 5f32.to_radians()),
        );
        assert_eq!(throttle.next(turned), Some(2));
    }

    #[test]
    fn reset_keeps_sequences_increasing() {
        let mut throttle = PushThrottle::new(0.01, 0.1);
        throttle.next(Pose::identity());
        throttle.reset();
        assert_eq!(throttle.next(Pose::identity()), Some(2));
    }
}
