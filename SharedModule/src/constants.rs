//! # Shared Constants
//!
//! Default values used across client and authority modules. Everything here
//! can be overridden through [`crate::config::SyncConfig`].

/// Session lifecycle constants
pub mod session {
    /// Heartbeat interval while authority and in a session (in seconds)
    pub const HEARTBEAT_INTERVAL: f32 = 15.0;

    /// Poll interval while in a session and not yet handed off (in seconds)
    pub const POLL_INTERVAL: f32 = 1.5;

    /// Maximum sessions returned by one list refresh
    pub const QUERY_PAGE_SIZE: usize = 25;

    /// Upper bound on session capacity accepted by `create_session`
    pub const MAX_CAPACITY: usize = 16;
}

/// Relay / transport constants
pub mod transport {
    /// Length of relay join codes issued by the loopback relay
    pub const JOIN_CODE_LENGTH: usize = 6;

    /// Alphabet used for relay join codes and lobby codes
    pub const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
}

/// Spatial sync constants
pub mod spatial {
    /// Undock once the held sub-object is farther than `anchor_scale * DOCK_MULTIPLIER`
    pub const DOCK_MULTIPLIER: f32 = 0.5;

    /// Minimum positional change before a held pose is pushed again (in metres)
    pub const PUSH_POSITION_THRESHOLD: f32 = 0.005;

    /// Minimum angular change before a held pose is pushed again (in degrees)
    pub const PUSH_ANGLE_THRESHOLD_DEG: f32 = 1.0;

    /// Anchor scale used when a detection reports no marker size
    pub const DEFAULT_ANCHOR_SCALE: f32 = 1.0;

    /// First network instance id handed out by the registry
    pub const FIRST_INSTANCE_ID: u64 = 1000;
}
