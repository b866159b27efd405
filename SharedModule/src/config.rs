//! # Configuration
//!
//! Every tunable of the layer in one serde-loadable struct. Missing fields
//! fall back to the values in [`crate::constants`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants;
use crate::error::SyncResult;
use crate::types::Pose;

/// How the authority resolves competing ownership requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnershipPolicy {
    /// Every request is granted; the latest one holds ownership
    LastRequesterWins,

    /// A request is denied while someone other than the default owner holds it
    FirstRequestWins,
}

/// Layer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Heartbeat interval in seconds
    pub heartbeat_interval_secs: f32,

    /// Session poll interval in seconds
    pub poll_interval_secs: f32,

    /// Maximum sessions per list refresh
    pub query_page_size: usize,

    /// Maximum accepted session capacity
    pub max_capacity: usize,

    /// Dock threshold multiplier applied to the anchor scale
    pub dock_multiplier: f32,

    /// Minimum positional delta between pose pushes, in metres
    pub push_position_threshold: f32,

    /// Minimum angular delta between pose pushes, in degrees
    pub push_angle_threshold_deg: f32,

    /// Ownership arbitration on the authority
    pub ownership_policy: OwnershipPolicy,

    /// Pose at which newly spawned objects are staged
    pub staging_pose: Pose,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: constants::session::HEARTBEAT_INTERVAL,
            poll_interval_secs: constants::session::POLL_INTERVAL,
            query_page_size: constants::session::QUERY_PAGE_SIZE,
            max_capacity: constants::session::MAX_CAPACITY,
            dock_multiplier: constants::spatial::DOCK_MULTIPLIER,
            push_position_threshold: constants::spatial::PUSH_POSITION_THRESHOLD,
            push_angle_threshold_deg: constants::spatial::PUSH_ANGLE_THRESHOLD_DEG,
            ownership_policy: OwnershipPolicy::LastRequesterWins,
            staging_pose: Pose::identity(),
        }
    }
}

impl SyncConfig {
    /// Load from a JSON document
    pub fn from_json(json: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs_f32(self.heartbeat_interval_secs.max(0.0))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f32(self.poll_interval_secs.max(0.0))
    }

    pub fn push_angle_threshold_rad(&self) -> f32 {
        self.push_angle_threshold_deg.to_radians()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SyncConfig::from_json(
            r#"{ "poll_interval_secs": 0.5, "ownership_policy": "FirstRequestWins" }"#,
        )
        .unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.ownership_policy, OwnershipPolicy::FirstRequestWins);
        assert_eq!(config.heartbeat_interval_secs, constants::session::HEARTBEAT_INTERVAL);
        assert_eq!(config.query_page_size, constants::session::QUERY_PAGE_SIZE);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(SyncConfig::from_json("{ nope").is_err());
    }
}
