//! # RPC Types
//!
//! The two explicit message kinds exchanged with the authority:
//! - [`Request`]: client-invoked, authority-executed
//! - [`Targeted`]: authority-invoked, delivered to a single peer
//!
//! plus [`ReplicatedChange`], the change notifications for replicated
//! variables that the authority broadcasts after every flush.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::connection::PlayerId;
use crate::error::{SyncError, SyncResult};
use crate::object::{DockState, ObjectTypeId, SharedObjectRecord};
use crate::types::Pose;

/// Operations a client may ask the authority to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestOp {
    /// Look up the live instance of a type, spawning it on first reference
    GetOrSpawn,

    /// Write the shared world pose (VR placement)
    WriteSharedPose,

    /// Take ownership of a grabbable sub-object
    RequestOwnership,

    /// Hand ownership back to the default owner
    ReleaseOwnership,

    /// Leave the docked state
    RequestUndock,

    /// Reset the relative offset and return to the docked state
    RequestRedock,

    /// Owner pushes its current pose relative to the anchor
    PushGrabPose,
}

/// Operations the authority performs on a single peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetedOp {
    /// Reply to `GetOrSpawn` carrying the record
    SpawnResult,

    /// A request was refused; args carry the error
    RequestRejected,

    /// Ownership was not granted under the first-request-wins policy
    OwnershipDenied,
}

/// A client-invoked, authority-executed call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Caller-chosen id echoed in any targeted reply
    pub call_id: u64,

    /// Requested operation
    pub op: RequestOp,

    /// Object the operation applies to
    pub type_id: ObjectTypeId,

    /// Arguments as JSON string
    pub args_json: String,

    /// Peer issuing the request
    pub requester: PlayerId,
}

impl Request {
    pub fn new<A: Serialize>(
        call_id: u64,
        op: RequestOp,
        type_id: ObjectTypeId,
        args: &A,
        requester: PlayerId,
    ) -> SyncResult<Self> {
        Ok(Self {
            call_id,
            op,
            type_id,
            args_json: serde_json::to_string(args)?,
            requester,
        })
    }

    /// Decode the arguments
    pub fn args<A: DeserializeOwned>(&self) -> SyncResult<A> {
        serde_json::from_str(&self.args_json).map_err(SyncError::from)
    }
}

/// An authority-invoked call delivered to exactly one peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Targeted {
    /// Id of the request this answers, if any
    pub call_id: Option<u64>,

    /// Operation to perform on the target
    pub op: TargetedOp,

    /// Object the operation concerns
    pub type_id: ObjectTypeId,

    /// Arguments as JSON string
    pub args_json: String,

    /// Receiving peer
    pub target: PlayerId,
}

impl Targeted {
    pub fn new<A: Serialize>(
        call_id: Option<u64>,
        op: TargetedOp,
        type_id: ObjectTypeId,
        args: &A,
        target: PlayerId,
    ) -> SyncResult<Self> {
        Ok(Self {
            call_id,
            op,
            type_id,
            args_json: serde_json::to_string(args)?,
            target,
        })
    }

    pub fn args<A: DeserializeOwned>(&self) -> SyncResult<A> {
        serde_json::from_str(&self.args_json).map_err(SyncError::from)
    }
}

/// Change notification for an authority-owned replicated variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplicatedChange {
    /// A new live instance exists
    Spawned(SharedObjectRecord),

    /// The shared world pose of an object changed
    SharedPose {
        type_id: ObjectTypeId,
        pose: Pose,
    },

    /// The dock state (including owner) of a grabbable sub-object changed
    Dock {
        type_id: ObjectTypeId,
        state: DockState,
    },

    /// The instance was torn down
    Released {
        type_id: ObjectTypeId,
    },
}

/// Everything the authority sends to a peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    Targeted(Targeted),
    Replicated(ReplicatedChange),
}

impl ServerMessage {
    /// Wire encoding
    pub fn to_json(&self) -> SyncResult<String> {
        serde_json::to_string(self).map_err(SyncError::from)
    }

    pub fn from_json(json: &str) -> SyncResult<Self> {
        serde_json::from_str(json).map_err(SyncError::from)
    }
}

/// Arguments of `WriteSharedPose`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseArgs {
    pub pose: Pose,
}

/// Arguments of `PushGrabPose`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrabPushArgs {
    /// Pose relative to the anchor
    pub relative: Pose,

    /// Monotonic per-owner sequence; stale pushes are dropped
    pub sequence: u32,
}

/// Arguments of `RequestRejected` and `OwnershipDenied`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionArgs {
    pub error: SyncError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Quat, Vector3};

    #[test]
    fn request_args_decode() {
        let pose = Pose::new(Vector3::new(1.0, 0.5, -2.0), Quat::identity());
        let request = Request::new(
            7,
            RequestOp::WriteSharedPose,
            ObjectTypeId::from("SolarPanel"),
            &PoseArgs { pose },
            PlayerId::from("vr-1"),
        )
        .unwrap();
        let args: PoseArgs = request.args().unwrap();
        assert_eq!(args.pose, pose);
    }

    #[test]
    fn malformed_args_surface_as_serialization_error() {
        let mut request = Request::new(
            1,
            RequestOp::PushGrabPose,
            ObjectTypeId::from("SolarPanel"),
            &(),
            PlayerId::from("p"),
        )
        .unwrap();
        request.args_json = "{not json".into();
        assert!(matches!(request.args::<GrabPushArgs>(), Err(SyncError::Serialization(_))));
    }
}
