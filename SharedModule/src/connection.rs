//! # Connection Types
//!
//! Peer identity and role types used by both client and authority.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable opaque player id issued by anonymous sign-in
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        PlayerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        PlayerId(id.to_string())
    }
}

/// Device class of a peer, which decides how it locates shared objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Headset that recognizes physical fiducial markers
    Ar,

    /// Headset without markers; pose comes from the network
    Vr,

    /// Desktop simulator; behaves like a VR device
    Simulator,
}

impl DeviceKind {
    /// AR devices anchor objects on physical markers and never write the shared pose
    pub fn uses_markers(&self) -> bool {
        matches!(self, DeviceKind::Ar)
    }
}

/// Whether the local process is the authority for shared state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetRole {
    /// The single peer whose writes are binding
    Authority,

    /// Any other peer; may request writes, never author them
    Client,
}

/// State of the local transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportRole {
    /// Not listening
    Idle,

    /// Listening as relay host
    Host,

    /// Connected as relay client
    Client,
}

/// Basic peer identification known to the authority
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Player id of the peer
    pub player_id: PlayerId,

    /// Device class of the peer
    pub device: DeviceKind,
}
