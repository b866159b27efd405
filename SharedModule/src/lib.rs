//! # SharedModule
//!
//! Shared types and utilities used by both the client and the authority
//! modules of the mixed-reality session and spatial sync layer. This module
//! contains the spatial math, session and object records, the RPC envelopes,
//! the replicated-variable type, configuration and the error taxonomy, so
//! both sides of the network boundary agree on one vocabulary.

// Export module structure
pub mod types;
pub mod constants;
pub mod config;
pub mod error;
pub mod connection;
pub mod session;
pub mod object;
pub mod lifecycle;
pub mod replicated;
pub mod rpc;

// Re-export commonly used items for convenience
pub use types::*;
pub use config::{OwnershipPolicy, SyncConfig};
pub use error::{ProviderError, ProviderResult, SyncError, SyncResult};
pub use connection::{DeviceKind, NetRole, PeerInfo, PlayerId, TransportRole};
pub use session::{
    CreateSessionRequest, Member, Session, SessionId, SessionQuery, SessionRef, SessionStatus,
    SessionUpdate,
};
pub use object::{DockState, InstanceId, ObjectTypeId, SharedObjectRecord};
pub use lifecycle::{ObjectLifecycleState, Visibility};
pub use replicated::Replicated;
pub use rpc::{ReplicatedChange, Request, RequestOp, ServerMessage, Targeted, TargetedOp};
