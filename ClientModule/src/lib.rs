//! # XR Sync Client Module
//!
//! The per-peer half of the mixed-reality session and spatial sync layer.
//! It signs the local player in, runs the lobby lifecycle, hands off to the
//! realtime relay and reconciles shared objects against the authority.
//!
//! The system is organized into several sub-modules:
//! - `identity`: Anonymous sign-in and the cached player id
//! - `net`: Provider traits, non-blocking calls and loopback collaborators
//! - `transport`: Relay allocation and the host/client transport role
//! - `session`: The Session Manager state machine
//! - `rpc`: Channel to the authority
//! - `object`: Shared object and grabbable reconciliation
//! - `runtime`: Tick loop driver

// Module declarations
pub mod identity;   // Anonymous sign-in
pub mod net;        // Network boundary
pub mod transport;  // Realtime transport bootstrap
pub mod session;    // Lobby lifecycle
pub mod rpc;        // Authority channel
pub mod object;     // Client-side shared objects
pub mod throttle;   // Pose push throttling
pub mod runtime;    // Tick loop

// Re-export commonly used items
pub use identity::{IdentityClient, IdentityProvider};
pub use net::{
    pending_call, Completer, LobbyProvider, LocalIdentityProvider, LocalLobbyService,
    LocalRelayService, PendingCall, RelayAllocation, RelayService,
};
pub use transport::TransportBootstrap;
pub use session::{ManagerState, SessionEvent, SessionManager, SessionOp};
pub use rpc::AuthorityLink;
pub use object::{GrabbableView, SharedObjectView, SpatialClient, SpatialEvent};
pub use throttle::PushThrottle;
pub use runtime::{run_ticks, run_until, Tick};
