//! WebSocket layer: connection state, the registry, broadcast fan-out,
//! frame dispatch, liveness, and the per-client session loop.

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod registry;
pub mod session;

pub use broadcast::BroadcastRouter;
pub use connection::ClientConnection;
pub use handler::{DispatchContext, dispatch};
pub use heartbeat::{HeartbeatResult, run_heartbeat};
pub use registry::ConnectionRegistry;
pub use session::run_ws_session;
