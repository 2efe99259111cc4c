//! Coordinated shutdown: notify connected clients, cancel the server token,
//! drain the remaining tasks.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::protocol::{self, OutboundEvent};
use crate::websocket::registry::ConnectionRegistry;

/// How long [`ShutdownCoordinator::drain`] waits for tasks before giving up.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Coordinates shutdown across the serve loop, the watchdog, and the
/// connected clients.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator with an untripped token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token that server tasks select on.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trip the token. Idempotent.
    pub fn begin(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Shut the server down in order: send every live client a
    /// `SERVER_SHUTDOWN` notice, trip the token so the accept loop and
    /// watchdog stop, then wait up to `timeout` for the tasks to finish.
    /// Tasks still running afterwards are left to the runtime to drop.
    pub async fn drain(
        &self,
        registry: &ConnectionRegistry,
        handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        let notified = notify_clients(registry);
        self.begin();

        info!(
            notified,
            task_count = handles.len(),
            timeout_secs = timeout.as_secs(),
            "draining server tasks"
        );

        let joined = futures::future::join_all(handles);
        if tokio::time::timeout(timeout, joined).await.is_err() {
            warn!("drain timed out after {timeout:?}, some tasks may still be running");
        }
    }
}

/// Best-effort `SERVER_SHUTDOWN` notice to every live connection, serialized
/// once and fanned out. Returns how many sends were enqueued; full or closed
/// channels are skipped.
fn notify_clients(registry: &ConnectionRegistry) -> usize {
    let event = OutboundEvent::new(
        protocol::SERVER_SHUTDOWN,
        json!({"reason": "server stopping"}),
    );
    let Ok(text) = serde_json::to_string(&event) else {
        return 0;
    };
    let payload = Arc::new(text);
    registry
        .connections()
        .iter()
        .filter(|conn| conn.send(Arc::clone(&payload)))
        .count()
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
