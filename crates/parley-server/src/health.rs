//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: &'static str,
    /// Crate version of the running server.
    pub version: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current WebSocket connection count.
    pub connections: usize,
    /// Number of active conversation sessions.
    pub active_sessions: usize,
}

impl HealthResponse {
    /// Snapshot the live counters into a response body.
    #[must_use]
    pub fn snapshot(start_time: Instant, connections: usize, active_sessions: usize) -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: start_time.elapsed().as_secs(),
            connections,
            active_sessions,
        }
    }
}
