//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across crates.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Broadcast drops total (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Slow clients evicted from the registry total (counter).
pub const SLOW_CLIENT_EVICTIONS_TOTAL: &str = "slow_client_evictions_total";
/// Inbound frames total (counter, labels: type).
pub const FRAMES_TOTAL: &str = "frames_total";
/// Inbound frames rejected with an error envelope total (counter).
pub const FRAME_ERRORS_TOTAL: &str = "frame_errors_total";
/// Heartbeat timeouts total (counter).
pub const HEARTBEAT_TIMEOUTS_TOTAL: &str = "heartbeat_timeouts_total";
/// Active TTS streaming sessions (gauge).
pub const TTS_STREAMS_ACTIVE: &str = "tts_streams_active";
/// TTS streams timed out by the watchdog total (counter).
pub const TTS_STREAM_TIMEOUTS_TOTAL: &str = "tts_stream_timeouts_total";
