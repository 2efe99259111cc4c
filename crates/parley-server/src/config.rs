//! Server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the Parley server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Heartbeat ping interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Heartbeat timeout in seconds (close after this long without a pong).
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Substitute `default_session` / the main branch when a
    /// `CHARACTER_MESSAGE` arrives without `sessionId` / `branchId`.
    ///
    /// Off by default: missing IDs are rejected. When enabled, every
    /// substitution is logged at warn level.
    pub legacy_fallback_ids: bool,
    /// How long an `IN_PROGRESS` TTS stream may run before the watchdog
    /// marks it `TIMEOUT`, in seconds.
    pub tts_stream_timeout_secs: u64,
    /// Watchdog sweep interval in seconds.
    pub watchdog_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 50,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            legacy_fallback_ids: false,
            tts_stream_timeout_secs: 60,
            watchdog_interval_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_host_and_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
    }

    #[test]
    fn default_heartbeat() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.heartbeat_interval_secs, 30);
        assert_eq!(cfg.heartbeat_timeout_secs, 90);
    }

    #[test]
    fn legacy_fallback_off_by_default() {
        let cfg = ServerConfig::default();
        assert!(!cfg.legacy_fallback_ids);
    }

    #[test]
    fn default_watchdog() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.tts_stream_timeout_secs, 60);
        assert_eq!(cfg.watchdog_interval_secs, 30);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, cfg.host);
        assert_eq!(back.max_message_size, cfg.max_message_size);
        assert_eq!(back.legacy_fallback_ids, cfg.legacy_fallback_ids);
    }

    #[test]
    fn deserialize_from_json_string() {
        let json = r#"{"host":"0.0.0.0","port":8080,"max_connections":100,"heartbeat_interval_secs":15,"heartbeat_timeout_secs":45,"max_message_size":1024,"legacy_fallback_ids":true,"tts_stream_timeout_secs":30,"watchdog_interval_secs":10}"#;
        let cfg: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert!(cfg.legacy_fallback_ids);
    }
}
