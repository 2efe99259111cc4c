//! # parleyd
//!
//! Parley conversation server binary — wires the archive, engine, and
//! HTTP/WebSocket server together and runs the TTS stream watchdog.

#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use metrics::{counter, gauge};
use tracing::{info, warn};

use parley_core::StreamingStatus;
use parley_core::logging::init_subscriber;
use parley_engine::Engine;
use parley_server::config::ServerConfig;
use parley_server::metrics::{TTS_STREAM_TIMEOUTS_TOTAL, TTS_STREAMS_ACTIVE, install_recorder};
use parley_server::server::ParleyServer;
use parley_store::MemoryArchive;

/// Parley conversation server.
#[derive(Parser, Debug)]
#[command(name = "parleyd", about = "Parley conversation server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "8765")]
    port: u16,

    /// Log filter (overridden by `RUST_LOG` when set).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Maximum concurrent WebSocket connections.
    #[arg(long)]
    max_connections: Option<usize>,

    /// Substitute the default session and main branch when a
    /// `CHARACTER_MESSAGE` arrives without IDs.
    #[arg(long)]
    legacy_fallback_ids: bool,

    /// Seconds an in-progress TTS stream may run before the watchdog
    /// marks it timed out.
    #[arg(long)]
    tts_stream_timeout_secs: Option<u64>,
}

/// Periodically sweep TTS streams: report the active-stream gauge and time
/// out the stuck ones.
#[allow(clippy::cast_precision_loss)]
async fn run_watchdog(engine: Arc<Engine>, interval_secs: u64, timeout_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    let timeout = chrono::Duration::seconds(i64::try_from(timeout_secs).unwrap_or(i64::MAX));

    loop {
        let _ = ticker.tick().await;
        gauge!(TTS_STREAMS_ACTIVE).set(engine.tts.active_streams().len() as f64);
        for stream in engine.tts.find_stuck(timeout) {
            warn!(stream_id = %stream.id, started_at = %stream.started_at, "timing out stuck TTS stream");
            match engine
                .tts
                .update_status(
                    &stream.id,
                    StreamingStatus::Timeout,
                    Some("stream exceeded the configured timeout".to_owned()),
                )
                .await
            {
                Ok(_) => counter!(TTS_STREAM_TIMEOUTS_TOTAL).increment(1),
                Err(e) => warn!(stream_id = %stream.id, error = %e, "failed to time out stream"),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    init_subscriber(&args.log_level);
    let metrics_handle = install_recorder();

    let mut config = ServerConfig {
        host: args.host,
        port: args.port,
        legacy_fallback_ids: args.legacy_fallback_ids,
        ..ServerConfig::default()
    };
    if let Some(max) = args.max_connections {
        config.max_connections = max;
    }
    if let Some(secs) = args.tts_stream_timeout_secs {
        config.tts_stream_timeout_secs = secs;
    }

    let archive = Arc::new(MemoryArchive::new());
    let engine = Arc::new(Engine::new(archive));
    let server = ParleyServer::new(config.clone(), Arc::clone(&engine)).with_metrics(metrics_handle);

    let shutdown = Arc::clone(server.shutdown());
    let watchdog_token = shutdown.token();
    let watchdog_engine = Arc::clone(&engine);
    let watchdog = tokio::spawn(async move {
        tokio::select! {
            () = run_watchdog(
                watchdog_engine,
                config.watchdog_interval_secs,
                config.tts_stream_timeout_secs,
            ) => {}
            () = watchdog_token.cancelled() => {}
        }
    });

    let (addr, serve_handle) = server.listen().await.context("failed to bind server")?;
    info!("parleyd listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    info!("shutting down...");
    shutdown
        .drain(server.registry(), vec![serve_handle, watchdog], None)
        .await;
    info!("shutdown complete");
    Ok(())
}
