//! # parley-server
//!
//! Axum HTTP + WebSocket server for Parley: the connection registry, frame
//! dispatch, broadcast fan-out, heartbeats, health and metrics endpoints,
//! and graceful shutdown.

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod protocol;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::{AppState, ParleyServer};
pub use shutdown::ShutdownCoordinator;
