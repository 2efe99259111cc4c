//! # parley-core
//!
//! Foundation types, errors, branded IDs, and the domain model for the
//! Parley conversation server.
//!
//! This crate provides the shared vocabulary that all other Parley crates
//! depend on:
//!
//! - **Branded IDs**: `SessionId`, `BranchId`, `ParticipantId`, … as newtypes
//!   for type safety
//! - **Sessions**: `Session` and `Participant` with lifecycle state
//! - **Branches**: `Branch` tree nodes and per-branch `Utterance` records
//! - **TTS**: `RoutingConfig` and `StreamingSession` with the streaming
//!   status state machine
//! - **Errors**: `EngineError` hierarchy via `thiserror` with wire-format
//!   error codes

#![deny(unsafe_code)]

pub mod branch;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod session;
pub mod tts;

pub use branch::{Branch, BranchKind, BranchStatus, Utterance, UtteranceKind};
pub use errors::EngineError;
pub use ids::{
    BranchId, ConnectionId, ParticipantId, RoutingId, SessionId, StreamId, UtteranceId,
};
pub use session::{Participant, ParticipantKind, ParticipantRole, Session, SessionStatus};
pub use tts::{AudioFormat, RoutingConfig, StreamingSession, StreamingStatus, TtsProvider};

/// Current UTC timestamp in RFC 3339 with millisecond precision.
///
/// All wire-visible timestamps in Parley use this format.
#[must_use]
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_rfc3339_is_parseable() {
        let ts = now_rfc3339();
        let parsed = chrono::DateTime::parse_from_rfc3339(&ts);
        assert!(parsed.is_ok());
    }

    #[test]
    fn now_rfc3339_has_millis() {
        let ts = now_rfc3339();
        // 2026-08-27T12:00:00.000Z — a '.' before the trailing 'Z'
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('.'));
    }
}
