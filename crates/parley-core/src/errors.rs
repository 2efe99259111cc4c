//! Engine error codes and error type.
//!
//! [`EngineError`] is the primary error type returned by directory, branch,
//! and TTS operations. Every variant maps to a machine-readable wire code
//! via [`EngineError::code`]; handlers surface these as structured `ERROR`
//! envelopes and never let them cross the request boundary as panics.

use thiserror::Error;

use crate::branch::BranchStatus;
use crate::tts::StreamingStatus;

// ── Error code constants ────────────────────────────────────────────

/// Session does not exist.
pub const SESSION_NOT_FOUND: &str = "SESSION_NOT_FOUND";
/// Session exists but has already ended.
pub const SESSION_ENDED: &str = "SESSION_ENDED";
/// Session is at its participant capacity.
pub const SESSION_FULL: &str = "SESSION_FULL";
/// Participant not found in the session.
pub const PARTICIPANT_NOT_FOUND: &str = "PARTICIPANT_NOT_FOUND";
/// Branch does not exist.
pub const BRANCH_NOT_FOUND: &str = "BRANCH_NOT_FOUND";
/// Parent branch does not exist or belongs to a different session.
pub const PARENT_BRANCH_NOT_FOUND: &str = "PARENT_BRANCH_NOT_FOUND";
/// The main branch cannot be merged or deleted.
pub const CANNOT_MERGE_MAIN: &str = "CANNOT_MERGE_MAIN";
/// Branch is in a state that forbids the requested transition.
pub const INVALID_BRANCH_STATE: &str = "INVALID_BRANCH_STATE";
/// TTS routing configuration does not exist.
pub const ROUTING_NOT_FOUND: &str = "ROUTING_NOT_FOUND";
/// TTS streaming session does not exist.
pub const STREAM_NOT_FOUND: &str = "STREAM_NOT_FOUND";
/// Streaming session is terminal and rejects further transitions.
pub const INVALID_TRANSITION: &str = "INVALID_TRANSITION";
/// Provider-specific TTS configuration validation failed.
pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
/// TTS provider is not recognized.
pub const UNSUPPORTED_PROVIDER: &str = "UNSUPPORTED_PROVIDER";
/// Generic failure while decoding or dispatching an inbound frame.
pub const MESSAGE_PROCESSING_ERROR: &str = "MESSAGE_PROCESSING_ERROR";

/// Errors returned by the session directory, branch tree, and TTS router.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Requested session was not found.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Session has already ended and rejects mutation.
    #[error("session has ended: {0}")]
    SessionEnded(String),

    /// Session is at capacity; the join was rejected.
    #[error("session {session_id} is full ({max_participants} participants)")]
    SessionFull {
        /// Session that rejected the join.
        session_id: String,
        /// Configured capacity.
        max_participants: u32,
    },

    /// Participant was not found in the session.
    #[error("participant not found: {0}")]
    ParticipantNotFound(String),

    /// Requested branch was not found.
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// Parent branch was not found or belongs to a different session.
    #[error("parent branch not found: {0}")]
    ParentNotFound(String),

    /// Merging the main branch is forbidden.
    #[error("cannot merge main branch: {0}")]
    CannotMergeMain(String),

    /// Branch is in a state that forbids the requested transition.
    #[error("branch {branch_id} is {status:?}, cannot {operation}")]
    InvalidBranchState {
        /// Branch that rejected the transition.
        branch_id: String,
        /// Current branch status.
        status: BranchStatus,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// Requested routing configuration was not found.
    #[error("routing config not found: {0}")]
    RoutingNotFound(String),

    /// Requested streaming session was not found.
    #[error("streaming session not found: {0}")]
    StreamNotFound(String),

    /// Streaming session is terminal; the transition was rejected.
    #[error("streaming session {stream_id} is already {current:?}, cannot move to {requested:?}")]
    InvalidTransition {
        /// Streaming session that rejected the transition.
        stream_id: String,
        /// Recorded (terminal) status.
        current: StreamingStatus,
        /// Status that was requested.
        requested: StreamingStatus,
    },

    /// Provider-specific configuration validation failed.
    #[error("{message}")]
    Validation {
        /// Description of what is wrong.
        message: String,
    },

    /// Provider is not recognized.
    #[error("unsupported TTS provider: {0}")]
    UnsupportedProvider(String),
}

impl EngineError {
    /// Machine-readable error code for this variant.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => SESSION_NOT_FOUND,
            Self::SessionEnded(_) => SESSION_ENDED,
            Self::SessionFull { .. } => SESSION_FULL,
            Self::ParticipantNotFound(_) => PARTICIPANT_NOT_FOUND,
            Self::BranchNotFound(_) => BRANCH_NOT_FOUND,
            Self::ParentNotFound(_) => PARENT_BRANCH_NOT_FOUND,
            Self::CannotMergeMain(_) => CANNOT_MERGE_MAIN,
            Self::InvalidBranchState { .. } => INVALID_BRANCH_STATE,
            Self::RoutingNotFound(_) => ROUTING_NOT_FOUND,
            Self::StreamNotFound(_) => STREAM_NOT_FOUND,
            Self::InvalidTransition { .. } => INVALID_TRANSITION,
            Self::Validation { .. } => VALIDATION_FAILED,
            Self::UnsupportedProvider(_) => UNSUPPORTED_PROVIDER,
        }
    }

    /// Shorthand for a [`EngineError::Validation`] error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_not_found_code() {
        let err = EngineError::SessionNotFound("s1".into());
        assert_eq!(err.code(), SESSION_NOT_FOUND);
        assert!(err.to_string().contains("s1"));
    }

    #[test]
    fn session_full_code_and_display() {
        let err = EngineError::SessionFull {
            session_id: "s1".into(),
            max_participants: 2,
        };
        assert_eq!(err.code(), SESSION_FULL);
        assert!(err.to_string().contains("s1"));
        assert!(err.to_string().contains('2'));
    }

    #[test]
    fn cannot_merge_main_code() {
        let err = EngineError::CannotMergeMain("br-main".into());
        assert_eq!(err.code(), CANNOT_MERGE_MAIN);
    }

    #[test]
    fn invalid_branch_state_display() {
        let err = EngineError::InvalidBranchState {
            branch_id: "b1".into(),
            status: BranchStatus::Merged,
            operation: "pause",
        };
        assert_eq!(err.code(), INVALID_BRANCH_STATE);
        assert!(err.to_string().contains("pause"));
    }

    #[test]
    fn invalid_transition_display() {
        let err = EngineError::InvalidTransition {
            stream_id: "st1".into(),
            current: StreamingStatus::Completed,
            requested: StreamingStatus::Failed,
        };
        assert_eq!(err.code(), INVALID_TRANSITION);
        assert!(err.to_string().contains("st1"));
    }

    #[test]
    fn validation_shorthand() {
        let err = EngineError::validation("voice id required");
        assert_eq!(err.code(), VALIDATION_FAILED);
        assert_eq!(err.to_string(), "voice id required");
    }

    #[test]
    fn unsupported_provider_code() {
        let err = EngineError::UnsupportedProvider("SHOUTY".into());
        assert_eq!(err.code(), UNSUPPORTED_PROVIDER);
    }

    #[test]
    fn engine_error_is_std_error() {
        let err = EngineError::BranchNotFound("b".into());
        let _: &dyn std::error::Error = &err;
    }
}
