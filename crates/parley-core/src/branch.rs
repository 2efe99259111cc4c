//! Conversation branches and utterances.
//!
//! Branches form a forest per session: every session has one `Main` branch
//! and any number of child branches splitting off it (or off each other).
//! Utterances are turn-based messages inside a single branch, numbered by a
//! strictly increasing, gapless per-branch sequence starting at 1.

use serde::{Deserialize, Serialize};

use crate::ids::{BranchId, ParticipantId, SessionId, UtteranceId};
use crate::now_rfc3339;

/// Why a branch exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchKind {
    /// The root branch every session starts with.
    Main,
    /// Split off to pursue a separate topic.
    TopicSplit,
    /// Private side-conversation between a subset of participants.
    PrivateChat,
    /// Created autonomously by an AI agent.
    AiGenerated,
    /// Created explicitly by a user.
    UserCreated,
    /// Parallel exploration of the same topic.
    Parallel,
}

/// Lifecycle state of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchStatus {
    /// Accepting utterances.
    Active,
    /// Temporarily suspended; can be resumed.
    Paused,
    /// Merged back into its parent; terminal.
    Merged,
    /// Retained read-only; terminal.
    Archived,
    /// Soft-deleted; terminal.
    Deleted,
}

impl BranchStatus {
    /// Whether the branch can still transition to another state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Merged | Self::Archived | Self::Deleted)
    }
}

/// What kind of utterance this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UtteranceKind {
    /// A spoken character line, eligible for TTS rendering.
    CharacterSpeech,
    /// Scene-setting or descriptive text.
    Narration,
    /// System-generated notice (joins, merges, housekeeping).
    SystemNotice,
}

/// A node in a session's branch tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    /// Unique branch ID.
    pub id: BranchId,
    /// Session this branch belongs to.
    pub session_id: SessionId,
    /// Parent branch; `None` only for the `Main` branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<BranchId>,
    /// Human-readable branch name.
    pub name: String,
    /// Optional description of why the branch was split.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Why the branch exists.
    pub kind: BranchKind,
    /// Lifecycle state.
    pub status: BranchStatus,
    /// Creation-order index within the session (0 for `Main`, then 1, 2, …).
    pub sequence_order: u32,
    /// Participant who created the branch.
    pub created_by: ParticipantId,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 merge timestamp, set once when the branch is merged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<String>,
}

impl Branch {
    /// Create a new active branch.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: SessionId,
        parent_id: Option<BranchId>,
        name: impl Into<String>,
        description: Option<String>,
        kind: BranchKind,
        sequence_order: u32,
        created_by: ParticipantId,
    ) -> Self {
        Self {
            id: BranchId::new(),
            session_id,
            parent_id,
            name: name.into(),
            description,
            kind,
            status: BranchStatus::Active,
            sequence_order,
            created_by,
            created_at: now_rfc3339(),
            merged_at: None,
        }
    }

    /// Create the `Main` branch for a session (sequence order 0, no parent).
    #[must_use]
    pub fn main(session_id: SessionId, created_by: ParticipantId) -> Self {
        Self::new(
            session_id,
            None,
            "Main",
            None,
            BranchKind::Main,
            0,
            created_by,
        )
    }
}

/// A single turn inside a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    /// Unique utterance ID.
    pub id: UtteranceId,
    /// Branch this utterance belongs to.
    pub branch_id: BranchId,
    /// Participant who spoke.
    pub speaker_id: ParticipantId,
    /// Message text.
    pub content: String,
    /// Utterance kind.
    pub kind: UtteranceKind,
    /// Per-branch sequence number, strictly increasing from 1.
    pub sequence_number: u64,
    /// Optional emotion hint for rendering (e.g. "happy").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    /// Optional animation hint for rendering (e.g. "wave").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl Utterance {
    /// Create a new utterance with an assigned sequence number.
    #[must_use]
    pub fn new(
        branch_id: BranchId,
        speaker_id: ParticipantId,
        content: impl Into<String>,
        kind: UtteranceKind,
        sequence_number: u64,
    ) -> Self {
        Self {
            id: UtteranceId::new(),
            branch_id,
            speaker_id,
            content: content.into(),
            kind,
            sequence_number,
            emotion: None,
            animation: None,
            created_at: now_rfc3339(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
