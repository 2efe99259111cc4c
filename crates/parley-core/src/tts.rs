//! TTS routing configuration and streaming-session state machine.
//!
//! A [`RoutingConfig`] binds a participant in a session to a TTS provider
//! with voice and prosody parameters. A [`StreamingSession`] tracks the
//! rendering of one utterance text through that pipeline: `Pending` →
//! `InProgress` → one of the terminal states. Terminal states are immutable;
//! a transition out of one is reported as an error and the recorded state is
//! left unchanged.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::ids::{ParticipantId, RoutingId, SessionId, StreamId};
use crate::now_rfc3339;

/// Locale pattern required by Google Cloud and Azure (e.g. `en-US`).
static LOCALE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}-[A-Z]{2}$").unwrap_or_else(|_| unreachable!()));

/// Voices accepted by the OpenAI provider.
const OPENAI_VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

/// Supported TTS providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TtsProvider {
    /// Google Cloud Text-to-Speech.
    GoogleCloud,
    /// Amazon Polly.
    AwsPolly,
    /// Azure Cognitive Services Speech.
    AzureCognitive,
    /// OpenAI TTS.
    OpenAi,
    /// ElevenLabs.
    ElevenLabs,
    /// Self-hosted or third-party endpoint.
    Custom,
    /// On-device synthesis.
    Local,
}

impl TtsProvider {
    /// Validate provider-specific voice/language requirements.
    ///
    /// Called before a routing config is accepted; the rules mirror what each
    /// provider's API will reject anyway, so misconfiguration surfaces at
    /// configure time rather than mid-stream.
    pub fn validate(
        self,
        voice_id: Option<&str>,
        language: Option<&str>,
    ) -> Result<(), EngineError> {
        match self {
            Self::OpenAi => {
                let voice = voice_id
                    .ok_or_else(|| EngineError::validation("OpenAI requires a voice id"))?;
                if OPENAI_VOICES.iter().any(|v| v.eq_ignore_ascii_case(voice)) {
                    Ok(())
                } else {
                    Err(EngineError::validation(format!(
                        "unsupported OpenAI voice: {voice}"
                    )))
                }
            }
            Self::GoogleCloud | Self::AzureCognitive => {
                let lang = language.ok_or_else(|| {
                    EngineError::validation("provider requires a language code")
                })?;
                if LOCALE_RE.is_match(lang) {
                    Ok(())
                } else {
                    Err(EngineError::validation(format!(
                        "language must match xx-XX (e.g. en-US), got: {lang}"
                    )))
                }
            }
            Self::AwsPolly => {
                let lang = language.ok_or_else(|| {
                    EngineError::validation("AWS Polly requires a language code")
                })?;
                if lang.len() >= 2 {
                    Ok(())
                } else {
                    Err(EngineError::validation(format!(
                        "AWS Polly language code too short: {lang}"
                    )))
                }
            }
            Self::ElevenLabs => match voice_id {
                Some(v) if !v.is_empty() => Ok(()),
                _ => Err(EngineError::validation("ElevenLabs requires a voice id")),
            },
            Self::Custom => match voice_id {
                Some(v) if v.is_empty() => {
                    Err(EngineError::validation("custom voice id must not be empty"))
                }
                _ => Ok(()),
            },
            Self::Local => match language {
                Some(l) if l.is_empty() => {
                    Err(EngineError::validation("local language must not be empty"))
                }
                _ => Ok(()),
            },
        }
    }
}

/// Output audio container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioFormat {
    /// Uncompressed PCM WAV (the default).
    #[default]
    Wav,
    /// MP3.
    Mp3,
    /// Ogg Vorbis.
    Ogg,
    /// FLAC.
    Flac,
}

/// Default sample rate for new routing configs.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Binds a participant to a TTS provider with voice and prosody parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingConfig {
    /// Unique routing config ID.
    pub id: RoutingId,
    /// Session this config belongs to.
    pub session_id: SessionId,
    /// Participant whose utterances this config renders.
    pub participant_id: ParticipantId,
    /// TTS provider.
    pub provider: TtsProvider,
    /// Provider-specific voice identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    /// BCP 47-ish language code (provider-specific shape).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Speaking rate multiplier.
    pub speed: f32,
    /// Pitch multiplier.
    pub pitch: f32,
    /// Volume multiplier.
    pub volume: f32,
    /// Output audio format.
    pub audio_format: AudioFormat,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Optional streaming endpoint URL for `Custom` providers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming_endpoint: Option<String>,
    /// Selection priority; lower values are preferred.
    pub priority: i32,
    /// Whether the config is active (deactivated configs are skipped).
    pub active: bool,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 last-update timestamp.
    pub updated_at: String,
}

impl RoutingConfig {
    /// Create a new active config with default prosody (1.0), format (WAV),
    /// sample rate (44100), and priority (0). Does not validate; call
    /// [`TtsProvider::validate`] first.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        participant_id: ParticipantId,
        provider: TtsProvider,
        voice_id: Option<String>,
        language: Option<String>,
    ) -> Self {
        let now = now_rfc3339();
        Self {
            id: RoutingId::new(),
            session_id,
            participant_id,
            provider,
            voice_id,
            language,
            speed: 1.0,
            pitch: 1.0,
            volume: 1.0,
            audio_format: AudioFormat::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            streaming_endpoint: None,
            priority: 0,
            active: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Status of a TTS streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamingStatus {
    /// Created, not yet streaming.
    Pending,
    /// Audio chunks are flowing.
    InProgress,
    /// Finished successfully; terminal.
    Completed,
    /// Provider or pipeline error; terminal.
    Failed,
    /// Cancelled by a client or the server; terminal.
    Cancelled,
    /// Stuck in progress past the watchdog cutoff; terminal.
    Timeout,
}

impl StreamingStatus {
    /// Whether this status admits no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Timeout
        )
    }
}

/// Tracks the rendering of one utterance text through a TTS pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingSession {
    /// Unique streaming session ID.
    pub id: StreamId,
    /// Routing config driving this stream.
    pub routing_id: RoutingId,
    /// The utterance text being rendered.
    pub text: String,
    /// Current status.
    pub status: StreamingStatus,
    /// When streaming started.
    pub started_at: DateTime<Utc>,
    /// Set exactly once when the stream completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Set exactly once when the stream fails, is cancelled, or times out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    /// Error message recorded with a failure transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Number of audio chunks streamed so far.
    pub chunk_count: u64,
    /// Total audio bytes streamed so far.
    pub total_bytes: u64,
    /// Rendered audio duration in milliseconds, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl StreamingSession {
    /// Create a new `Pending` streaming session.
    #[must_use]
    pub fn new(routing_id: RoutingId, text: impl Into<String>) -> Self {
        Self {
            id: StreamId::new(),
            routing_id,
            text: text.into(),
            status: StreamingStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            failed_at: None,
            error_message: None,
            chunk_count: 0,
            total_bytes: 0,
            duration_ms: None,
        }
    }

    /// Apply a status transition.
    ///
    /// Rejected with [`EngineError::InvalidTransition`] when the current
    /// status is terminal, or when the requested status would move the
    /// stream back to `Pending`; the recorded state is left untouched in
    /// either case. `completed_at` and `failed_at` are set exactly once, on
    /// entry to the corresponding terminal state.
    pub fn transition(
        &mut self,
        status: StreamingStatus,
        error: Option<String>,
    ) -> Result<(), EngineError> {
        let regresses =
            status == StreamingStatus::Pending && self.status != StreamingStatus::Pending;
        if self.status.is_terminal() || regresses {
            return Err(EngineError::InvalidTransition {
                stream_id: self.id.to_string(),
                current: self.status,
                requested: status,
            });
        }
        self.status = status;
        match status {
            StreamingStatus::Completed => {
                self.completed_at = Some(Utc::now());
            }
            StreamingStatus::Failed | StreamingStatus::Cancelled | StreamingStatus::Timeout => {
                self.failed_at = Some(Utc::now());
            }
            StreamingStatus::Pending | StreamingStatus::InProgress => {}
        }
        if let Some(msg) = error {
            self.error_message = Some(msg);
        }
        Ok(())
    }

    /// Overwrite progress counters; `None` fields are left untouched.
    pub fn record_progress(
        &mut self,
        chunk_count: Option<u64>,
        total_bytes: Option<u64>,
        duration_ms: Option<u64>,
    ) {
        if let Some(c) = chunk_count {
            self.chunk_count = c;
        }
        if let Some(b) = total_bytes {
            self.total_bytes = b;
        }
        if let Some(d) = duration_ms {
            self.duration_ms = Some(d);
        }
    }

    /// Whether this stream is `InProgress` and started before `cutoff`.
    #[must_use]
    pub fn is_stuck(&self, cutoff: DateTime<Utc>) -> bool {
        self.status == StreamingStatus::InProgress && self.started_at < cutoff
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
