//! The TTS router: routing configurations and streaming sessions.
//!
//! Configuration validation happens before anything is inserted, so a
//! rejected config leaves no trace. Streaming sessions carry their own
//! state machine ([`parley_core::StreamingSession`]); the router adds the
//! index, the per-stream lock, and the stuck-stream sweep used by the
//! watchdog.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use parley_core::errors::Result;
use parley_core::{
    AudioFormat, EngineError, ParticipantId, RoutingConfig, RoutingId, SessionId, StreamId,
    StreamingSession, StreamingStatus, TtsProvider, now_rfc3339,
};
use parley_store::{Archive, Record};

use crate::directory::SessionDirectory;

/// Parameters accepted by [`TtsRouter::create_config`].
#[derive(Debug, Clone)]
pub struct NewRoutingConfig {
    /// Session the config belongs to.
    pub session_id: SessionId,
    /// Participant whose utterances this config renders.
    pub participant_id: ParticipantId,
    /// TTS provider.
    pub provider: TtsProvider,
    /// Provider-specific voice identifier.
    pub voice_id: Option<String>,
    /// Language code.
    pub language: Option<String>,
    /// Streaming endpoint URL for `Custom` providers.
    pub streaming_endpoint: Option<String>,
}

/// Partial update for [`TtsRouter::update_config`]; `None` fields keep
/// their current values.
#[derive(Debug, Clone, Default)]
pub struct RoutingUpdate {
    /// Speaking rate multiplier.
    pub speed: Option<f32>,
    /// Pitch multiplier.
    pub pitch: Option<f32>,
    /// Volume multiplier.
    pub volume: Option<f32>,
    /// Output audio format.
    pub audio_format: Option<AudioFormat>,
    /// Output sample rate in Hz.
    pub sample_rate: Option<u32>,
}

/// Routing configs and live streaming sessions.
pub struct TtsRouter {
    configs: RwLock<HashMap<RoutingId, Arc<Mutex<RoutingConfig>>>>,
    streams: RwLock<HashMap<StreamId, Arc<Mutex<StreamingSession>>>>,
    directory: Arc<SessionDirectory>,
    archive: Arc<dyn Archive>,
}

impl TtsRouter {
    /// Create an empty router over the given directory and archive.
    pub fn new(directory: Arc<SessionDirectory>, archive: Arc<dyn Archive>) -> Self {
        Self {
            configs: RwLock::new(HashMap::new()),
            streams: RwLock::new(HashMap::new()),
            directory,
            archive,
        }
    }

    fn config_entry(&self, routing_id: &RoutingId) -> Option<Arc<Mutex<RoutingConfig>>> {
        self.configs.read().get(routing_id).cloned()
    }

    fn stream_entry(&self, stream_id: &StreamId) -> Option<Arc<Mutex<StreamingSession>>> {
        self.streams.read().get(stream_id).cloned()
    }

    async fn archive_save(&self, record: Record) {
        if let Err(err) = self.archive.save_record(record).await {
            warn!(error = %err, "archive write failed; in-memory state unchanged");
        }
    }

    // ── Routing configs ─────────────────────────────────────────────

    /// Validate and register a routing config.
    ///
    /// Provider rules are checked first; the session must exist. Nothing is
    /// inserted on failure.
    pub async fn create_config(&self, new: NewRoutingConfig) -> Result<RoutingConfig> {
        new.provider
            .validate(new.voice_id.as_deref(), new.language.as_deref())?;
        if !self.directory.contains(&new.session_id) {
            return Err(EngineError::SessionNotFound(new.session_id.to_string()));
        }

        let mut config = RoutingConfig::new(
            new.session_id,
            new.participant_id,
            new.provider,
            new.voice_id,
            new.language,
        );
        config.streaming_endpoint = new.streaming_endpoint;
        let snapshot = config.clone();
        let _ = self
            .configs
            .write()
            .insert(config.id.clone(), Arc::new(Mutex::new(config)));

        info!(
            routing_id = %snapshot.id,
            session_id = %snapshot.session_id,
            participant_id = %snapshot.participant_id,
            provider = ?snapshot.provider,
            "routing config created"
        );
        self.archive_save(Record::RoutingConfig(snapshot.clone())).await;
        Ok(snapshot)
    }

    /// One config snapshot.
    pub fn config(&self, routing_id: &RoutingId) -> Result<RoutingConfig> {
        self.config_entry(routing_id)
            .map(|e| e.lock().clone())
            .ok_or_else(|| EngineError::RoutingNotFound(routing_id.to_string()))
    }

    /// Active configs for a session, ascending by priority (lower preferred).
    pub fn configs_for_session(&self, session_id: &SessionId) -> Vec<RoutingConfig> {
        let entries: Vec<_> = self.configs.read().values().cloned().collect();
        let mut configs: Vec<RoutingConfig> = entries
            .iter()
            .map(|e| e.lock().clone())
            .filter(|c| c.active && &c.session_id == session_id)
            .collect();
        configs.sort_by_key(|c| c.priority);
        configs
    }

    /// Active configs for one participant in a session, ascending by priority.
    pub fn configs_for_participant(
        &self,
        session_id: &SessionId,
        participant_id: &ParticipantId,
    ) -> Vec<RoutingConfig> {
        self.configs_for_session(session_id)
            .into_iter()
            .filter(|c| &c.participant_id == participant_id)
            .collect()
    }

    /// Overwrite the provided prosody/format fields; `None` keeps the
    /// current value. Bumps `updated_at`.
    pub async fn update_config(
        &self,
        routing_id: &RoutingId,
        update: RoutingUpdate,
    ) -> Result<RoutingConfig> {
        let entry = self
            .config_entry(routing_id)
            .ok_or_else(|| EngineError::RoutingNotFound(routing_id.to_string()))?;

        let snapshot = {
            let mut guard = entry.lock();
            if let Some(v) = update.speed {
                guard.speed = v;
            }
            if let Some(v) = update.pitch {
                guard.pitch = v;
            }
            if let Some(v) = update.volume {
                guard.volume = v;
            }
            if let Some(v) = update.audio_format {
                guard.audio_format = v;
            }
            if let Some(v) = update.sample_rate {
                guard.sample_rate = v;
            }
            guard.updated_at = now_rfc3339();
            guard.clone()
        };

        debug!(routing_id = %routing_id, "routing config updated");
        self.archive_save(Record::RoutingConfig(snapshot.clone())).await;
        Ok(snapshot)
    }

    /// Deactivate a config; it stops appearing in selection queries.
    /// Idempotent.
    pub async fn deactivate_config(&self, routing_id: &RoutingId) -> Result<RoutingConfig> {
        let entry = self
            .config_entry(routing_id)
            .ok_or_else(|| EngineError::RoutingNotFound(routing_id.to_string()))?;

        let snapshot = {
            let mut guard = entry.lock();
            if guard.active {
                guard.active = false;
                guard.updated_at = now_rfc3339();
            }
            guard.clone()
        };

        info!(routing_id = %routing_id, "routing config deactivated");
        self.archive_save(Record::RoutingConfig(snapshot.clone())).await;
        Ok(snapshot)
    }

    // ── Streaming sessions ──────────────────────────────────────────

    /// Create a `Pending` streaming session under a routing config.
    pub async fn start_streaming(
        &self,
        routing_id: &RoutingId,
        text: impl Into<String>,
    ) -> Result<StreamingSession> {
        let session_id = self.config(routing_id)?.session_id;

        let stream = StreamingSession::new(routing_id.clone(), text);
        let snapshot = stream.clone();
        let _ = self
            .streams
            .write()
            .insert(stream.id.clone(), Arc::new(Mutex::new(stream)));

        info!(
            stream_id = %snapshot.id,
            routing_id = %routing_id,
            "streaming session created"
        );
        self.archive_save(Record::StreamingSession {
            session_id,
            stream: snapshot.clone(),
        })
        .await;
        Ok(snapshot)
    }

    /// One streaming session snapshot.
    pub fn stream(&self, stream_id: &StreamId) -> Result<StreamingSession> {
        self.stream_entry(stream_id)
            .map(|e| e.lock().clone())
            .ok_or_else(|| EngineError::StreamNotFound(stream_id.to_string()))
    }

    /// Apply a status transition to a streaming session.
    ///
    /// Transitions out of a terminal state are rejected with
    /// `InvalidTransition`; the recorded state is unchanged in that case.
    pub async fn update_status(
        &self,
        stream_id: &StreamId,
        status: StreamingStatus,
        error: Option<String>,
    ) -> Result<StreamingSession> {
        let entry = self
            .stream_entry(stream_id)
            .ok_or_else(|| EngineError::StreamNotFound(stream_id.to_string()))?;

        let snapshot = {
            let mut guard = entry.lock();
            guard.transition(status, error)?;
            guard.clone()
        };

        debug!(stream_id = %stream_id, status = ?status, "stream status changed");
        let session_id = self
            .config(&snapshot.routing_id)
            .map(|c| c.session_id)
            .unwrap_or_else(|_| SessionId::from("unknown"));
        self.archive_save(Record::StreamingSession {
            session_id,
            stream: snapshot.clone(),
        })
        .await;
        Ok(snapshot)
    }

    /// Overwrite progress counters; `None` fields keep their values.
    pub async fn update_progress(
        &self,
        stream_id: &StreamId,
        chunk_count: Option<u64>,
        total_bytes: Option<u64>,
        duration_ms: Option<u64>,
    ) -> Result<StreamingSession> {
        let entry = self
            .stream_entry(stream_id)
            .ok_or_else(|| EngineError::StreamNotFound(stream_id.to_string()))?;

        let snapshot = {
            let mut guard = entry.lock();
            guard.record_progress(chunk_count, total_bytes, duration_ms);
            guard.clone()
        };

        let session_id = self
            .config(&snapshot.routing_id)
            .map(|c| c.session_id)
            .unwrap_or_else(|_| SessionId::from("unknown"));
        self.archive_save(Record::StreamingSession {
            session_id,
            stream: snapshot.clone(),
        })
        .await;
        Ok(snapshot)
    }

    /// `InProgress` streams whose `started_at` is older than `timeout`.
    ///
    /// A read-only sweep: the watchdog decides what to do with the result
    /// (typically a `Timeout` transition via [`Self::update_status`]).
    pub fn find_stuck(&self, timeout: chrono::Duration) -> Vec<StreamingSession> {
        let cutoff = Utc::now() - timeout;
        let entries: Vec<_> = self.streams.read().values().cloned().collect();
        entries
            .iter()
            .map(|e| e.lock().clone())
            .filter(|s| s.is_stuck(cutoff))
            .collect()
    }

    /// Snapshot of all `InProgress` streams.
    pub fn active_streams(&self) -> Vec<StreamingSession> {
        let entries: Vec<_> = self.streams.read().values().cloned().collect();
        entries
            .iter()
            .map(|e| e.lock().clone())
            .filter(|s| s.status == StreamingStatus::InProgress)
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
