//! WebSocket frame dispatch.
//!
//! Parses incoming text as an [`InboundFrame`] and routes recognized types
//! (`JOIN_SESSION`, `CREATE_BRANCH`, `CHARACTER_MESSAGE`, `CONFIGURE_TTS`)
//! to the engine. Unrecognized types take the legacy room-chat relay path.
//! Errors become `ERROR` envelopes sent back to the sender; the connection
//! always stays open.

use std::sync::Arc;

use metrics::counter;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use parley_core::errors::MESSAGE_PROCESSING_ERROR;
use parley_core::{
    BranchId, BranchKind, BranchStatus, EngineError, Participant, ParticipantId, ParticipantKind,
    ParticipantRole, SessionId, TtsProvider, UtteranceKind,
};
use parley_engine::{Engine, NewRoutingConfig, UtteranceHints};

use crate::config::ServerConfig;
use crate::metrics::{FRAME_ERRORS_TOTAL, FRAMES_TOTAL};
use crate::protocol::{
    self, Envelope, InboundFrame, OutboundEvent, speaker_display_name,
};

use super::broadcast::BroadcastRouter;
use super::connection::ClientConnection;
use super::registry::ConnectionRegistry;

/// Everything the dispatcher needs to serve one frame.
pub struct DispatchContext {
    /// The engine (directory, branch tree, TTS router).
    pub engine: Arc<Engine>,
    /// Live connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Broadcast fan-out.
    pub router: Arc<BroadcastRouter>,
    /// Server configuration (legacy fallback flag).
    pub config: Arc<ServerConfig>,
}

/// Handle one inbound text frame.
///
/// Returns the envelope to send back to the sender, or `None` when the
/// frame took the legacy relay path (which has no per-frame reply).
#[instrument(skip_all, fields(conn_id = %conn.id, frame_type))]
pub async fn dispatch(text: &str, conn: &Arc<ClientConnection>, ctx: &DispatchContext) -> Option<Envelope> {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            counter!(FRAME_ERRORS_TOTAL).increment(1);
            warn!(error = %e, "malformed frame");
            return Some(Envelope::error(
                MESSAGE_PROCESSING_ERROR,
                format!("malformed frame: {e}"),
            ));
        }
    };
    let span = tracing::Span::current();
    let _ = span.record("frame_type", frame.frame_type.as_str());
    counter!(FRAMES_TOTAL, "type" => frame.frame_type.clone()).increment(1);

    let result = match frame.frame_type.as_str() {
        protocol::JOIN_SESSION => handle_join(&frame.data, conn, ctx).await,
        protocol::CREATE_BRANCH => handle_create_branch(&frame.data, ctx).await,
        protocol::CHARACTER_MESSAGE => handle_character_message(&frame.data, ctx).await,
        protocol::CONFIGURE_TTS => handle_configure_tts(&frame.data, ctx).await,
        other => {
            debug!(frame_type = other, room = %conn.room, "legacy chat relay");
            ctx.router.relay_room(&conn.room, text, &conn.id);
            return None;
        }
    };

    Some(match result {
        Ok(data) => data,
        Err(envelope) => {
            counter!(FRAME_ERRORS_TOTAL).increment(1);
            envelope
        }
    })
}

/// Required string field, or a `MESSAGE_PROCESSING_ERROR` envelope naming it.
fn required_str<'a>(data: &'a Value, field: &str) -> Result<&'a str, Envelope> {
    data.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Envelope::error(
                MESSAGE_PROCESSING_ERROR,
                format!("missing required field: {field}"),
            )
        })
}

fn optional_str(data: &Value, field: &str) -> Option<String> {
    data.get(field)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

fn engine_error(err: &EngineError) -> Envelope {
    Envelope::error(err.code(), err.to_string())
}

// ── JOIN_SESSION ────────────────────────────────────────────────────

async fn handle_join(
    data: &Value,
    conn: &Arc<ClientConnection>,
    ctx: &DispatchContext,
) -> Result<Envelope, Envelope> {
    let session_id = SessionId::from(required_str(data, "sessionId")?);
    let participant_id = ParticipantId::from(required_str(data, "participantId")?);

    let display_name = optional_str(data, "participantName")
        .unwrap_or_else(|| speaker_display_name(participant_id.as_str()));
    let kind = optional_str(data, "participantType")
        .and_then(|t| serde_json::from_value::<ParticipantKind>(Value::String(t)).ok())
        .unwrap_or(ParticipantKind::Human);
    let role = optional_str(data, "role")
        .and_then(|r| serde_json::from_value::<ParticipantRole>(Value::String(r)).ok())
        .unwrap_or(ParticipantRole::Participant);

    let _ = ctx.engine.directory.create_or_get(&session_id).await;
    let main = ctx
        .engine
        .branches
        .ensure_main(&session_id, &participant_id)
        .await
        .map_err(|e| engine_error(&e))?;

    let participant = Participant::new(participant_id.clone(), display_name, kind, role);
    let session = ctx
        .engine
        .directory
        .join(&session_id, participant.clone())
        .await
        .map_err(|e| engine_error(&e))?;

    conn.bind(participant_id.clone(), session_id.clone());
    ctx.registry.register(&participant_id, &conn.id);
    ctx.registry.join(&session_id, &participant_id);

    let event = OutboundEvent::new(
        protocol::PARTICIPANT_JOINED,
        json!({
            "sessionId": session_id,
            "participantId": participant_id,
            "participantName": participant.display_name,
            "participantType": participant.kind,
            "joinedAt": participant.joined_at,
            "isActive": participant.active,
            "participantCount": session.participant_count,
        }),
    );
    ctx.router.broadcast(&session_id, &event, Some(&participant_id));

    Ok(Envelope::success(
        "joined session",
        json!({
            "sessionId": session_id,
            "participantId": participant_id,
            "mainBranchId": main.id,
            "participantCount": session.participant_count,
            "maxParticipants": session.max_participants,
        }),
    ))
}

// ── CREATE_BRANCH ───────────────────────────────────────────────────

async fn handle_create_branch(data: &Value, ctx: &DispatchContext) -> Result<Envelope, Envelope> {
    let session_id = SessionId::from(required_str(data, "sessionId")?);
    let name = required_str(data, "branchName")?.to_owned();
    let created_by = ParticipantId::from(required_str(data, "createdBy")?);

    let kind = optional_str(data, "branchType")
        .and_then(|t| serde_json::from_value::<BranchKind>(Value::String(t)).ok())
        .unwrap_or(BranchKind::UserCreated);
    let parent_id = optional_str(data, "parentBranchId").map(BranchId::from);
    let description = optional_str(data, "description");

    let branch = ctx
        .engine
        .branches
        .create_branch(&session_id, name, description, kind, parent_id, created_by.clone())
        .await
        .map_err(|e| engine_error(&e))?;

    let event = OutboundEvent::new(
        protocol::BRANCH_CREATED,
        json!({
            "sessionId": session_id,
            "branchId": branch.id,
            "branchName": branch.name,
            "description": branch.description,
            "branchType": branch.kind,
            "parentBranchId": branch.parent_id,
            "sequenceOrder": branch.sequence_order,
            "createdBy": created_by,
            "createdAt": branch.created_at,
            "isActive": branch.status == BranchStatus::Active,
        }),
    );
    ctx.router.broadcast(&session_id, &event, None);

    Ok(Envelope::success(
        "branch created",
        json!({
            "branchId": branch.id,
            "branchName": branch.name,
            "sequenceOrder": branch.sequence_order,
        }),
    ))
}

// ── CHARACTER_MESSAGE ───────────────────────────────────────────────

async fn handle_character_message(
    data: &Value,
    ctx: &DispatchContext,
) -> Result<Envelope, Envelope> {
    let speaker = data.get("speakerId").and_then(Value::as_str).unwrap_or("");
    if speaker.is_empty() {
        return Err(Envelope::error(
            protocol::INVALID_SPEAKER,
            "speakerId is required",
        ));
    }
    let content = data.get("content").and_then(Value::as_str).unwrap_or("");
    if content.is_empty() {
        return Err(Envelope::error(
            protocol::INVALID_MESSAGE,
            "content is required",
        ));
    }
    let speaker_id = ParticipantId::from(speaker);

    let (session_id, branch_id) = resolve_message_target(data, ctx).await?;

    let hints = UtteranceHints {
        emotion: optional_str(data, "emotion"),
        animation: optional_str(data, "animation"),
    };
    let utterance = ctx
        .engine
        .branches
        .add_utterance(
            &branch_id,
            speaker_id.clone(),
            content,
            UtteranceKind::CharacterSpeech,
            hints,
        )
        .await
        .map_err(|e| engine_error(&e))?;

    let event = OutboundEvent::new(
        protocol::CHARACTER_MESSAGE,
        json!({
            "sessionId": session_id,
            "branchId": branch_id,
            "utteranceId": utterance.id,
            "speakerId": speaker_id,
            "speakerName": speaker_display_name(speaker_id.as_str()),
            "content": utterance.content,
            "utteranceType": utterance.kind,
            "emotion": utterance.emotion,
            "animation": utterance.animation,
            "sequenceNumber": utterance.sequence_number,
            "timestamp": utterance.created_at,
        }),
    );
    ctx.router.broadcast(&session_id, &event, Some(&speaker_id));

    Ok(Envelope::success(
        "message delivered",
        json!({
            "utteranceId": utterance.id,
            "sequenceNumber": utterance.sequence_number,
        }),
    ))
}

/// Resolve the `(session, branch)` a character message targets.
///
/// Missing IDs are rejected unless `legacy_fallback_ids` is enabled, in
/// which case `default_session` and its main branch are substituted and
/// the substitution is logged.
async fn resolve_message_target(
    data: &Value,
    ctx: &DispatchContext,
) -> Result<(SessionId, BranchId), Envelope> {
    let session_id = match data.get("sessionId").and_then(Value::as_str) {
        Some(s) if !s.is_empty() => SessionId::from(s),
        _ if ctx.config.legacy_fallback_ids => {
            warn!(fallback = protocol::DEFAULT_SESSION_ID, "sessionId missing, using legacy fallback");
            let sid = SessionId::from(protocol::DEFAULT_SESSION_ID);
            let _ = ctx.engine.directory.create_or_get(&sid).await;
            sid
        }
        _ => {
            return Err(Envelope::error(
                MESSAGE_PROCESSING_ERROR,
                "missing required field: sessionId",
            ));
        }
    };

    let branch_id = match data.get("branchId").and_then(Value::as_str) {
        Some(b) if !b.is_empty() => BranchId::from(b),
        _ if ctx.config.legacy_fallback_ids => {
            warn!(session_id = %session_id, "branchId missing, using main branch fallback");
            let system = ParticipantId::from("system");
            ctx.engine
                .branches
                .ensure_main(&session_id, &system)
                .await
                .map_err(|e| engine_error(&e))?
                .id
        }
        _ => {
            return Err(Envelope::error(
                MESSAGE_PROCESSING_ERROR,
                "missing required field: branchId",
            ));
        }
    };

    Ok((session_id, branch_id))
}

// ── CONFIGURE_TTS ───────────────────────────────────────────────────

async fn handle_configure_tts(data: &Value, ctx: &DispatchContext) -> Result<Envelope, Envelope> {
    let session_id = SessionId::from(required_str(data, "sessionId")?);
    let participant_id = ParticipantId::from(required_str(data, "participantId")?);
    let provider_name = required_str(data, "provider")?;

    let provider: TtsProvider =
        serde_json::from_value(Value::String(provider_name.to_owned())).map_err(|_| {
            Envelope::error(
                parley_core::errors::UNSUPPORTED_PROVIDER,
                format!("unsupported TTS provider: {provider_name}"),
            )
        })?;

    let config = ctx
        .engine
        .tts
        .create_config(NewRoutingConfig {
            session_id,
            participant_id,
            provider,
            voice_id: optional_str(data, "voiceId"),
            language: optional_str(data, "language"),
            streaming_endpoint: optional_str(data, "streamingEndpoint"),
        })
        .await
        .map_err(|e| engine_error(&e))?;

    Ok(Envelope::success(
        "TTS configured",
        json!({
            "routingId": config.id,
            "provider": config.provider,
            "voiceId": config.voice_id,
            "language": config.language,
            "audioFormat": config.audio_format,
            "sampleRate": config.sample_rate,
        }),
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::ConnectionId;
    use parley_store::MemoryArchive;
    use tokio::sync::mpsc;

    use crate::protocol::ResponseStatus;

    fn make_ctx(legacy_fallback: bool) -> DispatchContext {
        let engine = Arc::new(Engine::new(Arc::new(MemoryArchive::new())));
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Arc::new(BroadcastRouter::new(Arc::clone(&registry)));
        let config = Arc::new(ServerConfig {
            legacy_fallback_ids: legacy_fallback,
            ..ServerConfig::default()
        });
        DispatchContext {
            engine,
            registry,
            router,
            config,
        }
    }

    fn make_conn(id: &str, room: &str) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(64);
        let conn = Arc::new(ClientConnection::new(ConnectionId::from(id), room, tx));
        (conn, rx)
    }

    async fn join(
        ctx: &DispatchContext,
        conn: &Arc<ClientConnection>,
        session: &str,
        participant: &str,
    ) -> Envelope {
        let frame = json!({
            "type": "JOIN_SESSION",
            "data": {"sessionId": session, "participantId": participant},
        });
        ctx.registry.add_connection(Arc::clone(conn));
        dispatch(&frame.to_string(), conn, ctx).await.unwrap()
    }

    #[tokio::test]
    async fn malformed_frame_gets_error_envelope() {
        let ctx = make_ctx(false);
        let (conn, _rx) = make_conn("c1", "default");
        let env = dispatch("not json", &conn, &ctx).await.unwrap();
        assert_eq!(env.status, ResponseStatus::Error);
        assert_eq!(env.data.unwrap()["code"], MESSAGE_PROCESSING_ERROR);
    }

    #[tokio::test]
    async fn join_session_creates_session_and_binds() {
        let ctx = make_ctx(false);
        let (conn, _rx) = make_conn("c1", "default");
        let env = join(&ctx, &conn, "room-1", "p1").await;

        assert_eq!(env.status, ResponseStatus::Success);
        let data = env.data.unwrap();
        assert_eq!(data["sessionId"], "room-1");
        assert!(data["mainBranchId"].is_string());
        assert_eq!(data["participantCount"], 1);

        assert_eq!(conn.participant_id().unwrap().as_str(), "p1");
        assert!(ctx.registry.is_registered(&ParticipantId::from("p1")));
        let members = ctx.registry.members(&SessionId::from("room-1"));
        assert_eq!(members.len(), 1);
    }

    #[tokio::test]
    async fn join_broadcasts_to_existing_members_only() {
        let ctx = make_ctx(false);
        let (c1, mut rx1) = make_conn("c1", "default");
        let _ = join(&ctx, &c1, "room-1", "p1").await;

        let (c2, mut rx2) = make_conn("c2", "default");
        let _ = join(&ctx, &c2, "room-1", "p2").await;

        // p1 sees PARTICIPANT_JOINED for p2; p2 (the joiner) does not
        let msg = rx1.try_recv().unwrap();
        let v: Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(v["type"], protocol::PARTICIPANT_JOINED);
        assert_eq!(v["data"]["participantId"], "p2");
        assert!(v["data"]["joinedAt"].is_string());
        assert_eq!(v["data"]["isActive"], true);
        assert_eq!(v["data"]["participantCount"], 2);
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_missing_session_id_is_rejected() {
        let ctx = make_ctx(false);
        let (conn, _rx) = make_conn("c1", "default");
        let frame = json!({"type": "JOIN_SESSION", "data": {"participantId": "p1"}});
        let env = dispatch(&frame.to_string(), &conn, &ctx).await.unwrap();
        assert_eq!(env.status, ResponseStatus::Error);
        assert!(env.message.contains("sessionId"));
    }

    #[tokio::test]
    async fn join_full_session_returns_session_full() {
        let ctx = make_ctx(false);
        // capacity 1
        let host = ParticipantId::from("host");
        let session = ctx
            .engine
            .create_session("tiny", None, 1, &host)
            .await
            .unwrap();

        let (c1, _r1) = make_conn("c1", "default");
        let env = join(&ctx, &c1, session.id.as_str(), "p1").await;
        assert_eq!(env.status, ResponseStatus::Success);

        let (c2, _r2) = make_conn("c2", "default");
        let env = join(&ctx, &c2, session.id.as_str(), "p2").await;
        assert_eq!(env.status, ResponseStatus::Error);
        assert_eq!(env.data.unwrap()["code"], parley_core::errors::SESSION_FULL);
    }

    #[tokio::test]
    async fn create_branch_and_broadcast() {
        let ctx = make_ctx(false);
        let (c1, mut rx1) = make_conn("c1", "default");
        let _ = join(&ctx, &c1, "room-1", "p1").await;

        let frame = json!({
            "type": "CREATE_BRANCH",
            "data": {
                "sessionId": "room-1",
                "branchName": "Side topic",
                "branchType": "TOPIC_SPLIT",
                "createdBy": "p1",
            },
        });
        let env = dispatch(&frame.to_string(), &c1, &ctx).await.unwrap();
        assert_eq!(env.status, ResponseStatus::Success);
        let data = env.data.unwrap();
        assert_eq!(data["branchName"], "Side topic");
        assert_eq!(data["sequenceOrder"], 1);

        // creator also receives the BRANCH_CREATED broadcast
        let msg = rx1.try_recv().unwrap();
        let v: Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(v["type"], protocol::BRANCH_CREATED);
        assert_eq!(v["data"]["branchType"], "TOPIC_SPLIT");
        assert!(v["data"]["createdAt"].is_string());
        assert_eq!(v["data"]["isActive"], true);
        assert!(v["data"].as_object().unwrap().contains_key("description"));
    }

    #[tokio::test]
    async fn create_branch_unknown_session_fails() {
        let ctx = make_ctx(false);
        let (conn, _rx) = make_conn("c1", "default");
        let frame = json!({
            "type": "CREATE_BRANCH",
            "data": {"sessionId": "ghost", "branchName": "x", "createdBy": "p1"},
        });
        let env = dispatch(&frame.to_string(), &conn, &ctx).await.unwrap();
        assert_eq!(env.status, ResponseStatus::Error);
        assert_eq!(
            env.data.unwrap()["code"],
            parley_core::errors::SESSION_NOT_FOUND
        );
    }

    #[tokio::test]
    async fn character_message_appends_and_broadcasts() {
        let ctx = make_ctx(false);
        let (c1, mut rx1) = make_conn("c1", "default");
        let (c2, mut rx2) = make_conn("c2", "default");
        let env = join(&ctx, &c1, "room-1", "ai1").await;
        let main_branch = env.data.unwrap()["mainBranchId"]
            .as_str()
            .unwrap()
            .to_owned();
        let _ = join(&ctx, &c2, "room-1", "p2").await;
        let _ = rx1.try_recv(); // drain p2's join event

        let frame = json!({
            "type": "CHARACTER_MESSAGE",
            "data": {
                "sessionId": "room-1",
                "branchId": main_branch,
                "speakerId": "ai1",
                "content": "hello there",
                "emotion": "happy",
            },
        });
        let env = dispatch(&frame.to_string(), &c1, &ctx).await.unwrap();
        assert_eq!(env.status, ResponseStatus::Success);
        assert_eq!(env.data.unwrap()["sequenceNumber"], 1);

        // sender excluded, other member receives with speaker name mapping
        assert!(rx1.try_recv().is_err());
        let msg = rx2.try_recv().unwrap();
        let v: Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(v["type"], protocol::CHARACTER_MESSAGE);
        assert_eq!(v["data"]["speakerName"], "Mia");
        assert_eq!(v["data"]["content"], "hello there");
        assert_eq!(v["data"]["emotion"], "happy");
        assert_eq!(v["data"]["sequenceNumber"], 1);
        assert_eq!(v["data"]["utteranceType"], "CHARACTER_SPEECH");
        assert!(v["data"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn character_message_requires_speaker_and_content() {
        let ctx = make_ctx(false);
        let (conn, _rx) = make_conn("c1", "default");

        let frame = json!({
            "type": "CHARACTER_MESSAGE",
            "data": {"sessionId": "s", "branchId": "b", "content": "hi"},
        });
        let env = dispatch(&frame.to_string(), &conn, &ctx).await.unwrap();
        assert_eq!(env.data.unwrap()["code"], protocol::INVALID_SPEAKER);

        let frame = json!({
            "type": "CHARACTER_MESSAGE",
            "data": {"sessionId": "s", "branchId": "b", "speakerId": "p1", "content": ""},
        });
        let env = dispatch(&frame.to_string(), &conn, &ctx).await.unwrap();
        assert_eq!(env.data.unwrap()["code"], protocol::INVALID_MESSAGE);
    }

    #[tokio::test]
    async fn missing_ids_rejected_without_legacy_fallback() {
        let ctx = make_ctx(false);
        let (conn, _rx) = make_conn("c1", "default");
        let frame = json!({
            "type": "CHARACTER_MESSAGE",
            "data": {"speakerId": "p1", "content": "hi"},
        });
        let env = dispatch(&frame.to_string(), &conn, &ctx).await.unwrap();
        assert_eq!(env.status, ResponseStatus::Error);
        assert!(env.message.contains("sessionId"));
    }

    #[tokio::test]
    async fn missing_ids_substituted_with_legacy_fallback() {
        let ctx = make_ctx(true);
        let (conn, _rx) = make_conn("c1", "default");
        let frame = json!({
            "type": "CHARACTER_MESSAGE",
            "data": {"speakerId": "p1", "content": "hi"},
        });
        let env = dispatch(&frame.to_string(), &conn, &ctx).await.unwrap();
        assert_eq!(env.status, ResponseStatus::Success);

        // the fallback session and its main branch now exist
        let sid = SessionId::from(protocol::DEFAULT_SESSION_ID);
        assert!(ctx.engine.directory.contains(&sid));
        let branches = ctx.engine.branches.session_branches(&sid);
        assert_eq!(branches.len(), 1);
        let utterances = ctx.engine.branches.utterances(&branches[0].id).unwrap();
        assert_eq!(utterances.len(), 1);
        assert_eq!(utterances[0].content, "hi");
    }

    #[tokio::test]
    async fn configure_tts_success_and_validation() {
        let ctx = make_ctx(false);
        let (conn, _rx) = make_conn("c1", "default");
        let _ = join(&ctx, &conn, "room-1", "ai1").await;

        let frame = json!({
            "type": "CONFIGURE_TTS",
            "data": {
                "sessionId": "room-1",
                "participantId": "ai1",
                "provider": "OPEN_AI",
                "voiceId": "nova",
            },
        });
        let env = dispatch(&frame.to_string(), &conn, &ctx).await.unwrap();
        assert_eq!(env.status, ResponseStatus::Success);
        let data = env.data.unwrap();
        assert!(data["routingId"].is_string());
        assert_eq!(data["audioFormat"], "WAV");
        assert_eq!(data["sampleRate"], 44_100);

        // invalid voice rejected
        let frame = json!({
            "type": "CONFIGURE_TTS",
            "data": {
                "sessionId": "room-1",
                "participantId": "ai1",
                "provider": "OPEN_AI",
                "voiceId": "whisper",
            },
        });
        let env = dispatch(&frame.to_string(), &conn, &ctx).await.unwrap();
        assert_eq!(
            env.data.unwrap()["code"],
            parley_core::errors::VALIDATION_FAILED
        );
    }

    #[tokio::test]
    async fn configure_tts_unknown_provider() {
        let ctx = make_ctx(false);
        let (conn, _rx) = make_conn("c1", "default");
        let _ = join(&ctx, &conn, "room-1", "ai1").await;

        let frame = json!({
            "type": "CONFIGURE_TTS",
            "data": {"sessionId": "room-1", "participantId": "ai1", "provider": "SHOUTY"},
        });
        let env = dispatch(&frame.to_string(), &conn, &ctx).await.unwrap();
        assert_eq!(
            env.data.unwrap()["code"],
            parley_core::errors::UNSUPPORTED_PROVIDER
        );
    }

    #[tokio::test]
    async fn unrecognized_type_takes_legacy_relay() {
        let ctx = make_ctx(false);
        let (c1, mut rx1) = make_conn("c1", "lobby");
        let (c2, mut rx2) = make_conn("c2", "lobby");
        ctx.registry.add_connection(Arc::clone(&c1));
        ctx.registry.add_connection(Arc::clone(&c2));

        let frame = json!({"type": "CHAT", "data": {"text": "plain old chat"}});
        let reply = dispatch(&frame.to_string(), &c1, &ctx).await;
        assert!(reply.is_none(), "legacy relay has no per-frame reply");

        assert!(rx1.try_recv().is_err(), "sender excluded from relay");
        let msg = rx2.try_recv().unwrap();
        assert!(msg.contains("plain old chat"));
    }
}
