//! `GET/WS /v1/realtime/transcription` (`§4.1`, `§6`).
//!
//! This handler owns nothing about the session/audio/upstream logic —
//! that's all in `gateway-realtime`. It only drives the axum socket:
//! accept, parse frames into `ClientEvent`, apply the resulting
//! `Outcome`, and poll the adapter for inbound events on a fixed tick.

use crate::providers::ProviderTarget;
use crate::state::AppState;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Extension;
use chrono::Utc;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use gateway_auth::AuthContext;
use gateway_core::{KeyInfo, KeyKind};
use gateway_realtime::{
    normalize, AudioFormat, BackpressureTransition, BoxedAdapter, ClientEvent, Outcome, ProviderEvent, RealtimeConfig, RealtimeError, ServerEvent, Session, SessionId,
};
use std::ops::ControlFlow;
use std::time::Duration;
use tracing::{info, warn};

const CLOSE_NORMAL: u16 = 1000;
const CLOSE_AUTH: u16 = 4001;
const CLOSE_QUOTA: u16 = 4008;
const CLOSE_CONCURRENCY: u16 = 4013;
const CLOSE_IDLE: u16 = 4029;

#[derive(Debug, serde::Deserialize)]
pub struct RealtimeQuery {
    pub model: String,
    /// Browsers can't set `Authorization` on a WebSocket handshake, so the
    /// credential is also accepted as a query parameter here.
    pub key: Option<String>,
}

struct CloseInfo {
    code: u16,
    reason: String,
}

impl CloseInfo {
    fn normal() -> Self {
        Self { code: CLOSE_NORMAL, reason: String::new() }
    }

    /// Only four close codes are reserved (`§6`); everything else closes
    /// 1000 since the structured `error {code, message}` already reached
    /// the client as a regular message before the socket closes.
    fn for_error(err: &RealtimeError) -> Self {
        let code = match err {
            RealtimeError::TooManySessions => CLOSE_CONCURRENCY,
            RealtimeError::IdleTimeout | RealtimeError::SessionExpired => CLOSE_IDLE,
            _ => CLOSE_NORMAL,
        };
        Self { code, reason: err.code().to_string() }
    }
}

pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<RealtimeQuery>,
    auth: Option<Extension<AuthContext>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state, query, auth.map(|Extension(ctx)| ctx)))
}

fn resolve_key(state: &AppState, auth_ctx: Option<AuthContext>, query_key: Option<&str>) -> Option<KeyInfo> {
    if let Some(ctx) = auth_ctx {
        if ctx.key.is_some() {
            return ctx.key;
        }
    }
    query_key.and_then(|credential| state.auth.keys.resolve(credential))
}

async fn run_session(socket: WebSocket, state: AppState, query: RealtimeQuery, auth_ctx: Option<AuthContext>) {
    let (mut sender, mut receiver) = socket.split();

    let Some(key) = resolve_key(&state, auth_ctx, query.key.as_deref()) else {
        close(&mut sender, CloseInfo { code: CLOSE_AUTH, reason: "authentication_error".to_string() }).await;
        return;
    };
    if !key.enabled {
        close(&mut sender, CloseInfo { code: CLOSE_AUTH, reason: "authentication_error".to_string() }).await;
        return;
    }

    let now = Utc::now();
    if let Err(err) = state.quota.check_and_record_request(&key, now) {
        warn!(key_id = %key.id, "realtime session rejected: quota exceeded");
        let _ = send_event(&mut sender, &ServerEvent::error(err.code(), err.to_string())).await;
        close(&mut sender, CloseInfo { code: CLOSE_QUOTA, reason: "quota_exceeded".to_string() }).await;
        return;
    }

    let session_id = SessionId::new();
    if !state.sessions.try_admit(session_id, &key.id) {
        let err = RealtimeError::TooManySessions;
        let _ = send_event(&mut sender, &ServerEvent::error(err.code(), err.to_string())).await;
        close(&mut sender, CloseInfo::for_error(&err)).await;
        return;
    }

    let target = ProviderTarget::from_model(&query.model);
    let client_supplied = matches!(key.kind, KeyKind::Client).then(|| key.id.as_str());
    let credential = match state.providers.credential_for(target, client_supplied) {
        Ok(credential) => credential,
        Err(err) => {
            state.sessions.remove(session_id);
            let _ = send_event(&mut sender, &ServerEvent::error(err.code(), err.to_string())).await;
            close(&mut sender, CloseInfo { code: CLOSE_AUTH, reason: "authentication_error".to_string() }).await;
            return;
        }
    };

    let adapter: BoxedAdapter = match connect_adapter(target, &credential, &query.model).await {
        Ok(adapter) => adapter,
        Err(err) => {
            state.sessions.remove(session_id);
            let _ = send_event(&mut sender, &ServerEvent::error(err.code(), err.to_string())).await;
            close(&mut sender, CloseInfo::for_error(&err)).await;
            return;
        }
    };

    let format = AudioFormat::new(match target {
        ProviderTarget::OpenAI => 24_000,
        ProviderTarget::Gemini => 16_000,
    });
    let config = RealtimeConfig::builder(query.model.clone(), target.name()).build();
    let mut session = Session::new(session_id, config, format, now);

    if send_event(&mut sender, &session.created_event()).await.is_err() {
        let _ = adapter.close().await;
        state.sessions.remove(session_id);
        return;
    }

    let close_info = drive_session(&mut sender, &mut receiver, &mut session, &adapter).await;

    let _ = adapter.close().await;
    state.sessions.remove(session_id);
    info!(
        session_id = %session_id,
        key_id = %key.id,
        model = %query.model,
        provider = target.name(),
        close_code = close_info.code,
        "realtime session closed"
    );
    close(&mut sender, close_info).await;
}

async fn connect_adapter(target: ProviderTarget, credential: &str, model: &str) -> gateway_realtime::Result<BoxedAdapter> {
    match target {
        #[cfg(feature = "openai")]
        ProviderTarget::OpenAI => {
            let adapter = gateway_realtime::openai::OpenAIAdapter::connect(credential, model, None).await?;
            Ok(Box::new(adapter))
        }
        #[cfg(feature = "gemini")]
        ProviderTarget::Gemini => {
            let adapter = gateway_realtime::gemini::GeminiAdapter::connect(credential, model, None).await?;
            Ok(Box::new(adapter))
        }
        #[allow(unreachable_patterns)]
        _ => Err(RealtimeError::Upstream { provider: target.name().to_string(), message: "provider not enabled in this build".to_string() }),
    }
}

/// Runs the session to completion: client frames in, adapter events out,
/// idle/lifetime checks on a fixed tick. Returns the close code/reason to
/// report to the client.
async fn drive_session(
    sender: &mut SplitSink<WebSocket, Message>,
    receiver: &mut futures::stream::SplitStream<WebSocket>,
    session: &mut Session,
    adapter: &BoxedAdapter,
) -> CloseInfo {
    let mut tick = tokio::time::interval(Duration::from_millis(100));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        // While paused (`§3` "pause flag implies transport read side is
        // paused"), stop polling the client socket entirely so a client
        // that ignores backpressure can't keep growing the buffer.
        let paused = session.buffer.is_paused();
        tokio::select! {
            message = receiver.next(), if !paused => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        let now = Utc::now();
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => {
                                let outcome = dispatch(session, event, now);
                                if let ControlFlow::Break(close_info) = apply_outcome(sender, adapter, session, outcome).await {
                                    return close_info;
                                }
                            }
                            Err(_) => {
                                let _ = send_event(sender, &ServerEvent::error("bad_json", "malformed client message")).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return CloseInfo::normal(),
                    Some(Ok(_)) => {}
                    Some(Err(_)) => return CloseInfo::normal(),
                }
            }
            _ = tick.tick() => {
                let now = Utc::now();
                if let Err(err) = session.check_idle(now) {
                    let _ = send_event(sender, &ServerEvent::error(err.code(), err.to_string())).await;
                    return CloseInfo::for_error(&err);
                }
                if let Err(err) = session.check_lifetime(now) {
                    let _ = send_event(sender, &ServerEvent::error(err.code(), err.to_string())).await;
                    return CloseInfo::for_error(&err);
                }
                if let ControlFlow::Break(close_info) = drain_buffered_audio(sender, adapter, session).await {
                    return close_info;
                }
                let fallback = session.check_vad_fallback(now);
                if let ControlFlow::Break(close_info) = apply_outcome(sender, adapter, session, fallback).await {
                    return close_info;
                }
                if let ControlFlow::Break(close_info) = drain_adapter_events(sender, adapter, session, now).await {
                    return close_info;
                }
            }
        }
    }
}

/// Retries frames the adapter previously rejected (`§4.1` "Buffer and
/// backpressure"): pull from the front of the session's buffer and
/// resubmit, one per tick, stopping at the first one the adapter still
/// can't take. `dequeue`'s `Resumed` transition is what lets
/// `drive_session`'s `if !paused` guard start polling the client socket
/// again.
async fn drain_buffered_audio(sender: &mut SplitSink<WebSocket, Message>, adapter: &BoxedAdapter, session: &mut Session) -> ControlFlow<CloseInfo> {
    loop {
        if session.buffer.is_empty() {
            return ControlFlow::Continue(());
        }
        let (chunk, transition) = session.buffer.dequeue();
        let Some(chunk) = chunk else { return ControlFlow::Continue(()) };
        match adapter.append_audio_base64(&chunk.bytes).await {
            Ok(true) => {
                if transition == BackpressureTransition::Resumed {
                    let _ = send_event(sender, &ServerEvent::warning("backpressure_resumed")).await;
                }
            }
            Ok(false) => {
                session.buffer.requeue_front(chunk);
                return ControlFlow::Continue(());
            }
            Err(err) => return handle_upstream_error(sender, adapter, session, err).await,
        }
    }
}

fn dispatch(session: &mut Session, event: ClientEvent, now: chrono::DateTime<Utc>) -> Outcome {
    match event {
        ClientEvent::SessionUpdate { data } => session.handle_session_update(data, now),
        ClientEvent::InputAudioAppend { audio } => session.handle_audio_append(audio, now),
        ClientEvent::InputAudioActivityStart => session.handle_activity_start(now),
        ClientEvent::InputAudioActivityEnd => session.handle_activity_end(now),
        ClientEvent::InputAudioCommit => session.handle_commit(now),
        ClientEvent::InputAudioClear => session.handle_clear(now),
    }
}

async fn apply_outcome(
    sender: &mut SplitSink<WebSocket, Message>,
    adapter: &BoxedAdapter,
    session: &mut Session,
    outcome: Outcome,
) -> ControlFlow<CloseInfo> {
    for event in &outcome.emit {
        if send_event(sender, event).await.is_err() {
            return ControlFlow::Break(CloseInfo::normal());
        }
    }

    if let Some(audio) = outcome.forward_audio {
        match adapter.append_audio_base64(&audio).await {
            Ok(true) => {}
            Ok(false) => {
                if let Some(warning) = session.note_backpressure(audio) {
                    let _ = send_event(sender, &warning).await;
                }
            }
            Err(err) => {
                if let ControlFlow::Break(close_info) = handle_upstream_error(sender, adapter, session, err).await {
                    return ControlFlow::Break(close_info);
                }
            }
        }
    }

    if outcome.commit_upstream {
        if let Err(err) = adapter.commit_audio().await {
            if let ControlFlow::Break(close_info) = handle_upstream_error(sender, adapter, session, err).await {
                return ControlFlow::Break(close_info);
            }
        }
    }

    if outcome.clear_upstream {
        let _ = adapter.clear_audio().await;
    }

    if let Some(err) = outcome.terminate {
        return ControlFlow::Break(CloseInfo::for_error(&err));
    }

    ControlFlow::Continue(())
}

async fn drain_adapter_events(
    sender: &mut SplitSink<WebSocket, Message>,
    adapter: &BoxedAdapter,
    session: &mut Session,
    now: chrono::DateTime<Utc>,
) -> ControlFlow<CloseInfo> {
    loop {
        match adapter.poll_event().await {
            Ok(Some(event)) => {
                let vad_outcome = match &event {
                    ProviderEvent::SpeechStopped => Some(session.note_upstream_speech_stopped(now)),
                    ProviderEvent::ModelDelta { .. } | ProviderEvent::ModelDone { .. } | ProviderEvent::TranscriptDone { .. } => {
                        session.note_upstream_model_progress();
                        None
                    }
                    _ => None,
                };

                for server_event in normalize(event, session.config.include) {
                    if send_event(sender, &server_event).await.is_err() {
                        return ControlFlow::Break(CloseInfo::normal());
                    }
                }

                if let Some(outcome) = vad_outcome {
                    if let ControlFlow::Break(close_info) = apply_outcome(sender, adapter, session, outcome).await {
                        return ControlFlow::Break(close_info);
                    }
                }
            }
            Ok(None) => return ControlFlow::Continue(()),
            Err(err) => return handle_upstream_error(sender, adapter, session, err).await,
        }
    }
}

/// Common upstream-I/O-error handling: surface the error to the client,
/// then — per `§4.1`'s one-reconnect-within-budget rule — try exactly
/// once per session to reconnect before giving up on it. Buffered,
/// uncommitted audio survives the reconnect since it lives in
/// `session.buffer`, never in the adapter.
async fn handle_upstream_error(
    sender: &mut SplitSink<WebSocket, Message>,
    adapter: &BoxedAdapter,
    session: &mut Session,
    err: RealtimeError,
) -> ControlFlow<CloseInfo> {
    let _ = send_event(sender, &ServerEvent::error(err.code(), err.to_string())).await;
    if session.should_attempt_reconnect() && adapter.reconnect().await.is_ok() {
        let _ = send_event(sender, &ServerEvent::warning("upstream_reconnected")).await;
        return ControlFlow::Continue(());
    }
    ControlFlow::Break(CloseInfo::for_error(&err))
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &ServerEvent) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).expect("ServerEvent always serializes");
    sender.send(Message::Text(text.into())).await
}

async fn close(sender: &mut SplitSink<WebSocket, Message>, info: CloseInfo) {
    let frame = CloseFrame { code: info.code, reason: info.reason.into() };
    let _ = sender.send(Message::Close(Some(frame))).await;
}
