#![cfg(feature = "openai")]
//! OpenAI wire translation, behind [`tokio_tungstenite`].

use crate::adapter::UpstreamAdapter;
use crate::error::{RealtimeError, Result};
use crate::normalizer::ProviderEvent;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Sink = futures::stream::SplitSink<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>, WsMessage>;
type EventRx = mpsc::UnboundedReceiver<Result<ProviderEvent>>;

/// `§4.1` "Failure semantics": at most one reconnect attempt, bounded.
const RECONNECT_BUDGET: Duration = Duration::from_secs(2);

/// Talks to OpenAI's realtime WebSocket API. Wire-level field names
/// follow OpenAI's own event schema; that schema is an external contract
/// this adapter translates at the boundary, not something the rest of
/// the gateway ever sees directly.
pub struct OpenAIAdapter {
    write: Mutex<Sink>,
    events: Mutex<EventRx>,
    api_key: String,
    model: String,
    base_url: Option<String>,
}

impl OpenAIAdapter {
    pub async fn connect(api_key: &str, model: &str, base_url: Option<&str>) -> Result<Self> {
        let (write, events) = dial(api_key, model, base_url).await?;
        Ok(Self {
            write: Mutex::new(write),
            events: Mutex::new(events),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.map(str::to_string),
        })
    }

    async fn send_json(&self, value: Value) -> Result<()> {
        let text = value.to_string();
        let mut write = self.write.lock().await;
        write
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| RealtimeError::Upstream { provider: "openai".to_string(), message: e.to_string() })
    }
}

#[async_trait]
impl UpstreamAdapter for OpenAIAdapter {
    async fn append_audio_base64(&self, audio: &[u8]) -> Result<bool> {
        let encoded = STANDARD.encode(audio);
        self.send_json(json!({ "type": "input_audio_buffer.append", "audio": encoded })).await?;
        Ok(true)
    }

    async fn commit_audio(&self) -> Result<()> {
        self.send_json(json!({ "type": "input_audio_buffer.commit" })).await
    }

    async fn clear_audio(&self) -> Result<()> {
        self.send_json(json!({ "type": "input_audio_buffer.clear" })).await
    }

    async fn poll_event(&self) -> Result<Option<ProviderEvent>> {
        let mut rx = self.events.lock().await;
        match rx.try_recv() {
            Ok(event) => event.map(Some),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(RealtimeError::UpstreamClosed),
        }
    }

    async fn reconnect(&self) -> Result<()> {
        let (write, events) = tokio::time::timeout(RECONNECT_BUDGET, dial(&self.api_key, &self.model, self.base_url.as_deref()))
            .await
            .map_err(|_| RealtimeError::Upstream { provider: "openai".to_string(), message: "reconnect timed out".to_string() })??;
        *self.write.lock().await = write;
        *self.events.lock().await = events;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut write = self.write.lock().await;
        write.close().await.ok();
        Ok(())
    }
}

/// Open a fresh connection and spawn its reader task. Shared by
/// [`OpenAIAdapter::connect`] (first connect) and `reconnect` (same
/// dial, new socket) — any buffered, uncommitted audio lives in the
/// session's [`crate::audio::SmartAudioBuffer`], not in the adapter, so
/// swapping the socket underneath it loses nothing already enqueued.
async fn dial(api_key: &str, model: &str, base_url: Option<&str>) -> Result<(Sink, EventRx)> {
    let base = base_url.unwrap_or(super::OPENAI_REALTIME_URL);
    let url = format!("{base}?model={model}");

    let mut request = url
        .into_client_request()
        .map_err(|e| RealtimeError::Upstream { provider: "openai".to_string(), message: e.to_string() })?;
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {api_key}")
            .parse()
            .map_err(|_| RealtimeError::Upstream { provider: "openai".to_string(), message: "invalid api key".to_string() })?,
    );
    request
        .headers_mut()
        .insert("OpenAI-Beta", "realtime=v1".parse().expect("static header value"));

    let (stream, _) = connect_async(request)
        .await
        .map_err(|e| RealtimeError::Upstream { provider: "openai".to_string(), message: e.to_string() })?;
    let (write, mut read) = stream.split();

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(message) = read.next().await {
            let parsed = match message {
                Ok(WsMessage::Text(text)) => parse_openai_event(&text),
                Ok(WsMessage::Close(_)) => Err(RealtimeError::UpstreamClosed),
                Ok(_) => continue,
                Err(_) => Err(RealtimeError::UpstreamClosed),
            };
            if tx.send(parsed).is_err() {
                break;
            }
        }
    });

    Ok((write, rx))
}

fn parse_openai_event(text: &str) -> Result<ProviderEvent> {
    let value: Value = serde_json::from_str(text).map_err(|_| RealtimeError::BadJson)?;
    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "conversation.item.input_audio_transcription.delta" => Ok(ProviderEvent::TranscriptDelta {
            text: value.get("delta").and_then(Value::as_str).unwrap_or_default().to_string(),
        }),
        "conversation.item.input_audio_transcription.completed" => Ok(ProviderEvent::TranscriptDone {
            text: value.get("transcript").and_then(Value::as_str).unwrap_or_default().to_string(),
        }),
        "response.audio_transcript.delta" => Ok(ProviderEvent::ModelDelta {
            text: value.get("delta").and_then(Value::as_str).unwrap_or_default().to_string(),
        }),
        "response.audio_transcript.done" => Ok(ProviderEvent::ModelDone {
            text: value.get("transcript").and_then(Value::as_str).unwrap_or_default().to_string(),
        }),
        "input_audio_buffer.speech_started" => Ok(ProviderEvent::SpeechStarted),
        "input_audio_buffer.speech_stopped" => Ok(ProviderEvent::SpeechStopped),
        "error" => Ok(ProviderEvent::Error {
            code: value.pointer("/error/code").and_then(Value::as_str).unwrap_or("upstream_error").to_string(),
            message: value.pointer("/error/message").and_then(Value::as_str).unwrap_or_default().to_string(),
        }),
        _ => Ok(ProviderEvent::Other(value)),
    }
}
