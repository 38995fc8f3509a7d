#![cfg(feature = "gemini")]
//! Gemini BidiGenerateContent wire translation.

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
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Sink = futures::stream::SplitSink<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>, WsMessage>;
type EventRx = mpsc::UnboundedReceiver<Result<ProviderEvent>>;

/// `§4.1` "Failure semantics": at most one reconnect attempt, bounded.
const RECONNECT_BUDGET: Duration = Duration::from_secs(2);

/// Talks to Gemini's Live `BidiGenerateContent` WebSocket endpoint.
pub struct GeminiAdapter {
    write: Mutex<Sink>,
    events: Mutex<EventRx>,
    api_key: String,
    model: String,
    base_url: Option<String>,
}

impl GeminiAdapter {
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
        let mut write = self.write.lock().await;
        write
            .send(WsMessage::Text(value.to_string()))
            .await
            .map_err(|e| RealtimeError::Upstream { provider: "gemini".to_string(), message: e.to_string() })
    }
}

#[async_trait]
impl UpstreamAdapter for GeminiAdapter {
    async fn append_audio_base64(&self, audio: &[u8]) -> Result<bool> {
        let encoded = STANDARD.encode(audio);
        self.send_json(json!({
            "realtimeInput": {
                "mediaChunks": [{ "mimeType": "audio/pcm;rate=16000", "data": encoded }]
            }
        }))
        .await?;
        Ok(true)
    }

    async fn commit_audio(&self) -> Result<()> {
        self.send_json(json!({ "realtimeInput": { "activityEnd": {} } })).await
    }

    async fn clear_audio(&self) -> Result<()> {
        Ok(())
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
            .map_err(|_| RealtimeError::Upstream { provider: "gemini".to_string(), message: "reconnect timed out".to_string() })??;
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

/// Open a fresh connection (including the `setup` handshake) and spawn
/// its reader task. Shared by [`GeminiAdapter::connect`] and
/// `reconnect` — buffered, uncommitted audio lives in the session's
/// [`crate::audio::SmartAudioBuffer`], not here, so it survives the
/// socket swap untouched.
async fn dial(api_key: &str, model: &str, base_url: Option<&str>) -> Result<(Sink, EventRx)> {
    let base = base_url.unwrap_or(super::GEMINI_LIVE_URL);
    let url = format!("{base}?key={api_key}");

    let (stream, _) = connect_async(url)
        .await
        .map_err(|e| RealtimeError::Upstream { provider: "gemini".to_string(), message: e.to_string() })?;
    let (mut write, mut read) = stream.split();

    let setup = json!({
        "setup": {
            "model": model,
            "generationConfig": { "responseModalities": ["TEXT"] },
            "inputAudioTranscription": {},
            "outputAudioTranscription": {},
        }
    });
    write
        .send(WsMessage::Text(setup.to_string()))
        .await
        .map_err(|e| RealtimeError::Upstream { provider: "gemini".to_string(), message: e.to_string() })?;

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(message) = read.next().await {
            let parsed = match message {
                Ok(WsMessage::Text(text)) => parse_gemini_event(&text),
                Ok(WsMessage::Close(_)) => Err(RealtimeError::UpstreamClosed),
                Ok(_) => continue,
                Err(_) => Err(RealtimeError::UpstreamClosed),
            };
            if let Some(event) = parsed.transpose() {
                if tx.send(event).is_err() {
                    break;
                }
            }
        }
    });

    Ok((write, rx))
}

/// Returns `Ok(None)` for housekeeping frames (`setupComplete`) that carry
/// no translatable content.
fn parse_gemini_event(text: &str) -> Result<Option<ProviderEvent>> {
    let value: Value = serde_json::from_str(text).map_err(|_| RealtimeError::BadJson)?;

    if value.get("setupComplete").is_some() {
        return Ok(None);
    }
    if let Some(server_content) = value.get("serverContent") {
        if let Some(text) = server_content.pointer("/inputTranscription/text").and_then(Value::as_str) {
            return Ok(Some(ProviderEvent::TranscriptDelta { text: text.to_string() }));
        }
        if let Some(text) = server_content.pointer("/outputTranscription/text").and_then(Value::as_str) {
            return Ok(Some(ProviderEvent::ModelDelta { text: text.to_string() }));
        }
        if server_content.get("turnComplete").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(Some(ProviderEvent::ModelDone { text: String::new() }));
        }
        return Ok(None);
    }
    if let Some(error) = value.get("error") {
        return Ok(Some(ProviderEvent::Error {
            code: error.get("code").and_then(Value::as_str).unwrap_or("upstream_error").to_string(),
            message: error.get("message").and_then(Value::as_str).unwrap_or_default().to_string(),
        }));
    }
    Ok(Some(ProviderEvent::Other(value)))
}
