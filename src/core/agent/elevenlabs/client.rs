//! ElevenLabs Conversational AI client.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.elevenlabs.io/v1/convai/conversation?agent_id=<id>`
//! - Private agents: a signed URL is fetched first from
//!   `GET /v1/convai/conversation/get_signed_url` with the `xi-api-key` header
//! - Protocol: WebSocket with JSON messages
//! - Audio: base64 u-law 8kHz, as configured on the agent
//!
//! The connection runs on its own task. [`ConversationalAgent::connect`]
//! returns as soon as that task is spawned; the handshake outcome arrives
//! through the state callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use super::config::{ElevenLabsAgentConfig, TELEPHONY_AUDIO_FORMAT};
use super::messages::{ClientMessage, ServerMessage, message_type, parse_server_message};
use crate::core::agent::base::{
    AgentConnectionState, AgentError, AgentEvent, AgentEventCallback, AgentFactory, AgentResult,
    AgentStateCallback, AgentStateChange, BoxedAgent, ConversationalAgent, TranscriptRole,
};
use crate::core::codec::{self, AudioChunk};

/// Channel capacity for outbound WebSocket messages.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Response body of the signed URL endpoint.
#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    signed_url: String,
}

/// What the connection task does with one inbound text frame.
#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    /// Hand the event to the relay
    Event(AgentEvent),
    /// Answer a keepalive
    Pong(u64),
    /// Nothing to do
    Skip,
}

// =============================================================================
// ElevenLabs Agent
// =============================================================================

/// One ElevenLabs conversation, bound to one call.
pub struct ElevenLabsAgent {
    /// Call this conversation belongs to, for logs
    call_id: Uuid,
    /// Configuration
    config: ElevenLabsAgentConfig,
    /// HTTP client for signed URL requests
    http: reqwest::Client,
    /// Connection state (shared with connection task)
    state: Arc<RwLock<AgentConnectionState>>,
    /// Connected flag for fast checks (shared with connection task)
    connected: Arc<AtomicBool>,
    /// Conversation ID from the initiation metadata
    conversation_id: Arc<RwLock<Option<String>>>,
    /// Outbound message channel
    ws_sender: Option<mpsc::Sender<ClientMessage>>,
    /// Callbacks
    event_callback: Option<AgentEventCallback>,
    state_callback: Option<AgentStateCallback>,
    /// Stops the connection task
    cancel: CancellationToken,
    /// Connection task handle
    connection_handle: Option<JoinHandle<()>>,
}

impl ElevenLabsAgent {
    /// Create an unconnected session.
    pub fn new(call_id: Uuid, config: ElevenLabsAgentConfig, http: reqwest::Client) -> Self {
        Self {
            call_id,
            config,
            http,
            state: Arc::new(RwLock::new(AgentConnectionState::Connecting)),
            connected: Arc::new(AtomicBool::new(false)),
            conversation_id: Arc::new(RwLock::new(None)),
            ws_sender: None,
            event_callback: None,
            state_callback: None,
            cancel: CancellationToken::new(),
            connection_handle: None,
        }
    }

    /// Conversation ID assigned by the provider, once the conversation started.
    pub fn conversation_id(&self) -> Option<String> {
        self.conversation_id.read().clone()
    }

    /// Translate one inbound text frame.
    ///
    /// `interrupted_through` holds the highest event id cut off by an
    /// interruption; audio at or below it is stale and skipped.
    fn translate(
        text: &str,
        conversation_id: &RwLock<Option<String>>,
        interrupted_through: &mut Option<u64>,
        call_id: Uuid,
    ) -> Inbound {
        let message = match parse_server_message(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(%call_id, "Failed to parse agent message: {}", e);
                return Inbound::Skip;
            }
        };

        match message {
            ServerMessage::Audio { audio_event } => {
                if let (Some(event_id), Some(through)) = (audio_event.event_id, *interrupted_through)
                    && event_id <= through
                {
                    tracing::debug!(%call_id, event_id, "Skipping audio from interrupted response");
                    return Inbound::Skip;
                }
                match codec::decode(&audio_event.audio_base_64) {
                    Ok(chunk) => Inbound::Event(AgentEvent::Audio(chunk)),
                    Err(e) => {
                        tracing::warn!(%call_id, "Skipping agent audio: {}", e);
                        Inbound::Skip
                    }
                }
            }
            ServerMessage::Interruption { interruption_event } => {
                let (event_id, reason) = interruption_event
                    .map(|e| (e.event_id, e.reason))
                    .unwrap_or_default();
                if let Some(event_id) = event_id {
                    *interrupted_through = Some(interrupted_through.map_or(event_id, |t| t.max(event_id)));
                }
                tracing::debug!(%call_id, ?event_id, ?reason, "Agent interrupted");
                Inbound::Event(AgentEvent::Interruption)
            }
            ServerMessage::UserTranscript {
                user_transcription_event,
            } => Inbound::Event(AgentEvent::Transcript {
                role: TranscriptRole::User,
                text: user_transcription_event.user_transcript,
            }),
            ServerMessage::AgentResponse {
                agent_response_event,
            } => Inbound::Event(AgentEvent::Transcript {
                role: TranscriptRole::Agent,
                text: agent_response_event.agent_response,
            }),
            ServerMessage::Ping { ping_event } => Inbound::Pong(ping_event.event_id),
            ServerMessage::ConversationInitiationMetadata {
                conversation_initiation_metadata_event: meta,
            } => {
                for (direction, format) in [
                    ("output", &meta.agent_output_audio_format),
                    ("input", &meta.user_input_audio_format),
                ] {
                    if let Some(format) = format
                        && format != TELEPHONY_AUDIO_FORMAT
                    {
                        tracing::warn!(
                            %call_id,
                            direction,
                            format = %format,
                            expected = TELEPHONY_AUDIO_FORMAT,
                            "Agent audio format does not match the telephony leg"
                        );
                    }
                }
                tracing::info!(
                    %call_id,
                    conversation_id = %meta.conversation_id,
                    "Conversation started"
                );
                *conversation_id.write() = Some(meta.conversation_id);
                Inbound::Event(AgentEvent::Other {
                    kind: "conversation_initiation_metadata".to_string(),
                })
            }
            ServerMessage::Unknown => Inbound::Event(AgentEvent::Other {
                kind: message_type(text),
            }),
        }
    }
}

/// Resolve the URL to open: signed when an API key is configured.
async fn resolve_url(http: &reqwest::Client, config: &ElevenLabsAgentConfig) -> AgentResult<Url> {
    let Some(api_key) = config.api_key.as_deref().map(String::as_str) else {
        return config.conversation_url();
    };

    let endpoint = config.signed_url_endpoint()?;
    let response = http
        .get(endpoint)
        .header("xi-api-key", api_key)
        .send()
        .await
        .map_err(|e| AgentError::ConnectionFailed(format!("Signed URL request failed: {e}")))?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(AgentError::AuthenticationFailed(format!(
            "Signed URL request rejected with status {status}"
        )));
    }
    if !status.is_success() {
        return Err(AgentError::ConnectionFailed(format!(
            "Signed URL request failed with status {status}"
        )));
    }

    let body: SignedUrlResponse = response
        .json()
        .await
        .map_err(|e| AgentError::SerializationError(e.to_string()))?;

    Url::parse(&body.signed_url)
        .map_err(|e| AgentError::ConnectionFailed(format!("Invalid signed URL: {e}")))
}

#[async_trait]
impl ConversationalAgent for ElevenLabsAgent {
    async fn connect(&mut self) -> AgentResult<()> {
        if self.connection_handle.is_some() {
            return Ok(());
        }

        *self.state.write() = AgentConnectionState::Connecting;

        let (tx, mut rx) = mpsc::channel::<ClientMessage>(WS_CHANNEL_CAPACITY);
        self.ws_sender = Some(tx);

        let call_id = self.call_id;
        let config = self.config.clone();
        let http = self.http.clone();
        let state = self.state.clone();
        let connected = self.connected.clone();
        let conversation_id = self.conversation_id.clone();
        let event_cb = self.event_callback.clone();
        let state_cb = self.state_callback.clone();
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            let notify = |change: AgentStateChange| {
                let state_cb = state_cb.clone();
                async move {
                    if let Some(cb) = state_cb {
                        cb(change).await;
                    }
                }
            };

            let open = async {
                let url = resolve_url(&http, &config).await?;
                let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                    .await
                    .map_err(|e| AgentError::ConnectionFailed(e.to_string()))?;
                Ok::<_, AgentError>(ws_stream)
            };

            let ws_stream = tokio::select! {
                _ = cancel.cancelled() => {
                    *state.write() = AgentConnectionState::Closed;
                    tracing::debug!(%call_id, "Agent connection cancelled before open");
                    return;
                }
                result = tokio::time::timeout(config.connect_timeout, open) => match result {
                    Ok(Ok(ws_stream)) => ws_stream,
                    Ok(Err(e)) => {
                        tracing::error!(%call_id, "Failed to connect to agent: {}", e);
                        *state.write() = AgentConnectionState::Closed;
                        notify(AgentStateChange::closed(e.to_string())).await;
                        return;
                    }
                    Err(_) => {
                        let e = AgentError::Timeout(format!(
                            "Agent did not answer within {}ms",
                            config.connect_timeout.as_millis()
                        ));
                        tracing::error!(%call_id, "Failed to connect to agent: {}", e);
                        *state.write() = AgentConnectionState::Closed;
                        notify(AgentStateChange::closed(e.to_string())).await;
                        return;
                    }
                },
            };

            tracing::info!(%call_id, agent_id = %config.agent_id, "Connected to ElevenLabs agent");
            connected.store(true, Ordering::SeqCst);
            *state.write() = AgentConnectionState::Open;
            notify(AgentStateChange::open()).await;

            let (mut ws_sink, mut ws_stream) = ws_stream.split();
            let mut closing = false;
            let mut interrupted_through = None;

            let reason = loop {
                tokio::select! {
                    _ = cancel.cancelled(), if !closing => {
                        closing = true;
                        connected.store(false, Ordering::SeqCst);
                        if let Err(e) = ws_sink.send(Message::Close(None)).await {
                            break format!("Failed to send close: {e}");
                        }
                        tracing::debug!(%call_id, "Close sent, waiting for acknowledgment");
                    }

                    Some(message) = rx.recv(), if !closing => {
                        let json = match serde_json::to_string(&message) {
                            Ok(j) => j,
                            Err(e) => {
                                tracing::error!(%call_id, "Failed to serialize message: {}", e);
                                continue;
                            }
                        };

                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            break format!("Failed to send message: {e}");
                        }
                    }

                    msg = ws_stream.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if closing {
                                    continue;
                                }
                                match Self::translate(&text, &conversation_id, &mut interrupted_through, call_id) {
                                    Inbound::Event(event) => {
                                        if let Some(cb) = event_cb.as_ref() {
                                            cb(event).await;
                                        }
                                    }
                                    Inbound::Pong(event_id) => {
                                        let pong = match serde_json::to_string(&ClientMessage::pong(event_id)) {
                                            Ok(j) => j,
                                            Err(e) => {
                                                tracing::error!(%call_id, "Failed to serialize pong: {}", e);
                                                continue;
                                            }
                                        };
                                        if let Err(e) = ws_sink.send(Message::Text(pong.into())).await {
                                            break format!("Failed to send pong: {e}");
                                        }
                                    }
                                    Inbound::Skip => {}
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                break match frame {
                                    Some(frame) if closing => format!("Closed by relay ({})", frame.code),
                                    Some(frame) => format!("Closed by agent: {} {}", frame.code, frame.reason.as_str()),
                                    None if closing => "Closed by relay".to_string(),
                                    None => "Closed by agent".to_string(),
                                };
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => break AgentError::WebSocketError(e.to_string()).to_string(),
                            None => break "Connection ended".to_string(),
                        }
                    }
                }
            };

            connected.store(false, Ordering::SeqCst);
            *state.write() = AgentConnectionState::Closed;
            tracing::info!(%call_id, reason = %reason, "Agent connection closed");
            notify(AgentStateChange::closed(reason)).await;
        });

        self.connection_handle = Some(handle);
        Ok(())
    }

    async fn disconnect(&mut self) -> AgentResult<()> {
        self.ws_sender = None;
        self.cancel.cancel();

        if let Some(mut handle) = self.connection_handle.take()
            && tokio::time::timeout(self.config.close_grace, &mut handle)
                .await
                .is_err()
        {
            tracing::warn!(
                call_id = %self.call_id,
                "Agent did not acknowledge close within {}ms, dropping connection",
                self.config.close_grace.as_millis()
            );
            handle.abort();
        }

        self.connected.store(false, Ordering::SeqCst);
        *self.state.write() = AgentConnectionState::Closed;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connection_state(&self) -> AgentConnectionState {
        *self.state.read()
    }

    async fn send_user_audio(&mut self, chunk: AudioChunk) -> AgentResult<()> {
        if !self.is_ready() {
            tracing::trace!(call_id = %self.call_id, "Agent not open, dropping caller audio");
            return Ok(());
        }

        let Some(sender) = self.ws_sender.as_ref() else {
            return Ok(());
        };

        match sender.try_send(ClientMessage::user_audio(codec::encode(&chunk))) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(call_id = %self.call_id, "Agent send queue full, dropping caller audio");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(call_id = %self.call_id, "Agent connection gone, dropping caller audio");
            }
        }
        Ok(())
    }

    fn on_event(&mut self, callback: AgentEventCallback) -> AgentResult<()> {
        self.event_callback = Some(callback);
        Ok(())
    }

    fn on_state_change(&mut self, callback: AgentStateCallback) -> AgentResult<()> {
        self.state_callback = Some(callback);
        Ok(())
    }

    fn provider_info(&self) -> serde_json::Value {
        serde_json::json!({
            "provider": "elevenlabs",
            "api_type": "WebSocket Conversational AI",
            "endpoint": self.config.convai_url,
            "agent_id": self.config.agent_id,
            "signed_url": self.config.api_key.is_some(),
            "conversation_id": self.conversation_id(),
            "audio_format": TELEPHONY_AUDIO_FORMAT,
            "documentation": "https://elevenlabs.io/docs/conversational-ai/api-reference/conversational-ai/websocket"
        })
    }
}

impl Drop for ElevenLabsAgent {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.connection_handle.take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Creates one [`ElevenLabsAgent`] per call, sharing an HTTP client.
#[derive(Clone)]
pub struct ElevenLabsAgentFactory {
    config: ElevenLabsAgentConfig,
    http: reqwest::Client,
}

impl ElevenLabsAgentFactory {
    pub fn new(config: ElevenLabsAgentConfig) -> AgentResult<Self> {
        if config.agent_id.trim().is_empty() {
            return Err(AgentError::InvalidConfiguration(
                "Agent ID is required".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(config.connect_timeout)
            .build()
            .map_err(|e| AgentError::InvalidConfiguration(e.to_string()))?;

        Ok(Self { config, http })
    }
}

impl AgentFactory for ElevenLabsAgentFactory {
    fn create(&self, call_id: Uuid) -> AgentResult<BoxedAgent> {
        Ok(Box::new(ElevenLabsAgent::new(
            call_id,
            self.config.clone(),
            self.http.clone(),
        )))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> ElevenLabsAgentConfig {
        ElevenLabsAgentConfig {
            agent_id: "agent_123".to_string(),
            ..Default::default()
        }
    }

    fn translate(text: &str) -> Inbound {
        ElevenLabsAgent::translate(text, &RwLock::new(None), &mut None, Uuid::nil())
    }

    #[test]
    fn test_new_agent_is_connecting() {
        let agent = ElevenLabsAgent::new(Uuid::new_v4(), config(), reqwest::Client::new());
        assert_eq!(agent.connection_state(), AgentConnectionState::Connecting);
        assert!(!agent.is_ready());
        assert!(agent.conversation_id().is_none());
    }

    #[tokio::test]
    async fn test_send_audio_before_open_is_noop() {
        let mut agent = ElevenLabsAgent::new(Uuid::new_v4(), config(), reqwest::Client::new());
        let result = agent
            .send_user_audio(AudioChunk::from(vec![0u8, 0, 0]))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_idempotent() {
        let mut agent = ElevenLabsAgent::new(Uuid::new_v4(), config(), reqwest::Client::new());
        agent.disconnect().await.unwrap();
        agent.disconnect().await.unwrap();
        assert_eq!(agent.connection_state(), AgentConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_unreachable_agent_reports_closed() {
        let config = ElevenLabsAgentConfig {
            convai_url: "ws://127.0.0.1:1/v1/convai/conversation".to_string(),
            connect_timeout: Duration::from_secs(2),
            ..config()
        };
        let mut agent = ElevenLabsAgent::new(Uuid::new_v4(), config, reqwest::Client::new());

        let (tx, mut rx) = mpsc::channel(4);
        let callback: AgentStateCallback = Arc::new(move |change: AgentStateChange| {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send(change).await;
            })
        });
        agent.on_state_change(callback).unwrap();

        agent.connect().await.unwrap();

        let change = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.state, AgentConnectionState::Closed);
        assert!(change.reason.is_some());
        assert!(!agent.is_ready());
        assert_eq!(agent.connection_state(), AgentConnectionState::Closed);
    }

    #[test]
    fn test_translate_audio() {
        let inbound = translate(r#"{"type":"audio","audio_event":{"audio_base_64":"BBBB","event_id":1}}"#);
        assert_eq!(
            inbound,
            Inbound::Event(AgentEvent::Audio(AudioChunk::from(vec![0x04u8, 0x10, 0x41])))
        );
    }

    #[test]
    fn test_translate_bad_audio_is_skipped() {
        let inbound = translate(r#"{"type":"audio","audio_event":{"audio_base_64":"@@@"}}"#);
        assert_eq!(inbound, Inbound::Skip);
    }

    #[test]
    fn test_translate_ping_and_interruption() {
        assert_eq!(
            translate(r#"{"type":"ping","ping_event":{"event_id":42}}"#),
            Inbound::Pong(42)
        );
        assert_eq!(
            translate(r#"{"type":"interruption","interruption_event":{"event_id":3}}"#),
            Inbound::Event(AgentEvent::Interruption)
        );
    }

    #[test]
    fn test_audio_from_interrupted_response_is_skipped() {
        let conversation_id = RwLock::new(None);
        let mut interrupted_through = None;
        let mut translate = |text: &str| {
            ElevenLabsAgent::translate(text, &conversation_id, &mut interrupted_through, Uuid::nil())
        };

        assert!(matches!(
            translate(r#"{"type":"audio","audio_event":{"audio_base_64":"BBBB","event_id":4}}"#),
            Inbound::Event(AgentEvent::Audio(_))
        ));
        assert_eq!(
            translate(r#"{"type":"interruption","interruption_event":{"event_id":5}}"#),
            Inbound::Event(AgentEvent::Interruption)
        );
        assert_eq!(
            translate(r#"{"type":"audio","audio_event":{"audio_base_64":"BBBB","event_id":4}}"#),
            Inbound::Skip
        );
        assert_eq!(
            translate(r#"{"type":"audio","audio_event":{"audio_base_64":"BBBB","event_id":5}}"#),
            Inbound::Skip
        );
        assert!(matches!(
            translate(r#"{"type":"audio","audio_event":{"audio_base_64":"BBBB","event_id":6}}"#),
            Inbound::Event(AgentEvent::Audio(_))
        ));
        assert!(matches!(
            translate(r#"{"type":"audio","audio_event":{"audio_base_64":"BBBB"}}"#),
            Inbound::Event(AgentEvent::Audio(_))
        ));
        assert_eq!(interrupted_through, Some(5));
    }

    #[test]
    fn test_translate_transcripts() {
        assert_eq!(
            translate(r#"{"type":"user_transcript","user_transcription_event":{"user_transcript":"hello"}}"#),
            Inbound::Event(AgentEvent::Transcript {
                role: TranscriptRole::User,
                text: "hello".to_string()
            })
        );
        assert_eq!(
            translate(r#"{"type":"agent_response","agent_response_event":{"agent_response":"hi"}}"#),
            Inbound::Event(AgentEvent::Transcript {
                role: TranscriptRole::Agent,
                text: "hi".to_string()
            })
        );
    }

    #[test]
    fn test_translate_metadata_records_conversation_id() {
        let conversation_id = RwLock::new(None);
        let inbound = ElevenLabsAgent::translate(
            r#"{"type":"conversation_initiation_metadata","conversation_initiation_metadata_event":{"conversation_id":"conv_9","agent_output_audio_format":"pcm_16000"}}"#,
            &conversation_id,
            &mut None,
            Uuid::nil(),
        );
        assert_eq!(
            inbound,
            Inbound::Event(AgentEvent::Other {
                kind: "conversation_initiation_metadata".to_string()
            })
        );
        assert_eq!(conversation_id.read().as_deref(), Some("conv_9"));
    }

    #[test]
    fn test_translate_unknown_and_malformed() {
        assert_eq!(
            translate(r#"{"type":"vad_score","vad_score_event":{"vad_score":0.5}}"#),
            Inbound::Event(AgentEvent::Other {
                kind: "vad_score".to_string()
            })
        );
        assert_eq!(translate("not json"), Inbound::Skip);
    }

    #[test]
    fn test_provider_info() {
        let agent = ElevenLabsAgent::new(Uuid::new_v4(), config(), reqwest::Client::new());
        let info = agent.provider_info();
        assert_eq!(info["provider"], "elevenlabs");
        assert_eq!(info["agent_id"], "agent_123");
        assert_eq!(info["signed_url"], false);
        assert!(info["conversation_id"].is_null());
    }

    #[test]
    fn test_factory_requires_agent_id() {
        assert!(matches!(
            ElevenLabsAgentFactory::new(ElevenLabsAgentConfig::default()),
            Err(AgentError::InvalidConfiguration(_))
        ));

        let factory = ElevenLabsAgentFactory::new(config()).unwrap();
        let agent = factory.create(Uuid::new_v4()).unwrap();
        assert_eq!(agent.connection_state(), AgentConnectionState::Connecting);
    }
}
