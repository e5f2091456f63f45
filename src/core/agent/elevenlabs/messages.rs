//! ElevenLabs Conversational AI WebSocket message types.
//!
//! # Protocol Overview
//!
//! Client messages (sent to server):
//! - `{"user_audio_chunk": "<base64>"}` - caller audio
//! - `{"type": "pong", "event_id": n}` - keepalive reply
//!
//! Server messages (received from server), tagged by `type`:
//! - conversation_initiation_metadata - conversation id and audio formats
//! - audio - agent speech chunk
//! - interruption - the caller started speaking over the agent
//! - user_transcript - transcript of the caller
//! - agent_response - text of the agent's reply
//! - ping - keepalive, must be answered with a pong
//!
//! Any other `type` is accepted and surfaced as an informational event.

use serde::{Deserialize, Serialize};

// =============================================================================
// Client Messages
// =============================================================================

/// Message sent to the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ClientMessage {
    /// Caller audio
    UserAudio(UserAudioChunk),
    /// Keepalive reply
    Pong(Pong),
}

/// Caller audio chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAudioChunk {
    /// Base64 audio
    pub user_audio_chunk: String,
}

/// Reply to a server ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pong {
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub event_id: u64,
}

impl ClientMessage {
    /// Caller audio message.
    pub fn user_audio(payload: String) -> Self {
        ClientMessage::UserAudio(UserAudioChunk {
            user_audio_chunk: payload,
        })
    }

    /// Pong for the given ping event.
    pub fn pong(event_id: u64) -> Self {
        ClientMessage::Pong(Pong {
            message_type: "pong",
            event_id,
        })
    }
}

// =============================================================================
// Server Messages
// =============================================================================

/// Message received from the conversation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Conversation established
    ConversationInitiationMetadata {
        conversation_initiation_metadata_event: InitiationMetadata,
    },

    /// Agent speech
    Audio { audio_event: AudioEvent },

    /// Caller barged in
    Interruption {
        #[serde(default)]
        interruption_event: Option<InterruptionEvent>,
    },

    /// Caller transcript
    UserTranscript {
        user_transcription_event: UserTranscriptionEvent,
    },

    /// Agent reply text
    AgentResponse {
        agent_response_event: AgentResponseEvent,
    },

    /// Keepalive
    Ping { ping_event: PingEvent },

    /// Any other message type
    #[serde(other)]
    Unknown,
}

/// Conversation metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct InitiationMetadata {
    pub conversation_id: String,
    #[serde(default)]
    pub agent_output_audio_format: Option<String>,
    #[serde(default)]
    pub user_input_audio_format: Option<String>,
}

/// Agent speech chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioEvent {
    /// Base64 audio
    pub audio_base_64: String,
    #[serde(default)]
    pub event_id: Option<u64>,
}

/// Interruption details.
#[derive(Debug, Clone, Deserialize)]
pub struct InterruptionEvent {
    #[serde(default)]
    pub event_id: Option<u64>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Caller transcript.
#[derive(Debug, Clone, Deserialize)]
pub struct UserTranscriptionEvent {
    pub user_transcript: String,
}

/// Agent reply text.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentResponseEvent {
    pub agent_response: String,
}

/// Keepalive ping.
#[derive(Debug, Clone, Deserialize)]
pub struct PingEvent {
    pub event_id: u64,
    #[serde(default)]
    pub ping_ms: Option<u64>,
}

#[derive(Deserialize)]
struct MessageType {
    #[serde(rename = "type")]
    kind: String,
}

/// Parse a text frame received from the conversation.
pub fn parse_server_message(text: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}

/// Extract the `type` tag of a frame, for logging messages parsed as
/// [`ServerMessage::Unknown`].
pub fn message_type(text: &str) -> String {
    serde_json::from_str::<MessageType>(text)
        .map(|m| m.kind)
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_user_audio() {
        let value = serde_json::to_value(ClientMessage::user_audio("AAAA".to_string())).unwrap();
        assert_eq!(value, json!({"user_audio_chunk": "AAAA"}));
    }

    #[test]
    fn test_serialize_pong() {
        let value = serde_json::to_value(ClientMessage::pong(7)).unwrap();
        assert_eq!(value, json!({"type": "pong", "event_id": 7}));
    }

    #[test]
    fn test_parse_initiation_metadata() {
        let text = r#"{
            "type": "conversation_initiation_metadata",
            "conversation_initiation_metadata_event": {
                "conversation_id": "conv_1",
                "agent_output_audio_format": "ulaw_8000",
                "user_input_audio_format": "ulaw_8000"
            }
        }"#;
        match parse_server_message(text).unwrap() {
            ServerMessage::ConversationInitiationMetadata {
                conversation_initiation_metadata_event: meta,
            } => {
                assert_eq!(meta.conversation_id, "conv_1");
                assert_eq!(meta.agent_output_audio_format.as_deref(), Some("ulaw_8000"));
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_audio() {
        let text = r#"{"type":"audio","audio_event":{"audio_base_64":"BBBB","event_id":3}}"#;
        match parse_server_message(text).unwrap() {
            ServerMessage::Audio { audio_event } => {
                assert_eq!(audio_event.audio_base_64, "BBBB");
                assert_eq!(audio_event.event_id, Some(3));
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_interruption_with_and_without_body() {
        let with_body = r#"{"type":"interruption","interruption_event":{"event_id":4}}"#;
        assert!(matches!(
            parse_server_message(with_body).unwrap(),
            ServerMessage::Interruption { .. }
        ));
        assert!(matches!(
            parse_server_message(r#"{"type":"interruption"}"#).unwrap(),
            ServerMessage::Interruption {
                interruption_event: None
            }
        ));
    }

    #[test]
    fn test_parse_transcripts() {
        let user = r#"{"type":"user_transcript","user_transcription_event":{"user_transcript":"hello"}}"#;
        assert!(matches!(
            parse_server_message(user).unwrap(),
            ServerMessage::UserTranscript { user_transcription_event } if user_transcription_event.user_transcript == "hello"
        ));

        let agent = r#"{"type":"agent_response","agent_response_event":{"agent_response":"hi there"}}"#;
        assert!(matches!(
            parse_server_message(agent).unwrap(),
            ServerMessage::AgentResponse { agent_response_event } if agent_response_event.agent_response == "hi there"
        ));
    }

    #[test]
    fn test_parse_ping() {
        let text = r#"{"type":"ping","ping_event":{"event_id":9,"ping_ms":null}}"#;
        match parse_server_message(text).unwrap() {
            ServerMessage::Ping { ping_event } => {
                assert_eq!(ping_event.event_id, 9);
                assert!(ping_event.ping_ms.is_none());
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let text = r#"{"type":"vad_score","vad_score_event":{"vad_score":0.9}}"#;
        assert!(matches!(
            parse_server_message(text).unwrap(),
            ServerMessage::Unknown
        ));
        assert_eq!(message_type(text), "vad_score");
    }

    #[test]
    fn test_malformed_messages_are_errors() {
        assert!(parse_server_message("{").is_err());
        assert!(parse_server_message(r#"{"audio_event":{}}"#).is_err());
        assert!(parse_server_message(r#"{"type":"audio"}"#).is_err());
        assert_eq!(message_type("{"), "unknown");
    }
}
