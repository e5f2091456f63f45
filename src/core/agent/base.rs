//! Base traits and types for conversational AI agent sessions.
//!
//! An agent session is the outbound leg of a call: caller audio goes in,
//! agent audio and conversation events come out. Providers implement
//! [`ConversationalAgent`]; the relay only talks to the trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::core::codec::AudioChunk;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur on the agent leg.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

// =============================================================================
// Connection State
// =============================================================================

/// Connection state of the agent leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentConnectionState {
    /// Connection being opened (sessions are opened eagerly)
    #[default]
    Connecting,
    /// Connected and ready for audio
    Open,
    /// Closed by either side, or failed to open
    Closed,
}

impl fmt::Display for AgentConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentConnectionState::Connecting => write!(f, "Connecting"),
            AgentConnectionState::Open => write!(f, "Open"),
            AgentConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// A connection state transition reported by the agent leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStateChange {
    /// New state
    pub state: AgentConnectionState,
    /// Why the connection closed, if it did
    pub reason: Option<String>,
}

impl AgentStateChange {
    pub fn open() -> Self {
        Self {
            state: AgentConnectionState::Open,
            reason: None,
        }
    }

    pub fn closed(reason: impl Into<String>) -> Self {
        Self {
            state: AgentConnectionState::Closed,
            reason: Some(reason.into()),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Speaker of a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    /// The caller
    User,
    /// The AI agent
    Agent,
}

impl fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptRole::User => write!(f, "user"),
            TranscriptRole::Agent => write!(f, "agent"),
        }
    }
}

/// Event produced by the agent leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// Agent speech to play into the call
    Audio(AudioChunk),
    /// The caller barged in: stop playing agent speech now
    Interruption,
    /// Transcript of either side of the conversation
    Transcript {
        /// Who spoke
        role: TranscriptRole,
        /// What was said
        text: String,
    },
    /// Any other provider event, informational only
    Other {
        /// Provider event type
        kind: String,
    },
}

// =============================================================================
// Callback Types
// =============================================================================

/// Callback type for agent events.
///
/// Invoked sequentially, in the order the provider sent the events.
pub type AgentEventCallback =
    Arc<dyn Fn(AgentEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for connection state changes.
pub type AgentStateCallback =
    Arc<dyn Fn(AgentStateChange) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// =============================================================================
// Base Trait
// =============================================================================

/// A conversational AI session bound to one call.
#[async_trait]
pub trait ConversationalAgent: Send + Sync {
    /// Start opening the connection.
    ///
    /// Returns once the connection attempt is under way. The outcome is
    /// reported through the state callback: `Open` on success, `Closed` with a
    /// reason on failure.
    async fn connect(&mut self) -> AgentResult<()>;

    /// Close the connection and release it.
    ///
    /// Waits for the provider to acknowledge the close for a bounded grace
    /// period, then drops the connection regardless. Idempotent.
    async fn disconnect(&mut self) -> AgentResult<()>;

    /// Whether the connection is open.
    fn is_ready(&self) -> bool;

    /// Current connection state.
    fn connection_state(&self) -> AgentConnectionState;

    /// Send caller audio to the agent.
    ///
    /// A no-op when the connection is not open; the chunk is dropped.
    async fn send_user_audio(&mut self, chunk: AudioChunk) -> AgentResult<()>;

    /// Register the callback for agent events.
    fn on_event(&mut self, callback: AgentEventCallback) -> AgentResult<()>;

    /// Register the callback for connection state changes.
    fn on_state_change(&mut self, callback: AgentStateCallback) -> AgentResult<()>;

    /// Provider information for logs.
    fn provider_info(&self) -> serde_json::Value;
}

/// Boxed trait object for agent sessions.
pub type BoxedAgent = Box<dyn ConversationalAgent>;

/// Creates one agent session per call.
pub trait AgentFactory: Send + Sync {
    /// Create an unconnected session for the given call.
    fn create(&self, call_id: Uuid) -> AgentResult<BoxedAgent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(AgentConnectionState::Connecting.to_string(), "Connecting");
        assert_eq!(AgentConnectionState::Open.to_string(), "Open");
        assert_eq!(AgentConnectionState::Closed.to_string(), "Closed");
    }

    #[test]
    fn test_default_state_is_connecting() {
        assert_eq!(
            AgentConnectionState::default(),
            AgentConnectionState::Connecting
        );
    }

    #[test]
    fn test_state_change_constructors() {
        let open = AgentStateChange::open();
        assert_eq!(open.state, AgentConnectionState::Open);
        assert!(open.reason.is_none());

        let closed = AgentStateChange::closed("server went away");
        assert_eq!(closed.state, AgentConnectionState::Closed);
        assert_eq!(closed.reason.as_deref(), Some("server went away"));
    }

    #[test]
    fn test_transcript_role_display() {
        assert_eq!(TranscriptRole::User.to_string(), "user");
        assert_eq!(TranscriptRole::Agent.to_string(), "agent");
    }

    #[test]
    fn test_error_display() {
        let err = AgentError::ConnectionFailed("refused".to_string());
        assert!(err.to_string().contains("Connection failed"));

        let err = AgentError::WebSocketError("reset".to_string());
        assert_eq!(err.to_string(), "WebSocket error: reset");
    }
}
