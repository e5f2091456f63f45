//! Conversational AI agent leg.
//!
//! - `ConversationalAgent` trait for provider abstraction
//! - `AgentFactory` to create one session per call
//! - Callback-based event handling, delivered in provider order

mod base;
pub mod elevenlabs;

pub use base::{
    AgentConnectionState, AgentError, AgentEvent, AgentEventCallback, AgentFactory, AgentResult,
    AgentStateCallback, AgentStateChange, BoxedAgent, ConversationalAgent, TranscriptRole,
};
pub use elevenlabs::{ElevenLabsAgent, ElevenLabsAgentConfig, ElevenLabsAgentFactory};
