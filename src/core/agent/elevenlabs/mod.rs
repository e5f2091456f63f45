//! ElevenLabs Conversational AI module.
//!
//! One [`ElevenLabsAgent`] per call, created by [`ElevenLabsAgentFactory`].
//!
//! # Audio Format
//!
//! The agent must be configured for `ulaw_8000` input and output so that
//! audio passes between the telephony leg and the agent without transcoding.
//! A mismatch is logged when the conversation starts.
//!
//! # Example
//!
//! ```rust,ignore
//! use callrelay_gateway::core::agent::{
//!     AgentFactory, ConversationalAgent, ElevenLabsAgentConfig, ElevenLabsAgentFactory,
//! };
//!
//! let factory = ElevenLabsAgentFactory::new(ElevenLabsAgentConfig {
//!     agent_id: "agent_...".to_string(),
//!     ..Default::default()
//! })?;
//!
//! let mut agent = factory.create(uuid::Uuid::new_v4())?;
//! agent.connect().await?;
//! ```

mod client;
mod config;
pub mod messages;

pub use client::{ElevenLabsAgent, ElevenLabsAgentFactory};
pub use config::{
    DEFAULT_CLOSE_GRACE, DEFAULT_CONNECT_TIMEOUT, ELEVENLABS_API_URL, ELEVENLABS_CONVAI_URL,
    ElevenLabsAgentConfig, SIGNED_URL_PATH, TELEPHONY_AUDIO_FORMAT,
};
