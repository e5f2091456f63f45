pub mod agent;
pub mod codec;
pub mod relay;
pub mod telephony;

// Re-export commonly used types for convenience
pub use agent::{
    AgentConnectionState, AgentError, AgentEvent, AgentFactory, AgentResult, BoxedAgent,
    ConversationalAgent, ElevenLabsAgent, ElevenLabsAgentConfig, ElevenLabsAgentFactory,
};
pub use codec::{AudioChunk, DecodeError};
pub use relay::{AgentSignal, CallSession, Flow, Leg, RelaySession, RelayState};
pub use telephony::{
    OutboundFrame, SendOutcome, TelephonyConnectionState, TelephonyEvent, TelephonyRoute,
    TelephonySink,
};
