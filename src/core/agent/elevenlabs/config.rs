//! ElevenLabs Conversational AI configuration.

use std::time::Duration;

use url::Url;
use zeroize::Zeroizing;

use crate::core::agent::base::{AgentError, AgentResult};

/// Conversational AI WebSocket endpoint.
pub const ELEVENLABS_CONVAI_URL: &str = "wss://api.elevenlabs.io/v1/convai/conversation";

/// REST API base URL (used for signed URLs).
pub const ELEVENLABS_API_URL: &str = "https://api.elevenlabs.io";

/// Path of the signed URL endpoint, relative to the API base URL.
pub const SIGNED_URL_PATH: &str = "/v1/convai/conversation/get_signed_url";

/// Audio format the telephony leg speaks, as named by the provider.
pub const TELEPHONY_AUDIO_FORMAT: &str = "ulaw_8000";

/// Default time allowed for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for the provider to acknowledge a close.
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Configuration for one ElevenLabs agent session.
///
/// The API key is wiped from memory when the config is dropped and is never
/// printed by `Debug`.
#[derive(Clone)]
pub struct ElevenLabsAgentConfig {
    /// Agent to converse with
    pub agent_id: String,
    /// API key; when set, the session connects through a signed URL
    pub api_key: Option<Zeroizing<String>>,
    /// WebSocket endpoint
    pub convai_url: String,
    /// REST API base URL
    pub api_url: String,
    /// Handshake timeout
    pub connect_timeout: Duration,
    /// Close acknowledgment grace period
    pub close_grace: Duration,
}

impl Default for ElevenLabsAgentConfig {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            api_key: None,
            convai_url: ELEVENLABS_CONVAI_URL.to_string(),
            api_url: ELEVENLABS_API_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            close_grace: DEFAULT_CLOSE_GRACE,
        }
    }
}

impl std::fmt::Debug for ElevenLabsAgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsAgentConfig")
            .field("agent_id", &self.agent_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("convai_url", &self.convai_url)
            .field("api_url", &self.api_url)
            .field("connect_timeout", &self.connect_timeout)
            .field("close_grace", &self.close_grace)
            .finish()
    }
}

impl ElevenLabsAgentConfig {
    /// Public conversation URL for the configured agent.
    pub fn conversation_url(&self) -> AgentResult<Url> {
        Url::parse_with_params(&self.convai_url, &[("agent_id", self.agent_id.as_str())])
            .map_err(|e| AgentError::InvalidConfiguration(format!("Invalid conversation URL: {e}")))
    }

    /// Signed URL endpoint for the configured agent.
    pub fn signed_url_endpoint(&self) -> AgentResult<Url> {
        let base = self.api_url.trim_end_matches('/');
        Url::parse_with_params(
            &format!("{base}{SIGNED_URL_PATH}"),
            &[("agent_id", self.agent_id.as_str())],
        )
        .map_err(|e| AgentError::InvalidConfiguration(format!("Invalid API URL: {e}")))
    }
}
