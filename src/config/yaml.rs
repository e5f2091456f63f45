use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8000
///   tls:
///     enabled: true
///     cert_path: "/etc/callrelay/cert.pem"
///     key_path: "/etc/callrelay/key.pem"
///
/// agent:
///   agent_id: "your-agent-id"
///   api_key: "your-elevenlabs-key"
///   convai_url: "wss://api.elevenlabs.io/v1/convai/conversation"
///   api_url: "https://api.elevenlabs.io"
///
/// relay:
///   agent_connect_timeout_ms: 10000
///   drain_grace_period_ms: 2000
///   idle_timeout_seconds: 300
///   max_concurrent_calls: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub agent: Option<AgentYaml>,
    pub relay: Option<RelayYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Conversational AI agent configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AgentYaml {
    /// ElevenLabs agent to bridge calls to
    pub agent_id: Option<String>,
    /// ElevenLabs API key, for private agents
    pub api_key: Option<String>,
    /// Conversation WebSocket endpoint
    pub convai_url: Option<String>,
    /// REST API base URL
    pub api_url: Option<String>,
}

/// Relay tuning from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RelayYaml {
    pub agent_connect_timeout_ms: Option<u64>,
    pub drain_grace_period_ms: Option<u64>,
    /// 0 disables the idle timeout
    pub idle_timeout_seconds: Option<u64>,
    pub max_concurrent_calls: Option<usize>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
