//! Configuration module for the call relay gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable access
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use callrelay_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroizing;

mod env;
mod merge;
mod validation;
mod yaml;

pub use merge::{
    DEFAULT_AGENT_CONNECT_TIMEOUT_MS, DEFAULT_DRAIN_GRACE_PERIOD_MS, DEFAULT_HOST,
    DEFAULT_IDLE_TIMEOUT_SECONDS, DEFAULT_PORT,
};

use crate::core::agent::ElevenLabsAgentConfig;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains:
/// - Listener settings (host, port, optional TLS)
/// - The ElevenLabs agent every call is bridged to
/// - Relay tuning (timeouts, admission limit)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Agent settings
    pub elevenlabs_agent_id: String,
    /// When set, conversations are opened through a signed URL
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_convai_url: String,
    pub elevenlabs_api_url: String,

    // Relay settings
    /// Time allowed for the agent WebSocket handshake
    pub agent_connect_timeout_ms: u64,
    /// Time allowed for a leg to acknowledge close during teardown
    pub drain_grace_period_ms: u64,
    /// Media streams with no inbound frame for this long are closed (0 disables)
    pub idle_timeout_seconds: u64,
    /// Maximum concurrent media streams (None for unlimited)
    pub max_concurrent_calls: Option<usize>,
}

/// Zeroize secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.elevenlabs_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// The `.env` file is loaded into the environment by `main` before this
    /// is called.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails,
    /// in particular when `ELEVENLABS_AGENT_ID` is missing.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the merged configuration.
    pub fn validate(&self) -> Result<(), String> {
        validation::validate_agent_id(&self.elevenlabs_agent_id)?;
        validation::validate_convai_url(&self.elevenlabs_convai_url)?;
        validation::validate_api_url(&self.elevenlabs_api_url)?;
        validation::validate_timeouts(self.agent_connect_timeout_ms, self.drain_grace_period_ms)?;
        validation::validate_max_concurrent_calls(self.max_concurrent_calls)?;
        Ok(())
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn drain_grace_period(&self) -> Duration {
        Duration::from_millis(self.drain_grace_period_ms)
    }

    /// Idle timeout for media streams, `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_seconds > 0).then(|| Duration::from_secs(self.idle_timeout_seconds))
    }

    /// Agent session configuration derived from this server configuration.
    pub fn agent_config(&self) -> ElevenLabsAgentConfig {
        ElevenLabsAgentConfig {
            agent_id: self.elevenlabs_agent_id.clone(),
            api_key: self.elevenlabs_api_key.clone().map(Zeroizing::new),
            convai_url: self.elevenlabs_convai_url.clone(),
            api_url: self.elevenlabs_api_url.clone(),
            connect_timeout: Duration::from_millis(self.agent_connect_timeout_ms),
            close_grace: self.drain_grace_period(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    /// Helper function to create a test ServerConfig with defaults
    fn test_config() -> ServerConfig {
        ServerConfig {
            host: "localhost".to_string(),
            port: 8000,
            tls: None,
            elevenlabs_agent_id: "agent_123".to_string(),
            elevenlabs_api_key: None,
            elevenlabs_convai_url: "wss://api.elevenlabs.io/v1/convai/conversation".to_string(),
            elevenlabs_api_url: "https://api.elevenlabs.io".to_string(),
            agent_connect_timeout_ms: 10_000,
            drain_grace_period_ms: 2_000,
            idle_timeout_seconds: 300,
            max_concurrent_calls: None,
        }
    }

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            env::remove_var("HOST");
            env::remove_var("PORT");
            env::remove_var("TLS_CERT_PATH");
            env::remove_var("TLS_KEY_PATH");
            env::remove_var("ELEVENLABS_AGENT_ID");
            env::remove_var("ELEVENLABS_API_KEY");
            env::remove_var("ELEVENLABS_CONVAI_URL");
            env::remove_var("ELEVENLABS_API_URL");
            env::remove_var("AGENT_CONNECT_TIMEOUT_MS");
            env::remove_var("DRAIN_GRACE_PERIOD_MS");
            env::remove_var("IDLE_TIMEOUT_SECONDS");
            env::remove_var("MAX_CONCURRENT_CALLS");
        }
    }

    #[test]
    fn test_address_and_tls() {
        let mut config = test_config();
        assert_eq!(config.address(), "localhost:8000");
        assert!(!config.is_tls_enabled());

        config.tls = Some(TlsConfig {
            cert_path: PathBuf::from("cert.pem"),
            key_path: PathBuf::from("key.pem"),
        });
        assert!(config.is_tls_enabled());
    }

    #[test]
    fn test_agent_config() {
        let mut config = test_config();
        config.elevenlabs_api_key = Some("xi-key".to_string());
        config.agent_connect_timeout_ms = 5_000;

        let agent = config.agent_config();
        assert_eq!(agent.agent_id, "agent_123");
        assert_eq!(agent.api_key.as_deref().map(String::as_str), Some("xi-key"));
        assert_eq!(agent.connect_timeout, Duration::from_secs(5));
        assert_eq!(agent.close_grace, Duration::from_secs(2));
    }

    #[test]
    fn test_idle_timeout_zero_disables() {
        let mut config = test_config();
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(300)));
        config.idle_timeout_seconds = 0;
        assert_eq!(config.idle_timeout(), None);
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();
        unsafe {
            env::set_var("ELEVENLABS_AGENT_ID", "agent_123");
        }

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert!(config.tls.is_none());
        assert_eq!(config.elevenlabs_agent_id, "agent_123");
        assert!(config.elevenlabs_api_key.is_none());
        assert_eq!(
            config.elevenlabs_convai_url,
            "wss://api.elevenlabs.io/v1/convai/conversation"
        );
        assert_eq!(config.elevenlabs_api_url, "https://api.elevenlabs.io");
        assert_eq!(config.agent_connect_timeout_ms, 10_000);
        assert_eq!(config.drain_grace_period_ms, 2_000);
        assert_eq!(config.idle_timeout_seconds, 300);
        assert!(config.max_concurrent_calls.is_none());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_missing_agent_id() {
        cleanup_env_vars();

        let result = ServerConfig::from_env();

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("ELEVENLABS_AGENT_ID")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        cleanup_env_vars();
        unsafe {
            env::set_var("ELEVENLABS_AGENT_ID", "agent_123");
            env::set_var("PORT", "9100");
            env::set_var("ELEVENLABS_API_KEY", "xi-key");
            env::set_var("MAX_CONCURRENT_CALLS", "50");
            env::set_var("IDLE_TIMEOUT_SECONDS", "0");
        }

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.elevenlabs_api_key, Some("xi-key".to_string()));
        assert_eq!(config.max_concurrent_calls, Some(50));
        assert!(config.idle_timeout().is_none());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup_env_vars();
        unsafe {
            env::set_var("ELEVENLABS_AGENT_ID", "agent_123");
            env::set_var("PORT", "not-a-port");
        }

        let result = ServerConfig::from_env();
        assert!(result.unwrap_err().to_string().contains("PORT"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_tls_requires_both_paths() {
        cleanup_env_vars();
        unsafe {
            env::set_var("ELEVENLABS_AGENT_ID", "agent_123");
            env::set_var("TLS_CERT_PATH", "/tmp/cert.pem");
        }

        assert!(ServerConfig::from_env().is_err());

        unsafe {
            env::set_var("TLS_KEY_PATH", "/tmp/key.pem");
        }
        let config = ServerConfig::from_env().unwrap();
        assert!(config.is_tls_enabled());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_only() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080

agent:
  agent_id: "yaml_agent"
  api_key: "yaml-el-key"

relay:
  drain_grace_period_ms: 500
  max_concurrent_calls: 10
"#;

        fs::write(&config_path, yaml_content).unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.elevenlabs_agent_id, "yaml_agent");
        assert_eq!(config.elevenlabs_api_key, Some("yaml-el-key".to_string()));
        assert_eq!(config.drain_grace_period_ms, 500);
        assert_eq!(config.max_concurrent_calls, Some(10));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"

agent:
  agent_id: "yaml_agent"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("PORT", "9000");
            env::set_var("ELEVENLABS_AGENT_ID", "env_agent");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.elevenlabs_agent_id, "yaml_agent");
        // ENV value
        assert_eq!(config.port, 9000);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_tls_disabled_ignores_env_paths() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  tls:
    enabled: false

agent:
  agent_id: "yaml_agent"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("TLS_CERT_PATH", "/tmp/cert.pem");
            env::set_var("TLS_KEY_PATH", "/tmp/key.pem");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();
        assert!(!config.is_tls_enabled());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_invalid_convai_url() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
agent:
  agent_id: "yaml_agent"
  convai_url: "https://api.elevenlabs.io/v1/convai/conversation"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        let result = ServerConfig::from_file(&config_path);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("ELEVENLABS_CONVAI_URL")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_yaml() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");

        fs::write(&config_path, "invalid: yaml: [content").unwrap();

        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );

        cleanup_env_vars();
    }
}
