//! Merging YAML and environment configuration.
//!
//! Priority: YAML > ENV (including values loaded from `.env`) > defaults.

use super::ServerConfig;
use super::env;
use super::validation;
use super::yaml::YamlConfig;
use crate::core::agent::elevenlabs::{ELEVENLABS_API_URL, ELEVENLABS_CONVAI_URL};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_AGENT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_DRAIN_GRACE_PERIOD_MS: u64 = 2_000;
pub const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 300;

/// Build a [`ServerConfig`] from environment variables with optional YAML
/// overrides. Does not validate beyond what is needed to build the struct.
pub fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml.unwrap_or_default();
    let server = yaml.server.unwrap_or_default();
    let agent = yaml.agent.unwrap_or_default();
    let relay = yaml.relay.unwrap_or_default();

    let host = server
        .host
        .or_else(|| env::string(env::HOST))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = match server.port {
        Some(port) => port,
        None => env::parsed::<u16>(env::PORT)?.unwrap_or(DEFAULT_PORT),
    };

    let tls_yaml = server.tls.unwrap_or_default();
    let tls = if tls_yaml.enabled == Some(false) {
        None
    } else {
        validation::validate_tls(
            tls_yaml.cert_path.or_else(|| env::string(env::TLS_CERT_PATH)),
            tls_yaml.key_path.or_else(|| env::string(env::TLS_KEY_PATH)),
        )?
    };

    let elevenlabs_agent_id = agent
        .agent_id
        .or_else(|| env::string(env::ELEVENLABS_AGENT_ID))
        .unwrap_or_default();

    let elevenlabs_api_key = agent
        .api_key
        .filter(|key| !key.trim().is_empty())
        .or_else(|| env::string(env::ELEVENLABS_API_KEY));

    let elevenlabs_convai_url = agent
        .convai_url
        .or_else(|| env::string(env::ELEVENLABS_CONVAI_URL))
        .unwrap_or_else(|| ELEVENLABS_CONVAI_URL.to_string());

    let elevenlabs_api_url = agent
        .api_url
        .or_else(|| env::string(env::ELEVENLABS_API_URL))
        .unwrap_or_else(|| ELEVENLABS_API_URL.to_string());

    let agent_connect_timeout_ms = match relay.agent_connect_timeout_ms {
        Some(value) => value,
        None => env::parsed(env::AGENT_CONNECT_TIMEOUT_MS)?
            .unwrap_or(DEFAULT_AGENT_CONNECT_TIMEOUT_MS),
    };

    let drain_grace_period_ms = match relay.drain_grace_period_ms {
        Some(value) => value,
        None => env::parsed(env::DRAIN_GRACE_PERIOD_MS)?.unwrap_or(DEFAULT_DRAIN_GRACE_PERIOD_MS),
    };

    let idle_timeout_seconds = match relay.idle_timeout_seconds {
        Some(value) => value,
        None => env::parsed(env::IDLE_TIMEOUT_SECONDS)?.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECONDS),
    };

    let max_concurrent_calls = match relay.max_concurrent_calls {
        Some(value) => Some(value),
        None => env::parsed(env::MAX_CONCURRENT_CALLS)?,
    };

    Ok(ServerConfig {
        host,
        port,
        tls,
        elevenlabs_agent_id,
        elevenlabs_api_key,
        elevenlabs_convai_url,
        elevenlabs_api_url,
        agent_connect_timeout_ms,
        drain_grace_period_ms,
        idle_timeout_seconds,
        max_concurrent_calls,
    })
}
