//! Configuration validation.

use std::path::PathBuf;

use url::Url;

use super::TlsConfig;

/// The agent id is required and ends up in a query string.
pub fn validate_agent_id(agent_id: &str) -> Result<(), String> {
    if agent_id.trim().is_empty() {
        return Err(
            "ELEVENLABS_AGENT_ID is required (set it in the environment or agent.agent_id in YAML)"
                .to_string(),
        );
    }

    if !agent_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(format!(
            "ELEVENLABS_AGENT_ID contains invalid characters: {agent_id:?}"
        ));
    }

    Ok(())
}

/// The conversation endpoint must be a WebSocket URL.
pub fn validate_convai_url(url: &str) -> Result<(), String> {
    let parsed = Url::parse(url).map_err(|e| format!("Invalid ELEVENLABS_CONVAI_URL {url:?}: {e}"))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        scheme => Err(format!(
            "ELEVENLABS_CONVAI_URL must use ws or wss, got {scheme:?}"
        )),
    }
}

/// The REST API base must be an HTTP URL.
pub fn validate_api_url(url: &str) -> Result<(), String> {
    let parsed = Url::parse(url).map_err(|e| format!("Invalid ELEVENLABS_API_URL {url:?}: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(format!(
            "ELEVENLABS_API_URL must use http or https, got {scheme:?}"
        )),
    }
}

/// TLS needs both a certificate and a key, or neither.
pub fn validate_tls(
    cert_path: Option<String>,
    key_path: Option<String>,
) -> Result<Option<TlsConfig>, String> {
    match (cert_path, key_path) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err("TLS certificate configured without a private key".to_string()),
        (None, Some(_)) => Err("TLS private key configured without a certificate".to_string()),
    }
}

pub fn validate_timeouts(connect_timeout_ms: u64, drain_grace_period_ms: u64) -> Result<(), String> {
    if connect_timeout_ms == 0 {
        return Err("AGENT_CONNECT_TIMEOUT_MS must be greater than 0".to_string());
    }
    if drain_grace_period_ms == 0 {
        return Err("DRAIN_GRACE_PERIOD_MS must be greater than 0".to_string());
    }
    Ok(())
}

pub fn validate_max_concurrent_calls(max: Option<usize>) -> Result<(), String> {
    if max == Some(0) {
        return Err("MAX_CONCURRENT_CALLS must be greater than 0 when set".to_string());
    }
    Ok(())
}
