//! Environment variable access for configuration loading.

use std::env;
use std::str::FromStr;

pub const HOST: &str = "HOST";
pub const PORT: &str = "PORT";
pub const TLS_CERT_PATH: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH: &str = "TLS_KEY_PATH";
pub const ELEVENLABS_AGENT_ID: &str = "ELEVENLABS_AGENT_ID";
pub const ELEVENLABS_API_KEY: &str = "ELEVENLABS_API_KEY";
pub const ELEVENLABS_CONVAI_URL: &str = "ELEVENLABS_CONVAI_URL";
pub const ELEVENLABS_API_URL: &str = "ELEVENLABS_API_URL";
pub const AGENT_CONNECT_TIMEOUT_MS: &str = "AGENT_CONNECT_TIMEOUT_MS";
pub const DRAIN_GRACE_PERIOD_MS: &str = "DRAIN_GRACE_PERIOD_MS";
pub const IDLE_TIMEOUT_SECONDS: &str = "IDLE_TIMEOUT_SECONDS";
pub const MAX_CONCURRENT_CALLS: &str = "MAX_CONCURRENT_CALLS";

/// Read a variable, treating unset and blank values alike.
pub fn string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Read and parse a variable.
///
/// Returns `Ok(None)` when the variable is unset or blank, and an error naming
/// the variable when it does not parse.
pub fn parsed<T: FromStr>(key: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    match string(key) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {key}: {value:?} ({e})")),
        None => Ok(None),
    }
}
