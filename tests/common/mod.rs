//! Shared helpers for integration tests

#![allow(dead_code)]

use callrelay_gateway::ServerConfig;

/// Minimal configuration pointing the agent at `convai_url`.
pub fn test_config(convai_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        elevenlabs_agent_id: "agent_test".to_string(),
        elevenlabs_api_key: None,
        elevenlabs_convai_url: convai_url.to_string(),
        elevenlabs_api_url: "http://127.0.0.1:1".to_string(),
        agent_connect_timeout_ms: 2_000,
        drain_grace_period_ms: 500,
        idle_timeout_seconds: 30,
        max_concurrent_calls: None,
    }
}
