//! Inbound call webhook.
//!
//! Twilio requests this endpoint when a call comes in. The TwiML response
//! connects the call to a bidirectional media stream on `/media-stream` of
//! the host Twilio used to reach us.

use axum::{
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::errors::{AppError, AppResult};

/// Path of the media stream WebSocket.
pub const MEDIA_STREAM_PATH: &str = "/media-stream";

/// Render the TwiML document for `host`.
pub fn connect_stream_twiml(host: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Connect><Stream url="wss://{host}{MEDIA_STREAM_PATH}" /></Connect></Response>"#
    )
}

/// Host names end up inside an XML attribute; accept host[:port] characters only.
fn is_valid_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']' | '_'))
}

/// Inbound call handler (GET or POST)
///
/// Returns 400 when the request carries no usable `Host` header.
pub async fn inbound_call(headers: HeaderMap) -> AppResult<Response> {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .ok_or_else(|| AppError::BadRequest("Missing Host header".to_string()))?;

    if !is_valid_host(host) {
        return Err(AppError::BadRequest(format!("Invalid Host header: {host:?}")));
    }

    tracing::info!(host, "Inbound call, connecting media stream");

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml")],
        connect_stream_twiml(host),
    )
        .into_response())
}
