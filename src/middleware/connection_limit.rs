//! Admission control for media streams
//!
//! Caps the number of concurrent calls at `max_concurrent_calls`. Each
//! admitted WebSocket upgrade carries a [`CallSlot`] that the handler holds
//! for the lifetime of the call.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use callrelay_gateway::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/media-stream", get(media_stream_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::errors::AppError;
use crate::state::{AppState, ConnectionLimitError};

/// Middleware that enforces the concurrent call limit.
///
/// Only WebSocket upgrade requests (detected by the Upgrade header) are
/// counted; anything else passes through. Returns 503 Service Unavailable
/// when the limit is reached.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    match state.try_acquire_call() {
        Ok(slot) => {
            request.extensions_mut().insert(slot);
            next.run(request).await
        }
        Err(ConnectionLimitError::CallLimitReached(max)) => {
            tracing::warn!(
                active_calls = state.active_calls(),
                max,
                "Rejecting media stream: call limit reached"
            );
            AppError::ServiceUnavailable("Server at capacity. Please try again later.".to_string())
                .into_response()
        }
    }
}
