//! Route composition

pub mod api;
pub mod media_stream;

use axum::{Router, middleware};
use http::{HeaderValue, header};
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::middleware::connection_limit_middleware;
use crate::state::AppState;

/// Build the full application router.
///
/// Layer order for media streams: connection_limit -> handler.
pub fn create_app(app_state: Arc<AppState>) -> Router {
    let media_routes = media_stream::create_media_stream_router().layer(
        middleware::from_fn_with_state(app_state.clone(), connection_limit_middleware),
    );

    // Security headers
    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    api::create_api_router()
        .merge(media_routes)
        .with_state(app_state)
        .layer(security_headers)
}
