use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, twiml};
use crate::state::AppState;
use std::sync::Arc;

/// Create the plain HTTP router
///
/// The inbound call webhook accepts both GET and POST since Twilio can be
/// configured with either method.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route(
            "/twilio/inbound_call",
            get(twiml::inbound_call).post(twiml::inbound_call),
        )
        .layer(TraceLayer::new_for_http())
}
