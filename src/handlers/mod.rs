//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `media_stream` - Twilio Media Stream WebSocket relayed to the agent
//! - `twiml` - Inbound call webhook returning connect instructions

pub mod api;
pub mod media_stream;
pub mod twiml;

pub use media_stream::media_stream_handler;
