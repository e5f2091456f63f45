//! Twilio Media Stream WebSocket endpoint
//!
//! Each connection carries one call. Inbound frames are JSON text messages
//! with an `event` tag:
//!
//! - **connected**: Transport handshake, ignored
//! - **start**: Stream metadata, carries the `streamSid`
//! - **media**: Base64 mu-law 8 kHz caller audio
//! - **stop**: Caller hung up
//!
//! Outbound frames are `media` (agent audio for the caller) and `clear`
//! (flush buffered playback on barge-in).

mod handler;

pub use handler::media_stream_handler;
