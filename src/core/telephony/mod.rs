//! Telephony leg of a call.
//!
//! Covers the Twilio Media Streams protocol ([`messages`]), the lifecycle
//! events it produces ([`TelephonyEvent`]) and the outbound half of the
//! media-stream socket ([`TelephonySink`]). The socket itself is owned by the
//! media-stream handler.

pub mod messages;

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub use messages::{InboundFrame, OutboundFrame, OutboundMedia, parse_frame};

/// Lifecycle event parsed from the telephony leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyEvent {
    /// The media stream started
    Start {
        /// Stream identifier assigned by the provider
        stream_id: String,
    },
    /// Caller audio, base64 encoded
    Media {
        /// Base64 audio payload
        payload: String,
    },
    /// The media stream stopped
    Stop,
}

/// Connection state of the telephony leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TelephonyConnectionState {
    /// Socket accepted, stream not started yet
    #[default]
    Connecting,
    /// Stream started, audio can flow
    Streaming,
    /// Stream stopped or socket closed
    Closed,
}

impl fmt::Display for TelephonyConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelephonyConnectionState::Connecting => write!(f, "Connecting"),
            TelephonyConnectionState::Streaming => write!(f, "Streaming"),
            TelephonyConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Routing instruction for the media-stream writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyRoute {
    /// Serialize and send a frame
    Frame(OutboundFrame),
    /// Send a close frame and stop writing
    Close,
}

/// Outcome of queueing a frame on the telephony leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame handed to the writer
    Queued,
    /// Writer saturated, frame dropped
    Dropped,
    /// Writer gone, frame dropped
    Closed,
}

/// Outbound half of the telephony leg.
///
/// Audio is never queued beyond the writer channel: when the channel is full
/// the chunk is dropped. Control frames (`clear`, close) wait for room, bounded
/// by `control_timeout`, because their ordering relative to audio matters.
#[derive(Debug, Clone)]
pub struct TelephonySink {
    tx: mpsc::Sender<TelephonyRoute>,
    control_timeout: Duration,
}

impl TelephonySink {
    /// Create a sink feeding the given writer channel.
    pub fn new(tx: mpsc::Sender<TelephonyRoute>, control_timeout: Duration) -> Self {
        Self {
            tx,
            control_timeout,
        }
    }

    /// Queue an audio frame, dropping it if the writer is saturated.
    pub fn send_audio(&self, frame: OutboundFrame) -> SendOutcome {
        self.try_send_frame(frame)
    }

    /// Queue a control frame only if the writer has room right now.
    pub fn try_send_control(&self, frame: OutboundFrame) -> SendOutcome {
        self.try_send_frame(frame)
    }

    fn try_send_frame(&self, frame: OutboundFrame) -> SendOutcome {
        match self.tx.try_send(TelephonyRoute::Frame(frame)) {
            Ok(()) => SendOutcome::Queued,
            Err(TrySendError::Full(_)) => SendOutcome::Dropped,
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Queue a control frame, waiting for room in the writer channel.
    pub async fn send_control(&self, frame: OutboundFrame) -> SendOutcome {
        self.send_route(TelephonyRoute::Frame(frame)).await
    }

    /// Ask the writer to close the media stream.
    pub async fn close(&self) -> SendOutcome {
        self.send_route(TelephonyRoute::Close).await
    }

    async fn send_route(&self, route: TelephonyRoute) -> SendOutcome {
        match tokio::time::timeout(self.control_timeout, self.tx.send(route)).await {
            Ok(Ok(())) => SendOutcome::Queued,
            Ok(Err(_)) => SendOutcome::Closed,
            Err(_) => SendOutcome::Dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_audio_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = TelephonySink::new(tx, Duration::from_millis(50));

        assert_eq!(
            sink.send_audio(OutboundFrame::media("CA1", "AAAA".to_string())),
            SendOutcome::Queued
        );
        assert_eq!(
            sink.send_audio(OutboundFrame::media("CA1", "BBBB".to_string())),
            SendOutcome::Dropped
        );

        assert_eq!(
            rx.recv().await,
            Some(TelephonyRoute::Frame(OutboundFrame::media(
                "CA1",
                "AAAA".to_string()
            )))
        );
    }

    #[tokio::test]
    async fn test_control_frame_times_out_when_writer_stuck() {
        let (tx, _rx) = mpsc::channel(1);
        let sink = TelephonySink::new(tx, Duration::from_millis(20));

        sink.send_audio(OutboundFrame::media("CA1", "AAAA".to_string()));
        assert_eq!(
            sink.send_control(OutboundFrame::clear("CA1")).await,
            SendOutcome::Dropped
        );
    }

    #[tokio::test]
    async fn test_close_after_writer_gone() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let sink = TelephonySink::new(tx, Duration::from_millis(20));

        assert_eq!(sink.close().await, SendOutcome::Closed);
        assert_eq!(
            sink.send_audio(OutboundFrame::media("CA1", "AAAA".to_string())),
            SendOutcome::Closed
        );
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(TelephonyConnectionState::Connecting.to_string(), "Connecting");
        assert_eq!(TelephonyConnectionState::Streaming.to_string(), "Streaming");
        assert_eq!(TelephonyConnectionState::Closed.to_string(), "Closed");
    }
}
