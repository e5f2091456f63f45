//! Twilio Media Streams wire format.
//!
//! Inbound frames are JSON objects tagged by the `event` field:
//!
//! - `connected` - WebSocket established, before any call metadata
//! - `start` - stream metadata, carries `streamSid`
//! - `media` - base64 audio payload (u-law, 8kHz, mono)
//! - `stop` - the call ended or the stream was stopped
//! - `mark` - playback marker acknowledgment
//! - `dtmf` - keypad digit
//!
//! Outbound frames are `media` (audio for playback) and `clear` (flush any
//! audio queued for playback, used for barge-in).

use serde::{Deserialize, Serialize};

use super::TelephonyEvent;

// =============================================================================
// Inbound Frames (Provider -> Gateway)
// =============================================================================

/// Inbound media-stream frame.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum InboundFrame {
    /// Connection established
    Connected {
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        version: Option<String>,
    },

    /// Stream started
    Start {
        start: StartPayload,
        #[serde(rename = "sequenceNumber", default)]
        sequence_number: Option<String>,
    },

    /// Audio from the caller
    Media {
        media: MediaPayload,
        #[serde(rename = "sequenceNumber", default)]
        sequence_number: Option<String>,
    },

    /// Stream stopped
    Stop {
        #[serde(default)]
        stop: Option<StopPayload>,
    },

    /// Playback marker reached
    Mark { mark: MarkPayload },

    /// Keypad digit pressed
    Dtmf { dtmf: DtmfPayload },
}

/// Payload of the `start` frame.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    pub stream_sid: String,
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub account_sid: Option<String>,
    #[serde(default)]
    pub tracks: Vec<String>,
    #[serde(default)]
    pub media_format: Option<MediaFormat>,
    #[serde(default)]
    pub custom_parameters: Option<serde_json::Value>,
}

/// Audio format advertised in the `start` frame.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormat {
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub channels: Option<u32>,
}

/// Payload of the `media` frame.
#[derive(Debug, Deserialize)]
pub struct MediaPayload {
    /// Base64 audio
    pub payload: String,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub chunk: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Payload of the `stop` frame.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopPayload {
    #[serde(default)]
    pub call_sid: Option<String>,
}

/// Payload of the `mark` frame.
#[derive(Debug, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

/// Payload of the `dtmf` frame.
#[derive(Debug, Deserialize)]
pub struct DtmfPayload {
    pub digit: String,
}

/// Parse a text frame received on the media stream.
pub fn parse_frame(text: &str) -> Result<InboundFrame, serde_json::Error> {
    serde_json::from_str(text)
}

impl InboundFrame {
    /// Wire name of the frame, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            InboundFrame::Connected { .. } => "connected",
            InboundFrame::Start { .. } => "start",
            InboundFrame::Media { .. } => "media",
            InboundFrame::Stop { .. } => "stop",
            InboundFrame::Mark { .. } => "mark",
            InboundFrame::Dtmf { .. } => "dtmf",
        }
    }

    /// Convert into the event that drives the call lifecycle.
    ///
    /// Informational frames (`connected`, `mark`, `dtmf`) have no effect on
    /// the relay and yield `None`.
    pub fn into_event(self) -> Option<TelephonyEvent> {
        match self {
            InboundFrame::Start { start, .. } => {
                if let Some(format) = &start.media_format {
                    tracing::debug!(
                        stream_sid = %start.stream_sid,
                        encoding = ?format.encoding,
                        sample_rate = ?format.sample_rate,
                        channels = ?format.channels,
                        "Media stream format"
                    );
                }
                Some(TelephonyEvent::Start {
                    stream_id: start.stream_sid,
                })
            }
            InboundFrame::Media { media, .. } => Some(TelephonyEvent::Media {
                payload: media.payload,
            }),
            InboundFrame::Stop { .. } => Some(TelephonyEvent::Stop),
            InboundFrame::Connected { protocol, version } => {
                tracing::debug!(?protocol, ?version, "Media stream connected");
                None
            }
            InboundFrame::Mark { mark } => {
                tracing::debug!(mark = %mark.name, "Playback mark reached");
                None
            }
            InboundFrame::Dtmf { dtmf } => {
                tracing::debug!(digit = %dtmf.digit, "DTMF received");
                None
            }
        }
    }
}

// =============================================================================
// Outbound Frames (Gateway -> Provider)
// =============================================================================

/// Outbound media-stream frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundFrame {
    /// Audio for playback into the call
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },

    /// Flush audio queued for playback
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

/// Audio payload of an outbound `media` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMedia {
    /// Base64 audio
    pub payload: String,
}

impl OutboundFrame {
    /// Build a `media` frame.
    pub fn media(stream_sid: impl Into<String>, payload: String) -> Self {
        OutboundFrame::Media {
            stream_sid: stream_sid.into(),
            media: OutboundMedia { payload },
        }
    }

    /// Build a `clear` frame.
    pub fn clear(stream_sid: impl Into<String>) -> Self {
        OutboundFrame::Clear {
            stream_sid: stream_sid.into(),
        }
    }
}
