//! Media stream WebSocket handler
//!
//! One connection is one call. The handler owns the [`RelaySession`] of the
//! call and drives it from this task: inbound frames from the socket, agent
//! signals from the relay channel, and the idle timer. Outbound frames are
//! written by a dedicated sender task fed through a bounded channel.

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::core::relay::{AgentSignal, Flow, RelaySession};
use crate::core::telephony::{TelephonyRoute, TelephonySink, parse_frame};
use crate::state::{AppState, CallSlot};

/// Outbound frame buffer. Agent audio beyond this is dropped.
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Agent signal buffer.
const SIGNAL_BUFFER_SIZE: usize = 256;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Media stream WebSocket handler
///
/// Upgrades the connection and runs the relay for one call. The call slot
/// injected by the admission middleware is held until the call ends.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    slot: Option<Extension<CallSlot>>,
) -> Response {
    let call_id = Uuid::new_v4();
    info!(%call_id, "Media stream upgrade requested");

    let slot = slot.map(|Extension(slot)| slot);
    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_stream(socket, state, call_id, slot))
}

/// Run one call until either leg ends, then tear both down.
async fn handle_media_stream(
    socket: WebSocket,
    app_state: Arc<AppState>,
    call_id: Uuid,
    slot: Option<CallSlot>,
) {
    info!(%call_id, "Media stream connected");

    let (mut sender, mut receiver) = socket.split();
    let (route_tx, mut route_rx) = mpsc::channel::<TelephonyRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing frames
    let mut sender_task = tokio::spawn(async move {
        while let Some(route) = route_rx.recv().await {
            let result = match route {
                TelephonyRoute::Frame(frame) => match serde_json::to_string(&frame) {
                    Ok(json) => sender.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!(%call_id, "Failed to serialize outgoing frame: {}", e);
                        continue;
                    }
                },
                TelephonyRoute::Close => {
                    debug!(%call_id, "Closing media stream");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = result {
                debug!(%call_id, "Failed to write media stream frame: {}", e);
                break;
            }
        }
    });

    let grace = app_state.config.drain_grace_period();
    let sink = TelephonySink::new(route_tx, grace);

    match app_state.agent_factory.create(call_id) {
        Ok(agent) => {
            let mut relay = RelaySession::new(call_id, agent, sink);
            run_relay(&mut relay, &mut receiver, &app_state).await;
        }
        Err(e) => {
            error!(%call_id, "Failed to create agent session: {}", e);
            sink.close().await;
        }
    }

    if tokio::time::timeout(grace, &mut sender_task).await.is_err() {
        debug!(%call_id, "Media stream writer did not finish, aborting");
        sender_task.abort();
    }

    drop(slot);
    info!(%call_id, "Media stream terminated");
}

/// Drive the relay until it drains, then terminate it.
async fn run_relay(
    relay: &mut RelaySession,
    receiver: &mut futures::stream::SplitStream<WebSocket>,
    app_state: &AppState,
) {
    let call_id = relay.call().call_id();
    let (signal_tx, mut signal_rx) = mpsc::channel::<AgentSignal>(SIGNAL_BUFFER_SIZE);

    let idle_timeout = app_state.config.idle_timeout();
    let mut idle_deadline = idle_timeout.map(|timeout| Instant::now() + timeout);

    let mut flow = relay.start(signal_tx).await;

    while flow == Flow::Continue {
        flow = select! {
            msg_result = receiver.next() => {
                if let Some(timeout) = idle_timeout {
                    idle_deadline = Some(Instant::now() + timeout);
                }

                match msg_result {
                    Some(Ok(Message::Text(text))) => process_text(&text, relay).await,
                    Some(Ok(Message::Binary(data))) => {
                        debug!(%call_id, "Ignoring binary frame: {} bytes", data.len());
                        Flow::Continue
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        relay.handle_telephony_closed("closed by provider")
                    }
                    Some(Ok(_)) => Flow::Continue,
                    Some(Err(e)) => {
                        warn!(%call_id, "Media stream error: {}", e);
                        relay.handle_telephony_closed("transport error")
                    }
                }
            }
            Some(signal) = signal_rx.recv() => relay.handle_agent_signal(signal).await,
            _ = idle_expired(idle_deadline) => {
                warn!(
                    %call_id,
                    "Media stream idle for {}s, closing",
                    idle_timeout.map(|t| t.as_secs()).unwrap_or_default()
                );
                relay.handle_telephony_closed("idle timeout")
            }
        };
    }

    // Agent signals are no longer consumed
    drop(signal_rx);
    relay.terminate().await;
}

/// Parse and apply one text frame.
async fn process_text(text: &str, relay: &mut RelaySession) -> Flow {
    let frame = match parse_frame(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(
                call_id = %relay.call().call_id(),
                "Skipping malformed media stream frame: {}", e
            );
            return Flow::Continue;
        }
    };

    trace!(call_id = %relay.call().call_id(), event = frame.name(), "Media stream frame");

    match frame.into_event() {
        Some(event) => relay.handle_telephony_event(event).await,
        None => Flow::Continue,
    }
}

async fn idle_expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
