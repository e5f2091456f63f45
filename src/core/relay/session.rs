//! Relay session: binds the telephony leg and the agent leg of one call.
//!
//! The media-stream handler owns a [`RelaySession`] and drives it from a
//! single task: telephony events come from the socket reader, agent signals
//! from the channel registered in [`RelaySession::start`]. Every handler
//! returns a [`Flow`]; on [`Flow::Drain`] the driver stops reading and calls
//! [`RelaySession::terminate`].

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use super::state::{CallSession, Leg};
use crate::core::agent::{
    AgentConnectionState, AgentEvent, AgentEventCallback, AgentStateCallback, AgentStateChange,
    BoxedAgent,
};
use crate::core::codec;
use crate::core::telephony::{OutboundFrame, SendOutcome, TelephonyEvent, TelephonySink};

/// Something the agent leg reported, in the order it reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentSignal {
    /// Connection state changed
    State(AgentStateChange),
    /// Conversation event
    Event(AgentEvent),
}

/// What the driver should do after handling an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep relaying
    Continue,
    /// A leg ended: stop reading and terminate
    Drain,
}

/// The relay for one call.
pub struct RelaySession {
    call: CallSession,
    agent: BoxedAgent,
    telephony: TelephonySink,
}

impl RelaySession {
    pub fn new(call_id: Uuid, agent: BoxedAgent, telephony: TelephonySink) -> Self {
        Self {
            call: CallSession::new(call_id),
            agent,
            telephony,
        }
    }

    /// Current call state.
    pub fn call(&self) -> &CallSession {
        &self.call
    }

    fn call_id(&self) -> Uuid {
        self.call.call_id()
    }

    /// Wire the agent callbacks into `signals` and start opening the agent leg.
    pub async fn start(&mut self, signals: mpsc::Sender<AgentSignal>) -> Flow {
        let state_tx = signals.clone();
        let state_cb: AgentStateCallback = Arc::new(move |change: AgentStateChange| {
            let tx = state_tx.clone();
            Box::pin(async move {
                let _ = tx.send(AgentSignal::State(change)).await;
            })
        });

        let event_tx = signals;
        let event_cb: AgentEventCallback = Arc::new(move |event: AgentEvent| {
            let tx = event_tx.clone();
            Box::pin(async move {
                let _ = tx.send(AgentSignal::Event(event)).await;
            })
        });

        let registered = self
            .agent
            .on_state_change(state_cb)
            .and_then(|_| self.agent.on_event(event_cb));

        let connected = match registered {
            Ok(()) => self.agent.connect().await,
            Err(e) => Err(e),
        };

        match connected {
            Ok(()) => {
                tracing::debug!(
                    call_id = %self.call_id(),
                    provider = %self.agent.provider_info()["provider"],
                    "Opening agent leg"
                );
                Flow::Continue
            }
            Err(e) => {
                tracing::error!(call_id = %self.call_id(), "Failed to start agent leg: {}", e);
                self.call.agent_closed();
                self.call.begin_drain(Leg::Agent);
                Flow::Drain
            }
        }
    }

    /// Apply one event from the telephony leg.
    pub async fn handle_telephony_event(&mut self, event: TelephonyEvent) -> Flow {
        if self.call.is_terminated() {
            return Flow::Drain;
        }

        match event {
            TelephonyEvent::Start { stream_id } => {
                match self.call.start_stream(stream_id) {
                    Ok(()) => tracing::info!(
                        call_id = %self.call_id(),
                        stream_sid = self.call.stream_id().unwrap_or_default(),
                        "Media stream started"
                    ),
                    Err(e) => tracing::warn!(
                        call_id = %self.call_id(),
                        stream_sid = %e.current,
                        "Duplicate start ignored"
                    ),
                }
                Flow::Continue
            }
            TelephonyEvent::Media { payload } => {
                if !self.call.can_forward() {
                    tracing::trace!(
                        call_id = %self.call_id(),
                        relay_state = %self.call.relay_state(),
                        "Relay not active, dropping caller audio"
                    );
                    return Flow::Continue;
                }

                match codec::decode(&payload) {
                    Ok(chunk) => {
                        if let Err(e) = self.agent.send_user_audio(chunk).await {
                            tracing::warn!(call_id = %self.call_id(), "Failed to forward caller audio: {}", e);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(call_id = %self.call_id(), "Skipping caller audio: {}", e);
                    }
                }
                Flow::Continue
            }
            TelephonyEvent::Stop => {
                tracing::info!(
                    call_id = %self.call_id(),
                    stream_sid = self.call.stream_id().unwrap_or_default(),
                    "Media stream stopped"
                );
                self.call.telephony_closed();
                self.call.begin_drain(Leg::Telephony);
                Flow::Drain
            }
        }
    }

    /// The telephony socket closed, failed or went idle.
    pub fn handle_telephony_closed(&mut self, reason: &str) -> Flow {
        self.call.telephony_closed();
        if self.call.begin_drain(Leg::Telephony) {
            tracing::info!(call_id = %self.call_id(), reason, "Telephony leg closed");
        }
        Flow::Drain
    }

    /// Apply one signal from the agent leg.
    pub async fn handle_agent_signal(&mut self, signal: AgentSignal) -> Flow {
        if self.call.is_terminated() {
            return Flow::Drain;
        }

        match signal {
            AgentSignal::State(change) => match change.state {
                AgentConnectionState::Open => {
                    if self.call.agent_opened() {
                        tracing::info!(call_id = %self.call_id(), "Relay active");
                    }
                    Flow::Continue
                }
                AgentConnectionState::Closed => {
                    self.call.agent_closed();
                    if self.call.begin_drain(Leg::Agent) {
                        tracing::info!(
                            call_id = %self.call_id(),
                            reason = change.reason.as_deref().unwrap_or("unknown"),
                            "Agent leg closed"
                        );
                    }
                    Flow::Drain
                }
                AgentConnectionState::Connecting => Flow::Continue,
            },
            AgentSignal::Event(event) => {
                self.handle_agent_event(event).await;
                Flow::Continue
            }
        }
    }

    async fn handle_agent_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::Audio(chunk) => {
                if !self.call.can_play() {
                    tracing::trace!(call_id = %self.call_id(), "Stream not started, dropping agent audio");
                    return;
                }
                if self.call.clear_pending() && !self.flush_clear(false).await {
                    tracing::debug!(call_id = %self.call_id(), "Clear still pending, dropping agent audio");
                    return;
                }
                let Some(stream_id) = self.call.stream_id() else {
                    return;
                };

                let frame = OutboundFrame::media(stream_id, codec::encode(&chunk));
                match self.telephony.send_audio(frame) {
                    SendOutcome::Queued => {}
                    SendOutcome::Dropped => {
                        tracing::warn!(call_id = %self.call_id(), "Telephony writer saturated, dropping agent audio");
                    }
                    SendOutcome::Closed => {
                        tracing::debug!(call_id = %self.call_id(), "Telephony writer gone, dropping agent audio");
                    }
                }
            }
            AgentEvent::Interruption => {
                if !self.call.can_play() {
                    return;
                }
                self.call.request_clear();
                self.flush_clear(true).await;
            }
            AgentEvent::Transcript { role, text } => {
                tracing::info!(call_id = %self.call_id(), %role, "Transcript: {}", text);
            }
            AgentEvent::Other { kind } => {
                tracing::debug!(call_id = %self.call_id(), kind = %kind, "Agent event");
            }
        }
    }

    /// Queue the pending clear frame. Returns `true` once it is queued.
    ///
    /// With `wait`, waits for room in the writer up to the control timeout;
    /// otherwise only tries once.
    async fn flush_clear(&mut self, wait: bool) -> bool {
        let Some(stream_id) = self.call.stream_id() else {
            return false;
        };
        let frame = OutboundFrame::clear(stream_id);

        let outcome = if wait {
            self.telephony.send_control(frame).await
        } else {
            self.telephony.try_send_control(frame)
        };

        match outcome {
            SendOutcome::Queued => {
                self.call.clear_sent();
                tracing::debug!(call_id = %self.call_id(), "Playback cleared");
                true
            }
            outcome => {
                tracing::warn!(call_id = %self.call_id(), ?outcome, "Clear not queued, holding agent audio back");
                false
            }
        }
    }

    /// Release both legs. Idempotent.
    ///
    /// The agent gets its close grace period to acknowledge; the telephony
    /// writer is asked to close the media stream.
    pub async fn terminate(&mut self) {
        if self.call.is_terminated() {
            return;
        }

        let initiator = self.call.drain_initiator();
        tracing::debug!(
            call_id = %self.call_id(),
            initiator = ?initiator,
            agent_state = %self.agent.connection_state(),
            "Terminating relay"
        );
        let conversation_id = self.agent.provider_info()["conversation_id"]
            .as_str()
            .map(str::to_string);

        if let Err(e) = self.agent.disconnect().await {
            tracing::warn!(call_id = %self.call_id(), "Failed to disconnect agent: {}", e);
        }

        if self.telephony.close().await == SendOutcome::Dropped {
            tracing::warn!(call_id = %self.call_id(), "Telephony writer did not accept close");
        }

        self.call.terminate();
        tracing::info!(
            call_id = %self.call_id(),
            stream_sid = self.call.stream_id().unwrap_or_default(),
            conversation_id = conversation_id.as_deref().unwrap_or_default(),
            "Call terminated"
        );
    }
}
