//! Per-call state machine.

use std::fmt;

use uuid::Uuid;

use crate::core::agent::AgentConnectionState;
use crate::core::telephony::TelephonyConnectionState;

/// Lifecycle of the relay between the two legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayState {
    /// Waiting for the agent leg to open
    #[default]
    Initializing,
    /// Both legs up, audio flows
    Active,
    /// One leg ended, tearing down the other
    Draining,
    /// Both legs released
    Terminated,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::Initializing => write!(f, "Initializing"),
            RelayState::Active => write!(f, "Active"),
            RelayState::Draining => write!(f, "Draining"),
            RelayState::Terminated => write!(f, "Terminated"),
        }
    }
}

/// One side of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    /// Telephony provider media stream
    Telephony,
    /// Conversational AI session
    Agent,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Telephony => write!(f, "telephony"),
            Leg::Agent => write!(f, "agent"),
        }
    }
}

/// Returned by [`CallSession::start_stream`] when a stream id is already set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAlreadyStarted {
    /// The id kept
    pub current: String,
}

/// State of one phone call.
///
/// Owned by the relay loop of the call, which is its only writer.
#[derive(Debug, Clone)]
pub struct CallSession {
    call_id: Uuid,
    stream_id: Option<String>,
    telephony_state: TelephonyConnectionState,
    agent_state: AgentConnectionState,
    relay_state: RelayState,
    drain_initiator: Option<Leg>,
    clear_pending: bool,
}

impl CallSession {
    pub fn new(call_id: Uuid) -> Self {
        Self {
            call_id,
            stream_id: None,
            telephony_state: TelephonyConnectionState::Connecting,
            agent_state: AgentConnectionState::Connecting,
            relay_state: RelayState::Initializing,
            drain_initiator: None,
            clear_pending: false,
        }
    }

    pub fn call_id(&self) -> Uuid {
        self.call_id
    }

    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    pub fn telephony_state(&self) -> TelephonyConnectionState {
        self.telephony_state
    }

    pub fn agent_state(&self) -> AgentConnectionState {
        self.agent_state
    }

    pub fn relay_state(&self) -> RelayState {
        self.relay_state
    }

    /// Leg whose termination started the drain.
    pub fn drain_initiator(&self) -> Option<Leg> {
        self.drain_initiator
    }

    /// Record the stream id and mark the telephony leg as streaming.
    ///
    /// The stream id is set once; later calls leave the session unchanged.
    pub fn start_stream(&mut self, stream_id: String) -> Result<(), StreamAlreadyStarted> {
        if let Some(current) = &self.stream_id {
            return Err(StreamAlreadyStarted {
                current: current.clone(),
            });
        }
        self.stream_id = Some(stream_id);
        if self.telephony_state == TelephonyConnectionState::Connecting {
            self.telephony_state = TelephonyConnectionState::Streaming;
        }
        Ok(())
    }

    /// The agent leg opened. Returns `true` when the relay became active.
    pub fn agent_opened(&mut self) -> bool {
        if self.agent_state == AgentConnectionState::Connecting {
            self.agent_state = AgentConnectionState::Open;
        }
        if self.relay_state == RelayState::Initializing
            && self.agent_state == AgentConnectionState::Open
        {
            self.relay_state = RelayState::Active;
            return true;
        }
        false
    }

    /// Whether caller audio can be forwarded to the agent.
    pub fn can_forward(&self) -> bool {
        self.relay_state == RelayState::Active
            && self.telephony_state == TelephonyConnectionState::Streaming
            && self.agent_state == AgentConnectionState::Open
    }

    /// Whether agent audio can be played into the call.
    pub fn can_play(&self) -> bool {
        !self.is_terminated()
            && self.telephony_state == TelephonyConnectionState::Streaming
            && self.stream_id.is_some()
    }

    /// An interruption asked for playback to be cleared.
    pub fn request_clear(&mut self) {
        self.clear_pending = true;
    }

    /// Whether a clear must reach the writer before more agent audio.
    pub fn clear_pending(&self) -> bool {
        self.clear_pending
    }

    /// The clear frame was queued.
    pub fn clear_sent(&mut self) {
        self.clear_pending = false;
    }

    /// Start draining because `initiator` ended.
    ///
    /// Returns `true` on the first call only; the initiator is kept.
    pub fn begin_drain(&mut self, initiator: Leg) -> bool {
        match self.relay_state {
            RelayState::Initializing | RelayState::Active => {
                self.relay_state = RelayState::Draining;
                self.drain_initiator = Some(initiator);
                true
            }
            RelayState::Draining | RelayState::Terminated => false,
        }
    }

    pub fn telephony_closed(&mut self) {
        self.telephony_state = TelephonyConnectionState::Closed;
    }

    pub fn agent_closed(&mut self) {
        self.agent_state = AgentConnectionState::Closed;
    }

    /// Both legs released.
    pub fn terminate(&mut self) {
        self.telephony_state = TelephonyConnectionState::Closed;
        self.agent_state = AgentConnectionState::Closed;
        self.relay_state = RelayState::Terminated;
    }

    pub fn is_terminated(&self) -> bool {
        self.relay_state == RelayState::Terminated
    }
}
