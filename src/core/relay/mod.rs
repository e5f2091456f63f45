//! Per-call relay between the telephony leg and the agent leg.

mod session;
mod state;

pub use session::{AgentSignal, Flow, RelaySession};
pub use state::{CallSession, Leg, RelayState, StreamAlreadyStarted};
