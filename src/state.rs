//! Process-wide application state.
//!
//! Calls share nothing but the configuration, the agent factory and the
//! active-call counter used for admission control.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use crate::config::ServerConfig;
use crate::core::agent::{AgentFactory, AgentResult, ElevenLabsAgentFactory};

/// Returned when a call cannot be admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionLimitError {
    #[error("Concurrent call limit of {0} reached")]
    CallLimitReached(usize),
}

/// Shared state handed to every route.
pub struct AppState {
    pub config: ServerConfig,
    pub agent_factory: Arc<dyn AgentFactory>,
    active_calls: Arc<AtomicUsize>,
}

impl AppState {
    /// Build the state with an ElevenLabs agent factory from `config`.
    pub fn new(config: ServerConfig) -> AgentResult<Arc<Self>> {
        let factory = ElevenLabsAgentFactory::new(config.agent_config())?;
        Ok(Self::with_agent_factory(config, Arc::new(factory)))
    }

    /// Build the state with a custom agent factory.
    pub fn with_agent_factory(config: ServerConfig, agent_factory: Arc<dyn AgentFactory>) -> Arc<Self> {
        Arc::new(Self {
            config,
            agent_factory,
            active_calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Number of media streams currently admitted.
    pub fn active_calls(&self) -> usize {
        self.active_calls.load(Ordering::SeqCst)
    }

    /// Reserve a call slot, honoring `max_concurrent_calls`.
    ///
    /// The slot is released when the last clone of the returned [`CallSlot`]
    /// is dropped.
    pub fn try_acquire_call(&self) -> Result<CallSlot, ConnectionLimitError> {
        let max = self.config.max_concurrent_calls;
        self.active_calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| match max {
                Some(max) if current >= max => None,
                _ => Some(current + 1),
            })
            .map_err(|_| ConnectionLimitError::CallLimitReached(max.unwrap_or_default()))?;

        Ok(CallSlot(Arc::new(SlotGuard {
            active_calls: self.active_calls.clone(),
        })))
    }
}

#[derive(Debug)]
struct SlotGuard {
    active_calls: Arc<AtomicUsize>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.active_calls.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An admitted call. Cloneable so it can travel as a request extension.
#[derive(Debug, Clone)]
pub struct CallSlot(Arc<SlotGuard>);
