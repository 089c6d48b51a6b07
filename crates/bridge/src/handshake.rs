//! Handshake negotiation
//!
//! `rules` goes out as soon as the transport opens. The agent may answer with
//! `info` (any number of times) and becomes usable on `ready`. An `error`
//! before `ready` means the agent refused the rules.

use tracing::{debug, info};

use crate::protocol::{AgentInfo, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Idle,
    AwaitingReady,
    Complete,
}

/// Outcome of feeding one agent message to the negotiator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStep {
    /// Still waiting for `ready`.
    Pending,
    /// The agent just became ready.
    Ready,
    /// The agent refused to negotiate.
    Rejected(String),
    /// Not meaningful in the current phase.
    Ignored,
}

#[derive(Debug)]
pub struct HandshakeNegotiator {
    phase: HandshakePhase,
    agent: Option<AgentInfo>,
}

impl HandshakeNegotiator {
    pub fn new() -> Self {
        Self {
            phase: HandshakePhase::Idle,
            agent: None,
        }
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == HandshakePhase::Complete
    }

    /// Agent identification from the last `info`, if any.
    pub fn agent(&self) -> Option<&AgentInfo> {
        self.agent.as_ref()
    }

    /// Start negotiating on a freshly opened transport. Returns the opening frame.
    pub fn begin(&mut self) -> Message {
        self.phase = HandshakePhase::AwaitingReady;
        self.agent = None;
        Message::Rules
    }

    pub fn on_info(&mut self, agent: AgentInfo) -> HandshakeStep {
        info!(
            "agent {} {}{}",
            agent.name,
            agent.version,
            agent
                .author
                .as_deref()
                .map(|a| format!(" by {a}"))
                .unwrap_or_default()
        );
        self.agent = Some(agent);
        match self.phase {
            HandshakePhase::AwaitingReady => HandshakeStep::Pending,
            _ => HandshakeStep::Ignored,
        }
    }

    pub fn on_ready(&mut self) -> HandshakeStep {
        match self.phase {
            HandshakePhase::AwaitingReady => {
                self.phase = HandshakePhase::Complete;
                HandshakeStep::Ready
            }
            phase => {
                debug!("ignoring ready in phase {:?}", phase);
                HandshakeStep::Ignored
            }
        }
    }

    pub fn on_error(&mut self, reason: &str) -> HandshakeStep {
        match self.phase {
            HandshakePhase::AwaitingReady => {
                self.phase = HandshakePhase::Idle;
                HandshakeStep::Rejected(reason.to_string())
            }
            _ => HandshakeStep::Ignored,
        }
    }

    /// Forget everything; used when the transport goes away.
    pub fn reset(&mut self) {
        self.phase = HandshakePhase::Idle;
        self.agent = None;
    }
}

impl Default for HandshakeNegotiator {
    fn default() -> Self {
        Self::new()
    }
}
