//! Error types for vanet-sim.

use thiserror::Error;
use vanet_protocols::{AgentId, AgentKind};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the simulation harness.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),

    #[error("agent {0} already exists")]
    DuplicateAgent(AgentId),

    /// The operation only applies to another kind of agent.
    #[error("agent {agent} is not a {expected:?}")]
    WrongRole { agent: AgentId, expected: AgentKind },

    #[error(transparent)]
    Protocol(#[from] vanet_protocols::Error),

    #[error("timeline encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}
