//! Error types for vanet-protocols.

use thiserror::Error;
use vanet_routing::RoutingError;

use crate::message::AgentId;

/// Result type for vanet-protocols operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while exchanging or acting on messages.
///
/// Stale or adversarial reports are never errors; they flow through the
/// outdated-echo path and the voting process.
#[derive(Debug, Error)]
pub enum Error {
    /// A frame could not be encoded or decoded.
    #[error("wire codec error: {0}")]
    Wire(#[from] bincode::Error),

    /// Path search hit a malformed graph.
    #[error("routing failed: {0}")]
    Routing(#[from] RoutingError),

    /// Messages were addressed to an agent the hub does not know.
    #[error("{dropped} message(s) dropped, unknown destination {destination}")]
    UnknownDestination { destination: AgentId, dropped: usize },

    /// The agent was never registered on the hub.
    #[error("agent {0} is not registered on the radio hub")]
    Unregistered(AgentId),
}
