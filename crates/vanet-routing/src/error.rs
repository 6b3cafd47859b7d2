//! Error types for vanet-routing.

use thiserror::Error;
use vanet_topology::{NodeId, SegmentId};

/// Result type for path search.
pub type Result<T> = std::result::Result<T, RoutingError>;

/// The graph snapshot is malformed. "No path" is not an error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RoutingError {
    /// An adjacency link points at a segment the graph does not know.
    #[error("dangling segment reference {0}")]
    UnknownSegment(SegmentId),

    /// An adjacency link leads to a node that is not a joint of its segment.
    #[error("dangling node reference {0}")]
    UnknownNode(NodeId),
}
