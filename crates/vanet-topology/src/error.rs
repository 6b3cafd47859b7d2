//! Error types for graph construction.

use thiserror::Error;

use crate::{NodeId, SegmentId};

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while building a road graph.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// Two segments share an id.
    #[error("duplicate segment {0}")]
    DuplicateSegment(SegmentId),

    /// A segment needs at least two nodes.
    #[error("segment {0} has fewer than two nodes")]
    DegenerateSegment(SegmentId),

    /// A segment references a node that was never added.
    #[error("segment {segment} references unknown node {node}")]
    UnknownNode { segment: SegmentId, node: NodeId },

    /// Speed limits must be positive.
    #[error("segment {segment} has invalid speed limit {speed_limit}")]
    InvalidSpeedLimit { segment: SegmentId, speed_limit: f64 },
}
