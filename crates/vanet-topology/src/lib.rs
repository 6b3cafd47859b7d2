//! VANET Road Topology
//!
//! The static map consumed by the cost-sharing core: nodes, segments (ways)
//! and the adjacency between their joints, plus the geometry used to pick
//! the gossip neighbours of traffic-light controllers.
//!
//! # Graph Contract
//!
//! The core only ever reads the map through [`RoadGraph`]:
//!
//! - `segment(id)` resolves a segment or reports it missing
//! - `neighbors_of(node)` lists `(node, segment)` hops in a stable order
//! - segments expose `length` (metres) and `speed_limit` (m/s)
//!
//! The graph is built once by the simulation bootstrap and shared as a
//! [`GraphHandle`]; there is no global map instance.

mod error;
mod geo;
mod graph;
mod neighbors;

pub use error::{GraphError, Result};
pub use geo::{GeoOffset, GeoPoint, EARTH_RADIUS_M};
pub use graph::{GraphHandle, Link, NodeId, RoadGraph, RoadGraphBuilder, Segment, SegmentId, StaticRoadGraph};
pub use neighbors::{partition_by_direction, Direction, DirectionalNeighbors};

/// Maximum gossip neighbours per controller (one per direction).
pub const MAX_DIRECTIONAL_NEIGHBORS: usize = 4;

const _: () = assert!(Direction::ALL.len() == MAX_DIRECTIONAL_NEIGHBORS);
