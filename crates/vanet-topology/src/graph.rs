//! Road graph contract and an in-memory implementation.
//!
//! The graph is owned by the simulation bootstrap and shared read-only with
//! every component that needs it through a [`GraphHandle`]. Nothing in the
//! cost-sharing core ever mutates it.
//!
//! # Joints
//!
//! A segment (an OSM "way") is an ordered polyline of nodes. Only some of
//! those nodes are *joints*: the two endpoints plus every node shared with
//! another segment. Path search moves joint to joint, so the adjacency only
//! links consecutive joints along a segment. A segment is the unit of cost:
//! every hop along it is charged the segment's cost.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::GeoPoint;

/// Identifier of a map node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub i64);

/// Identifier of a road segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// A road segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: SegmentId,
    /// Polyline nodes in travel order
    pub nodes: Vec<NodeId>,
    /// Subset of `nodes` where the segment can be entered or left
    pub joints: Vec<NodeId>,
    /// Polyline length in metres
    pub length: f64,
    /// Legal speed limit in metres per second
    pub speed_limit: f64,
    pub one_way: bool,
}

impl Segment {
    /// Position of `node` in the polyline.
    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.nodes.iter().position(|&n| n == node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn is_joint(&self, node: NodeId) -> bool {
        self.joints.contains(&node)
    }
}

/// A directed hop from one joint to the next along a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    /// Joint reached by the hop
    pub node: NodeId,
    /// Segment travelled
    pub segment: SegmentId,
}

/// Read-only road graph consumed by the cost-sharing core.
pub trait RoadGraph: fmt::Debug + Send + Sync {
    /// Look up a segment.
    fn segment(&self, id: SegmentId) -> Option<&Segment>;

    /// Outgoing hops from a joint, in a stable order.
    ///
    /// Unknown nodes have no neighbours.
    fn neighbors_of(&self, node: NodeId) -> &[Link];

    /// Position of a node.
    fn position(&self, node: NodeId) -> Option<GeoPoint>;

    /// All segment ids, in ascending order.
    fn segment_ids(&self) -> Vec<SegmentId>;

    /// Distance in metres between two nodes measured along a segment.
    fn distance_along(&self, segment: &Segment, from: NodeId, to: NodeId) -> Option<f64> {
        let a = segment.index_of(from)?;
        let b = segment.index_of(to)?;
        let (lo, hi) = (a.min(b), a.max(b));

        let mut total = 0.0;
        for pair in segment.nodes[lo..=hi].windows(2) {
            let p = self.position(pair[0])?;
            let q = self.position(pair[1])?;
            total += p.distance_to(&q);
        }
        Some(total)
    }

    /// Joint of `segment` closest to `point`.
    fn closest_joint(&self, segment: &Segment, point: GeoPoint) -> Option<NodeId> {
        segment
            .joints
            .iter()
            .filter_map(|&n| self.position(n).map(|p| (n, p.distance_to(&point))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(n, _)| n)
    }
}

/// Shared read-only graph handle.
pub type GraphHandle = Arc<dyn RoadGraph>;

/// In-memory road graph.
#[derive(Debug, Default)]
pub struct StaticRoadGraph {
    positions: HashMap<NodeId, GeoPoint>,
    segments: BTreeMap<SegmentId, Segment>,
    adjacency: HashMap<NodeId, Vec<Link>>,
}

impl StaticRoadGraph {
    /// Start building a graph.
    pub fn builder() -> RoadGraphBuilder {
        RoadGraphBuilder::default()
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.positions.len()
    }

    /// Wrap into a shareable handle.
    pub fn into_handle(self) -> GraphHandle {
        Arc::new(self)
    }
}

impl RoadGraph for StaticRoadGraph {
    fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(&id)
    }

    fn neighbors_of(&self, node: NodeId) -> &[Link] {
        self.adjacency.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    fn position(&self, node: NodeId) -> Option<GeoPoint> {
        self.positions.get(&node).copied()
    }

    fn segment_ids(&self) -> Vec<SegmentId> {
        self.segments.keys().copied().collect()
    }
}

#[derive(Debug)]
struct SegmentSpec {
    id: SegmentId,
    nodes: Vec<NodeId>,
    speed_limit: f64,
    one_way: bool,
}

/// Incremental builder for [`StaticRoadGraph`].
#[derive(Debug, Default)]
pub struct RoadGraphBuilder {
    positions: HashMap<NodeId, GeoPoint>,
    specs: Vec<SegmentSpec>,
}

impl RoadGraphBuilder {
    /// Add a node at a position.
    pub fn node(mut self, id: i64, lat: f64, lon: f64) -> Self {
        self.positions.insert(NodeId(id), GeoPoint::new(lat, lon));
        self
    }

    /// Add a two-way segment.
    pub fn segment(self, id: i64, nodes: &[i64], speed_limit: f64) -> Self {
        self.push_segment(id, nodes, speed_limit, false)
    }

    /// Add a one-way segment, travelled in node order.
    pub fn one_way_segment(self, id: i64, nodes: &[i64], speed_limit: f64) -> Self {
        self.push_segment(id, nodes, speed_limit, true)
    }

    fn push_segment(mut self, id: i64, nodes: &[i64], speed_limit: f64, one_way: bool) -> Self {
        self.specs.push(SegmentSpec {
            id: SegmentId(id),
            nodes: nodes.iter().map(|&n| NodeId(n)).collect(),
            speed_limit,
            one_way,
        });
        self
    }

    /// Validate and freeze the graph.
    pub fn build(self) -> Result<StaticRoadGraph> {
        let mut membership: HashMap<NodeId, usize> = HashMap::new();
        let mut seen = BTreeSet::new();

        for spec in &self.specs {
            if !seen.insert(spec.id) {
                return Err(GraphError::DuplicateSegment(spec.id));
            }
            if spec.nodes.len() < 2 {
                return Err(GraphError::DegenerateSegment(spec.id));
            }
            if spec.speed_limit <= 0.0 || !spec.speed_limit.is_finite() {
                return Err(GraphError::InvalidSpeedLimit {
                    segment: spec.id,
                    speed_limit: spec.speed_limit,
                });
            }
            for node in &spec.nodes {
                if !self.positions.contains_key(node) {
                    return Err(GraphError::UnknownNode {
                        segment: spec.id,
                        node: *node,
                    });
                }
                *membership.entry(*node).or_default() += 1;
            }
        }

        let mut segments = BTreeMap::new();
        for spec in self.specs {
            let last = spec.nodes.len() - 1;
            let joints: Vec<NodeId> = spec
                .nodes
                .iter()
                .enumerate()
                .filter(|(i, n)| *i == 0 || *i == last || membership[*n] > 1)
                .map(|(_, n)| *n)
                .collect();

            let length: f64 = spec
                .nodes
                .windows(2)
                .map(|pair| self.positions[&pair[0]].distance_to(&self.positions[&pair[1]]))
                .sum();

            segments.insert(
                spec.id,
                Segment {
                    id: spec.id,
                    nodes: spec.nodes,
                    joints,
                    length,
                    speed_limit: spec.speed_limit,
                    one_way: spec.one_way,
                },
            );
        }

        // Link consecutive joints, in segment id order so neighbour lists are stable
        let mut adjacency: HashMap<NodeId, Vec<Link>> = HashMap::new();
        for segment in segments.values() {
            for pair in segment.joints.windows(2) {
                adjacency.entry(pair[0]).or_default().push(Link {
                    node: pair[1],
                    segment: segment.id,
                });
                if !segment.one_way {
                    adjacency.entry(pair[1]).or_default().push(Link {
                        node: pair[0],
                        segment: segment.id,
                    });
                }
            }
        }

        Ok(StaticRoadGraph {
            positions: self.positions,
            segments,
            adjacency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two segments crossing at node 2; node 5 is an interior shape point.
    fn cross() -> StaticRoadGraph {
        StaticRoadGraph::builder()
            .node(1, 0.000, 0.000)
            .node(5, 0.000, 0.0005)
            .node(2, 0.000, 0.001)
            .node(3, 0.000, 0.002)
            .node(4, 0.001, 0.001)
            .segment(10, &[1, 5, 2, 3], 14.0)
            .segment(20, &[2, 4], 14.0)
            .build()
            .unwrap()
    }

    #[test]
    fn joints_are_endpoints_and_shared_nodes() {
        let g = cross();
        let s = g.segment(SegmentId(10)).unwrap();
        assert_eq!(s.joints, vec![NodeId(1), NodeId(2), NodeId(3)]);
        assert!(!s.is_joint(NodeId(5)));
        assert!(s.contains(NodeId(5)));
    }

    #[test]
    fn adjacency_links_consecutive_joints() {
        let g = cross();
        let from_two: Vec<_> = g.neighbors_of(NodeId(2)).iter().map(|l| l.node).collect();
        assert_eq!(from_two, vec![NodeId(1), NodeId(3), NodeId(4)]);
        assert!(g.neighbors_of(NodeId(5)).is_empty());
        assert!(g.neighbors_of(NodeId(99)).is_empty());
    }

    #[test]
    fn one_way_segments_link_forward_only() {
        let g = StaticRoadGraph::builder()
            .node(1, 0.0, 0.0)
            .node(2, 0.0, 0.001)
            .one_way_segment(7, &[1, 2], 10.0)
            .build()
            .unwrap();
        assert_eq!(g.neighbors_of(NodeId(1)).len(), 1);
        assert!(g.neighbors_of(NodeId(2)).is_empty());
    }

    #[test]
    fn length_follows_polyline() {
        let g = cross();
        let s = g.segment(SegmentId(10)).unwrap();
        let direct = g.position(NodeId(1)).unwrap().distance_to(&g.position(NodeId(3)).unwrap());
        assert!((s.length - direct).abs() < 1e-6);
        let half = g.distance_along(s, NodeId(1), NodeId(2)).unwrap();
        assert!((half * 2.0 - s.length).abs() < 1e-3);
        assert_eq!(g.distance_along(s, NodeId(2), NodeId(1)), Some(half));
    }

    #[test]
    fn closest_joint_snaps_to_nearest() {
        let g = cross();
        let s = g.segment(SegmentId(10)).unwrap();
        assert_eq!(g.closest_joint(s, GeoPoint::new(0.0, 0.0004)), Some(NodeId(1)));
        assert_eq!(g.closest_joint(s, GeoPoint::new(0.0, 0.0019)), Some(NodeId(3)));
    }

    #[test]
    fn build_rejects_bad_input() {
        let dup = StaticRoadGraph::builder()
            .node(1, 0.0, 0.0)
            .node(2, 0.0, 0.1)
            .segment(1, &[1, 2], 10.0)
            .segment(1, &[2, 1], 10.0)
            .build();
        assert!(matches!(dup, Err(GraphError::DuplicateSegment(SegmentId(1)))));

        let short = StaticRoadGraph::builder().node(1, 0.0, 0.0).segment(3, &[1], 10.0).build();
        assert!(matches!(short, Err(GraphError::DegenerateSegment(_))));

        let dangling = StaticRoadGraph::builder().node(1, 0.0, 0.0).segment(3, &[1, 9], 10.0).build();
        assert!(matches!(dangling, Err(GraphError::UnknownNode { node: NodeId(9), .. })));

        let stopped = StaticRoadGraph::builder()
            .node(1, 0.0, 0.0)
            .node(2, 0.0, 0.1)
            .segment(4, &[1, 2], 0.0)
            .build();
        assert!(matches!(stopped, Err(GraphError::InvalidSpeedLimit { .. })));
    }

    #[test]
    fn segment_ids_are_sorted() {
        let g = cross();
        assert_eq!(g.segment_ids(), vec![SegmentId(10), SegmentId(20)]);
    }
}
