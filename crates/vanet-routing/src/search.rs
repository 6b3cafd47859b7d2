//! Cost-aware shortest path search.
//!
//! The search expands joints (segment endpoints and intersections) from a
//! priority frontier ordered by distance-so-far. Edge weights come from an
//! [`EdgeCost`] view that may change between searches, so nothing is cached
//! across calls.
//!
//! # Relaxation
//!
//! A node is re-enqueued whenever a strictly shorter distance is found;
//! stale frontier entries are skipped on pop. On equal distance the first
//! predecessor found is kept. The search stops as soon as the target is
//! popped.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use tracing::{trace, warn};
use vanet_consensus::CostKnowledgeBase;
use vanet_topology::{GeoPoint, NodeId, RoadGraph, Segment, SegmentId};

use crate::error::{Result, RoutingError};

/// Source of segment weights for a search.
pub trait EdgeCost {
    /// Cost of driving the whole segment.
    fn edge_cost(&mut self, segment: &Segment) -> f64;
}

impl EdgeCost for CostKnowledgeBase {
    fn edge_cost(&mut self, segment: &Segment) -> f64 {
        self.way_cost(segment)
    }
}

/// Fixed costs; segments without an entry cost their length.
impl EdgeCost for HashMap<SegmentId, f64> {
    fn edge_cost(&mut self, segment: &Segment) -> f64 {
        self.get(&segment.id).copied().unwrap_or(segment.length)
    }
}

/// A search endpoint: a place on a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoutePoint {
    pub segment: SegmentId,
    /// Preferred joint; snapped when missing or not a joint of `segment`
    pub node: Option<NodeId>,
    /// Where the agent actually is, used for snapping
    pub position: Option<GeoPoint>,
}

impl RoutePoint {
    /// Endpoint at a node of a segment.
    pub fn at_node(segment: SegmentId, node: NodeId) -> Self {
        Self {
            segment,
            node: Some(node),
            position: None,
        }
    }

    /// Endpoint at an arbitrary position on a segment.
    pub fn at_position(segment: SegmentId, position: GeoPoint) -> Self {
        Self {
            segment,
            node: None,
            position: Some(position),
        }
    }

    /// Resolve to a joint of the segment, snapping to the closest one.
    fn resolve(&self, graph: &dyn RoadGraph) -> Option<NodeId> {
        let segment = graph.segment(self.segment)?;
        if let Some(node) = self.node {
            if segment.is_joint(node) {
                return Some(node);
            }
        }
        let reference = self
            .position
            .or_else(|| self.node.and_then(|n| graph.position(n)))?;
        graph.closest_joint(segment, reference)
    }
}

/// A found route.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    /// Joints from start to stop, both included
    pub intersections: Vec<NodeId>,
    /// Segment driven for each hop, in order
    pub hops: Vec<SegmentId>,
    /// Distinct segments traversed
    pub segments: BTreeSet<SegmentId>,
    /// Total weight at search time
    pub cost: f64,
}

impl Route {
    pub fn start(&self) -> Option<NodeId> {
        self.intersections.first().copied()
    }

    pub fn stop(&self) -> Option<NodeId> {
        self.intersections.last().copied()
    }

    pub fn contains_segment(&self, segment: SegmentId) -> bool {
        self.segments.contains(&segment)
    }
}

#[derive(Debug, Clone, Copy)]
struct Frontier {
    dist: f64,
    seq: u64,
    node: NodeId,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Min-heap on distance, FIFO on ties
impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Path search bound to one graph snapshot.
#[derive(Clone, Copy)]
pub struct CostAwarePathSearch<'g> {
    graph: &'g dyn RoadGraph,
}

impl<'g> CostAwarePathSearch<'g> {
    pub fn new(graph: &'g dyn RoadGraph) -> Self {
        Self { graph }
    }

    /// Weight of a hop along `segment` into `to`: the whole segment cost,
    /// however many joints the segment has.
    fn hop_cost<C: EdgeCost + ?Sized>(
        &self,
        costs: &mut C,
        segment: &Segment,
        to: NodeId,
    ) -> Result<f64> {
        if !segment.is_joint(to) {
            warn!(segment = %segment.id, node = %to, "link leaves its segment");
            return Err(RoutingError::UnknownNode(to));
        }
        Ok(costs.edge_cost(segment))
    }

    /// Cheapest route between two endpoints under `costs`.
    ///
    /// Returns `Ok(None)` when no route exists, when either endpoint cannot
    /// be resolved, or when both resolve to the same joint. Fails only when
    /// the graph holds a dangling segment or node reference.
    pub fn find_path<C: EdgeCost + ?Sized>(
        &self,
        costs: &mut C,
        start: &RoutePoint,
        stop: &RoutePoint,
    ) -> Result<Option<Route>> {
        let (Some(source), Some(target)) = (start.resolve(self.graph), stop.resolve(self.graph))
        else {
            trace!(?start, ?stop, "unresolvable endpoint");
            return Ok(None);
        };
        if source == target {
            return Ok(None);
        }
        self.search(costs, source, target)
    }

    /// Cheapest route between two joints.
    pub fn find_path_between<C: EdgeCost + ?Sized>(
        &self,
        costs: &mut C,
        source: NodeId,
        target: NodeId,
    ) -> Result<Option<Route>> {
        if source == target {
            return Ok(None);
        }
        self.search(costs, source, target)
    }

    fn search<C: EdgeCost + ?Sized>(
        &self,
        costs: &mut C,
        source: NodeId,
        target: NodeId,
    ) -> Result<Option<Route>> {
        let mut best: HashMap<NodeId, f64> = HashMap::new();
        let mut prev: HashMap<NodeId, (NodeId, SegmentId)> = HashMap::new();
        let mut frontier = BinaryHeap::new();
        let mut seq = 0u64;

        best.insert(source, 0.0);
        frontier.push(Frontier {
            dist: 0.0,
            seq,
            node: source,
        });

        while let Some(Frontier { dist, node, .. }) = frontier.pop() {
            if node == target {
                return Ok(Some(self.reconstruct(&prev, source, target, dist)));
            }
            if best.get(&node).is_some_and(|&b| dist > b) {
                continue;
            }

            for link in self.graph.neighbors_of(node) {
                let segment = self.graph.segment(link.segment).ok_or_else(|| {
                    warn!(segment = %link.segment, "dangling segment in adjacency");
                    RoutingError::UnknownSegment(link.segment)
                })?;
                let next = dist + self.hop_cost(costs, segment, link.node)?;

                if best.get(&link.node).map_or(true, |&b| next < b) {
                    best.insert(link.node, next);
                    prev.insert(link.node, (node, link.segment));
                    seq += 1;
                    frontier.push(Frontier {
                        dist: next,
                        seq,
                        node: link.node,
                    });
                }
            }
        }

        Ok(None)
    }

    fn reconstruct(
        &self,
        prev: &HashMap<NodeId, (NodeId, SegmentId)>,
        source: NodeId,
        target: NodeId,
        cost: f64,
    ) -> Route {
        let mut intersections = vec![target];
        let mut hops = Vec::new();
        let mut cursor = target;

        while cursor != source {
            let Some(&(parent, segment)) = prev.get(&cursor) else {
                break;
            };
            hops.push(segment);
            intersections.push(parent);
            cursor = parent;
        }

        intersections.reverse();
        hops.reverse();
        let segments = hops.iter().copied().collect();

        Route {
            intersections,
            hops,
            segments,
            cost,
        }
    }
}
