//! Per-agent cost knowledge base.
//!
//! Every agent (car or traffic-light controller) owns exactly one
//! [`CostKnowledgeBase`]. It holds two maps:
//!
//! - `resolved`: the cost the agent trusts for path search
//! - `pending`: the in-flight [`CostVote`] per segment, which is also what
//!   the agent gossips to its peers
//!
//! Whenever a vote is accepted its cost is mirrored into `resolved` and the
//! vote's session is cleared, so the invariant "pending implies resolved once
//! accepted" holds after every [`ingest`](CostKnowledgeBase::ingest).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};
use vanet_topology::{GraphHandle, NodeId, Segment, SegmentId};

use crate::adversary::{classify_report, ReportClass};
use crate::threshold::{
    is_material_change, is_same_cost, MIN_CRUISE_SPEED, MIN_DWELL_TIME, MIN_TRACE_FRACTION,
    SPEED_MARGIN,
};
use crate::vote::{CostVote, ReporterId, VoteSnapshot};

/// A batch of vote snapshots keyed by segment, as carried by one message.
pub type CostBatch = BTreeMap<SegmentId, VoteSnapshot>;

/// Runtime knobs of the knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Require a quorum before trusting received costs
    pub use_voting_system: bool,
    /// Fraction of a segment that must be driven for a measurement to count
    pub min_trace_fraction: f64,
    /// Minimum ticks spent on a segment for a measurement to count
    pub min_dwell_time: u64,
    /// Subtracted from the speed limit for default costs
    pub speed_margin: f64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            use_voting_system: true,
            min_trace_fraction: MIN_TRACE_FRACTION,
            min_dwell_time: MIN_DWELL_TIME,
            speed_margin: SPEED_MARGIN,
        }
    }
}

/// A request to re-plan because a segment on the active route got worse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplanRequest {
    pub segment: SegmentId,
    pub previous_cost: f64,
    pub new_cost: f64,
}

impl ReplanRequest {
    /// How much worse the segment became.
    pub fn delta(&self) -> f64 {
        self.new_cost - self.previous_cost
    }
}

/// Result of ingesting one received vote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IngestOutcome {
    /// Merged, no quorum yet
    Pending,
    /// A cost was accepted and written to the resolved map
    Accepted {
        cost: f64,
        /// Classification of the reported cost, only for segments on the active route
        class: Option<ReportClass>,
        replan: Option<ReplanRequest>,
    },
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, IngestOutcome::Accepted { .. })
    }
}

/// What an agent believes about segment costs.
#[derive(Debug)]
pub struct CostKnowledgeBase {
    owner: ReporterId,
    graph: GraphHandle,
    config: KnowledgeConfig,
    resolved: HashMap<SegmentId, f64>,
    pending: BTreeMap<SegmentId, CostVote>,
    active_route: BTreeSet<SegmentId>,
}

impl CostKnowledgeBase {
    pub fn new(owner: ReporterId, graph: GraphHandle, config: KnowledgeConfig) -> Self {
        Self {
            owner,
            graph,
            config,
            resolved: HashMap::new(),
            pending: BTreeMap::new(),
            active_route: BTreeSet::new(),
        }
    }

    pub fn owner(&self) -> ReporterId {
        self.owner
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    pub fn graph(&self) -> &GraphHandle {
        &self.graph
    }

    /// The trusted cost of a segment, if one was ever resolved or cached.
    pub fn resolved_cost(&self, segment: SegmentId) -> Option<f64> {
        self.resolved.get(&segment).copied()
    }

    pub fn pending_vote(&self, segment: SegmentId) -> Option<&CostVote> {
        self.pending.get(&segment)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of segments with a pending vote.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Snapshots of every pending vote, ready to gossip.
    pub fn pending_batch(&self) -> CostBatch {
        self.pending
            .iter()
            .map(|(&id, vote)| (id, vote.snapshot()))
            .collect()
    }

    /// Snapshots of the pending votes for the given segments only.
    pub fn pending_subset<'a, I>(&self, segments: I) -> CostBatch
    where
        I: IntoIterator<Item = &'a SegmentId>,
    {
        segments
            .into_iter()
            .filter_map(|id| self.pending.get(id).map(|vote| (*id, vote.snapshot())))
            .collect()
    }

    /// Replace the set of segments on the agent's active route.
    pub fn set_active_route<I: IntoIterator<Item = SegmentId>>(&mut self, segments: I) {
        self.active_route = segments.into_iter().collect();
    }

    pub fn is_on_route(&self, segment: SegmentId) -> bool {
        self.active_route.contains(&segment)
    }

    /// Cost of a segment: the resolved cost, else a cached default derived
    /// from its length and speed limit.
    pub fn way_cost(&mut self, segment: &Segment) -> f64 {
        let margin = self.config.speed_margin;
        *self
            .resolved
            .entry(segment.id)
            .or_insert_with(|| default_cost(segment, margin))
    }

    /// [`way_cost`](Self::way_cost) by id; `None` when the graph has no such segment.
    pub fn current_cost(&mut self, segment: SegmentId) -> Option<f64> {
        if let Some(&cost) = self.resolved.get(&segment) {
            return Some(cost);
        }
        let graph = GraphHandle::clone(&self.graph);
        graph.segment(segment).map(|s| self.way_cost(s))
    }

    /// Sum of [`way_cost`](Self::way_cost) over the given segments. Unknown ids are skipped.
    pub fn route_cost<'a, I>(&mut self, segments: I) -> f64
    where
        I: IntoIterator<Item = &'a SegmentId>,
    {
        segments
            .into_iter()
            .filter_map(|&id| self.current_cost(id))
            .sum()
    }

    /// Whether a received vote brings nothing new.
    ///
    /// A cost that moved materially away from ours is always news. Otherwise,
    /// in voting mode, the report is news when we hold no pending vote for the
    /// segment or when the sender's accepted bucket carries a stamp we lack.
    pub fn is_outdated(&mut self, segment: SegmentId, reported: &VoteSnapshot) -> bool {
        let Some(current) = self.current_cost(segment) else {
            return false;
        };
        if is_material_change(current, reported.accepted_cost) {
            return false;
        }
        if !self.config.use_voting_system {
            return true;
        }
        match self.pending.get(&segment) {
            Some(vote) => !vote.has_new_stamps(reported),
            None => false,
        }
    }

    /// Fold a received vote into our knowledge.
    pub fn ingest(&mut self, segment: SegmentId, received: &VoteSnapshot) -> IngestOutcome {
        let previous = self.current_cost(segment);

        let cost = if self.config.use_voting_system {
            let vote = self
                .pending
                .entry(segment)
                .and_modify(|v| v.merge_stamps(received))
                .or_insert_with(|| CostVote::from_snapshot(received));

            if !vote.try_accept() {
                trace!(agent = self.owner, %segment, "vote pending");
                return IngestOutcome::Pending;
            }
            let cost = vote.accepted_cost();
            vote.clear_session();
            cost
        } else {
            self.pending
                .insert(segment, CostVote::from_snapshot(received));
            received.accepted_cost
        };

        self.resolved.insert(segment, cost);

        let (class, replan) = if self.is_on_route(segment) {
            let class = classify_report(received.accepted_cost);
            let replan = previous
                .filter(|&prev| cost > prev && is_material_change(prev, cost))
                .map(|previous_cost| ReplanRequest {
                    segment,
                    previous_cost,
                    new_cost: cost,
                });
            (Some(class), replan)
        } else {
            (None, None)
        };

        debug!(agent = self.owner, %segment, cost, ?class, "cost accepted");
        if let Some(r) = &replan {
            info!(agent = self.owner, %segment, delta = r.delta(), "route segment got worse");
        }

        IngestOutcome::Accepted { cost, class, replan }
    }

    /// Drop pending votes the network already knows about.
    ///
    /// Returns how many votes were dropped.
    pub fn remove_outdated(&mut self, echoed: &CostBatch) -> usize {
        let mut removed = 0;
        for (segment, snapshot) in echoed {
            let stale = self
                .pending
                .get(segment)
                .is_some_and(|vote| is_same_cost(vote.accepted_cost(), snapshot.accepted_cost));
            if stale {
                self.pending.remove(segment);
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(agent = self.owner, removed, "dropped outdated votes");
        }
        removed
    }

    /// Cost observed by driving `segment` from `entry` to `exit`.
    ///
    /// `None` when the sample is unreliable: the traced distance is longer
    /// than the segment or shorter than the minimum fraction of it, the dwell
    /// time is below the minimum, or the car did not move.
    pub fn observed_cost(
        &self,
        segment: &Segment,
        entry: NodeId,
        exit: NodeId,
        enter_time: u64,
        exit_time: u64,
    ) -> Option<f64> {
        let trace = self.graph.distance_along(segment, entry, exit)?;
        let dwell = exit_time.saturating_sub(enter_time);

        if trace > segment.length
            || trace < segment.length * self.config.min_trace_fraction
            || dwell < self.config.min_dwell_time
        {
            return None;
        }

        let speed = trace / dwell as f64;
        if speed <= 0.0 {
            return None;
        }
        Some(segment.length / speed)
    }

    /// Apply our own traversal of a segment.
    ///
    /// Returns the new cost when the observation differed materially from
    /// the cached one; it is then resolved and stamped with our own id.
    pub fn discover_new_cost(
        &mut self,
        segment: SegmentId,
        entry: NodeId,
        exit: NodeId,
        enter_time: u64,
        exit_time: u64,
    ) -> Option<f64> {
        let graph = GraphHandle::clone(&self.graph);
        let seg = graph.segment(segment)?;
        let observed = self.observed_cost(seg, entry, exit, enter_time, exit_time)?;
        let current = self.way_cost(seg);

        if !is_material_change(current, observed) {
            return None;
        }

        info!(agent = self.owner, %segment, current, observed, "observed new cost");
        self.resolved.insert(segment, observed);
        self.add_report(segment, observed);
        Some(observed)
    }

    /// Stamp `cost` for `segment` with our own id.
    pub fn add_report(&mut self, segment: SegmentId, cost: f64) {
        let owner = self.owner;
        self.pending
            .entry(segment)
            .and_modify(|v| v.add_stamp(cost, owner))
            .or_insert_with(|| CostVote::new(cost, owner));
    }
}

fn default_cost(segment: &Segment, speed_margin: f64) -> f64 {
    segment.length / (segment.speed_limit - speed_margin).max(MIN_CRUISE_SPEED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adversary::INCREASED_VALUE;
    use vanet_topology::StaticRoadGraph;

    fn graph() -> GraphHandle {
        // ~111 m per 0.001 degree of latitude
        StaticRoadGraph::builder()
            .node(1, 0.0, 0.0)
            .node(2, 0.001, 0.0)
            .node(3, 0.002, 0.0)
            .segment(10, &[1, 2], 14.0)
            .segment(20, &[2, 3], 14.0)
            .build()
            .unwrap()
            .into_handle()
    }

    fn kb(owner: ReporterId) -> CostKnowledgeBase {
        CostKnowledgeBase::new(owner, graph(), KnowledgeConfig::default())
    }

    fn snapshot(cost: f64, reporters: &[ReporterId]) -> VoteSnapshot {
        let mut s = VoteSnapshot::single(cost, reporters[0]);
        s.candidates[0].stamps.extend(reporters.iter().copied());
        s
    }

    #[test]
    fn default_cost_uses_speed_margin() {
        let mut kb = kb(1);
        let g = kb.graph().clone();
        let seg = g.segment(SegmentId(10)).unwrap();
        let expected = seg.length / 11.0;
        assert!((kb.way_cost(seg) - expected).abs() < 1e-9);
        assert_eq!(kb.resolved_cost(SegmentId(10)), Some(kb.way_cost(seg)));
    }

    #[test]
    fn slow_segment_cost_is_finite() {
        let g = StaticRoadGraph::builder()
            .node(1, 0.0, 0.0)
            .node(2, 0.001, 0.0)
            .segment(1, &[1, 2], 2.0)
            .build()
            .unwrap()
            .into_handle();
        let mut kb = CostKnowledgeBase::new(1, g.clone(), KnowledgeConfig::default());
        let seg = g.segment(SegmentId(1)).unwrap();
        assert!((kb.way_cost(seg) - seg.length).abs() < 1e-9);
    }

    #[test]
    fn unknown_segment_is_news() {
        let mut kb = kb(1);
        assert!(!kb.is_outdated(SegmentId(99), &snapshot(5.0, &[2])));
        assert_eq!(kb.current_cost(SegmentId(99)), None);
    }

    #[test]
    fn material_change_is_never_outdated() {
        let mut kb = kb(1);
        let current = kb.current_cost(SegmentId(10)).unwrap();
        assert!(!kb.is_outdated(SegmentId(10), &snapshot(current * 3.0, &[2])));
    }

    #[test]
    fn similar_cost_without_pending_vote_is_news() {
        let mut kb = kb(1);
        let current = kb.current_cost(SegmentId(10)).unwrap();
        assert!(!kb.is_outdated(SegmentId(10), &snapshot(current, &[2])));
    }

    #[test]
    fn similar_cost_without_new_stamps_is_outdated() {
        let mut kb = kb(1);
        let current = kb.current_cost(SegmentId(10)).unwrap();
        let report = snapshot(current, &[2, 3]);
        assert!(kb.ingest(SegmentId(10), &report).is_accepted());

        assert!(kb.is_outdated(SegmentId(10), &report));
        assert!(kb.is_outdated(SegmentId(10), &snapshot(current, &[2])));
        assert!(!kb.is_outdated(SegmentId(10), &snapshot(current, &[4])));
    }

    #[test]
    fn non_voting_mode_only_compares_costs() {
        let config = KnowledgeConfig {
            use_voting_system: false,
            ..KnowledgeConfig::default()
        };
        let mut kb = CostKnowledgeBase::new(1, graph(), config);
        let current = kb.current_cost(SegmentId(10)).unwrap();
        assert!(kb.is_outdated(SegmentId(10), &snapshot(current, &[2])));

        let outcome = kb.ingest(SegmentId(10), &snapshot(current * 5.0, &[2]));
        assert!(outcome.is_accepted());
        assert_eq!(kb.resolved_cost(SegmentId(10)), Some(current * 5.0));
    }

    #[test]
    fn ingest_waits_for_quorum() {
        let mut kb = kb(1);
        let before = kb.current_cost(SegmentId(10)).unwrap();

        assert_eq!(kb.ingest(SegmentId(10), &snapshot(100.0, &[2])), IngestOutcome::Pending);
        assert_eq!(kb.resolved_cost(SegmentId(10)), Some(before));

        let outcome = kb.ingest(SegmentId(10), &snapshot(101.0, &[3]));
        assert!(outcome.is_accepted());
        assert_eq!(kb.resolved_cost(SegmentId(10)), Some(100.0));
        assert_eq!(kb.pending_vote(SegmentId(10)).unwrap().candidates().len(), 1);
    }

    #[test]
    fn off_route_acceptance_is_unclassified() {
        let mut kb = kb(1);
        let outcome = kb.ingest(SegmentId(10), &snapshot(INCREASED_VALUE, &[2, 3]));
        assert_eq!(
            outcome,
            IngestOutcome::Accepted {
                cost: INCREASED_VALUE,
                class: None,
                replan: None
            }
        );
    }

    #[test]
    fn on_route_worsening_requests_replan() {
        let mut kb = kb(1);
        kb.set_active_route([SegmentId(10), SegmentId(20)]);
        let before = kb.current_cost(SegmentId(20)).unwrap();

        let outcome = kb.ingest(SegmentId(20), &snapshot(INCREASED_VALUE, &[2, 3]));
        let IngestOutcome::Accepted { class, replan, .. } = outcome else {
            panic!("expected acceptance, got {:?}", outcome);
        };
        assert_eq!(class, Some(ReportClass::Malicious));
        let replan = replan.unwrap();
        assert_eq!(replan.previous_cost, before);
        assert!((replan.delta() - (INCREASED_VALUE - before)).abs() < 1e-9);
    }

    #[test]
    fn on_route_improvement_does_not_replan() {
        let mut kb = kb(1);
        kb.set_active_route([SegmentId(10)]);
        let before = kb.current_cost(SegmentId(10)).unwrap();

        let outcome = kb.ingest(SegmentId(10), &snapshot(before / 3.0, &[2, 3]));
        let IngestOutcome::Accepted { class, replan, .. } = outcome else {
            panic!("expected acceptance, got {:?}", outcome);
        };
        assert_eq!(class, Some(ReportClass::Genuine));
        assert_eq!(replan, None);
    }

    #[test]
    fn echo_drops_matching_pending_vote() {
        let mut kb = kb(1);
        kb.add_report(SegmentId(10), 50.0);
        kb.add_report(SegmentId(20), 50.0);

        let mut echo = CostBatch::new();
        echo.insert(SegmentId(10), snapshot(52.0, &[9]));
        echo.insert(SegmentId(20), snapshot(500.0, &[9]));

        assert_eq!(kb.remove_outdated(&echo), 1);
        assert!(kb.pending_vote(SegmentId(10)).is_none());
        assert!(kb.pending_vote(SegmentId(20)).is_some());
    }

    #[test]
    fn short_or_fast_samples_are_rejected() {
        let kb = kb(1);
        let g = kb.graph().clone();
        let seg = g.segment(SegmentId(10)).unwrap();

        assert!(kb.observed_cost(seg, NodeId(1), NodeId(2), 0, 5).is_none());
        assert!(kb.observed_cost(seg, NodeId(1), NodeId(1), 0, 50).is_none());
        assert!(kb.observed_cost(seg, NodeId(2), NodeId(1), 50, 0).is_none());

        let cost = kb.observed_cost(seg, NodeId(1), NodeId(2), 0, 40).unwrap();
        assert!((cost - 40.0).abs() < 1e-9);
    }

    #[test]
    fn discovery_resolves_and_stamps() {
        let mut kb = kb(7);
        // Default is ~10 ticks; a 60-tick traversal is a material change
        let cost = kb
            .discover_new_cost(SegmentId(10), NodeId(1), NodeId(2), 100, 160)
            .unwrap();
        assert!((cost - 60.0).abs() < 1e-9);
        assert_eq!(kb.resolved_cost(SegmentId(10)), Some(cost));

        let vote = kb.pending_vote(SegmentId(10)).unwrap();
        assert!(vote.candidate_for(cost).unwrap().stamps.contains(&7));
    }

    #[test]
    fn discovery_ignores_small_changes() {
        let mut kb = kb(7);
        let current = kb.current_cost(SegmentId(10)).unwrap().round() as u64;
        let result = kb.discover_new_cost(SegmentId(10), NodeId(1), NodeId(2), 0, current.max(10));
        assert!(result.is_none());
        assert!(!kb.has_pending());
    }

    #[test]
    fn route_cost_sums_known_segments() {
        let mut kb = kb(1);
        let a = kb.current_cost(SegmentId(10)).unwrap();
        let b = kb.current_cost(SegmentId(20)).unwrap();
        let total = kb.route_cost(&[SegmentId(10), SegmentId(20), SegmentId(99)]);
        assert!((total - (a + b)).abs() < 1e-9);
    }

    #[test]
    fn pending_subset_filters_segments() {
        let mut kb = kb(1);
        kb.add_report(SegmentId(10), 50.0);
        kb.add_report(SegmentId(20), 60.0);
        let subset = kb.pending_subset(&[SegmentId(20), SegmentId(99)]);
        assert_eq!(subset.len(), 1);
        assert_eq!(subset[&SegmentId(20)].accepted_cost, 60.0);
        assert_eq!(kb.pending_batch().len(), 2);
    }
}
