//! Simulation events for the timeline.

use serde::{Deserialize, Serialize};
use vanet_metrics::MetricsSnapshot;
use vanet_protocols::{AgentEvent, AgentId, AgentKind};
use vanet_topology::{GeoPoint, NodeId, SegmentId};

/// Events recorded while the simulation runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SimEvent {
    /// An agent was placed on the map
    AgentJoined {
        agent: AgentId,
        kind: AgentKind,
        position: GeoPoint,
        tick: u64,
    },

    /// Controllers recomputed their directional neighbours
    NeighborsDiscovered {
        controllers: usize,
        links: usize,
        tick: u64,
    },

    /// A car finished driving a segment
    Traversed {
        agent: AgentId,
        segment: SegmentId,
        exit: NodeId,
        reported_cost: Option<f64>,
        tick: u64,
    },

    /// Something an agent did during its step
    Agent {
        agent: AgentId,
        event: AgentEvent,
        tick: u64,
    },

    /// An agent's step or flush failed; it retries next tick
    Failed {
        agent: AgentId,
        reason: String,
        tick: u64,
    },

    /// Every agent ran once
    TickCompleted {
        tick: u64,
        delivered: usize,
        metrics: MetricsSnapshot,
    },
}

impl SimEvent {
    /// Tick at which this event happened.
    pub fn tick(&self) -> u64 {
        match self {
            SimEvent::AgentJoined { tick, .. } => *tick,
            SimEvent::NeighborsDiscovered { tick, .. } => *tick,
            SimEvent::Traversed { tick, .. } => *tick,
            SimEvent::Agent { tick, .. } => *tick,
            SimEvent::Failed { tick, .. } => *tick,
            SimEvent::TickCompleted { tick, .. } => *tick,
        }
    }

    /// Agent the event is about, if any.
    pub fn agent(&self) -> Option<AgentId> {
        match self {
            SimEvent::AgentJoined { agent, .. }
            | SimEvent::Traversed { agent, .. }
            | SimEvent::Agent { agent, .. }
            | SimEvent::Failed { agent, .. } => Some(*agent),
            SimEvent::NeighborsDiscovered { .. } | SimEvent::TickCompleted { .. } => None,
        }
    }
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick: u64,
    /// Agent events raised during the tick
    pub events: usize,
    /// Messages moved into inboxes by the flush phase
    pub delivered: usize,
    /// Agents whose step or flush failed
    pub failures: usize,
}

impl TickSummary {
    /// Nothing was delivered, so the next tick has nothing to process.
    pub fn is_quiet(&self) -> bool {
        self.delivered == 0
    }
}

/// A snapshot of the simulation at a point in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub tick: u64,
    pub cars: usize,
    pub controllers: usize,
    /// Votes held by every agent, summed
    pub pending_votes: usize,
    pub metrics: MetricsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = SimEvent::Agent {
            agent: AgentId(4),
            event: AgentEvent::OutdatedEchoed {
                to: AgentId(9),
                entries: 2,
            },
            tick: 3,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"Agent""#));
        assert!(json.contains(r#""type":"OutdatedEchoed""#));

        let back: SimEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.tick(), 3);
        assert_eq!(back.agent(), Some(AgentId(4)));
    }

    #[test]
    fn quiet_tick() {
        let summary = TickSummary {
            tick: 5,
            events: 2,
            delivered: 0,
            failures: 0,
        };
        assert!(summary.is_quiet());
    }
}
