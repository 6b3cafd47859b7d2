//! Messages exchanged between agents.
//!
//! A message is immutable once built. Its payload is a [`CostBatch`]: one
//! vote snapshot per segment. On the wire a message is a bincode frame.

use std::fmt;

use serde::{Deserialize, Serialize};
use vanet_consensus::{CostBatch, ReporterId};
use vanet_topology::Direction;

use crate::error::Result;

/// Identity of a car or traffic-light controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub i64);

impl AgentId {
    /// The stamp this agent puts on the costs it reports.
    pub const fn reporter(self) -> ReporterId {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// What a message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// A car shares its pending votes
    CarReport,
    /// A controller shares pending votes with a car or another controller
    TrafficLightReport,
    /// The receiver already knew these entries
    OutdatedEcho,
    /// A car asks a controller about the segments of its new route
    RouteQuery,
    /// A controller answers a route query
    RouteUpdate,
}

/// Which agent role a message is meant for at the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetApplication {
    CarRouting,
    TrafficLightRouting,
}

/// One message on the simulated radio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub source: AgentId,
    pub destination: AgentId,
    pub kind: MessageKind,
    pub target: TargetApplication,
    /// Only set between traffic-light controllers
    pub direction: Option<Direction>,
    pub payload: CostBatch,
}

impl Message {
    pub fn new(
        source: AgentId,
        destination: AgentId,
        kind: MessageKind,
        target: TargetApplication,
        payload: CostBatch,
    ) -> Self {
        Self {
            source,
            destination,
            kind,
            target,
            direction: None,
            payload,
        }
    }

    /// Tag the message with the direction of the neighbour it is sent to.
    #[must_use]
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Encode for transmission.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a received frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
