//! VANET Cost-Aware Routing
//!
//! Shortest paths over the road graph, weighted by what one agent currently
//! believes each segment costs.
//!
//! # Design
//!
//! The search is a Dijkstra-style expansion over segment joints. Weights are
//! pulled on demand through [`EdgeCost`], so the same search runs against a
//! live [`CostKnowledgeBase`](vanet_consensus::CostKnowledgeBase) or a fixed
//! table. Costs are never cached between searches: the knowledge base may
//! change on every tick.
//!
//! # Failure
//!
//! - unreachable target, unresolvable endpoint, start == stop: `Ok(None)`
//! - dangling segment or node reference in the graph: [`RoutingError`]
//!
//! Callers keep their previous route on either outcome.

mod error;
mod search;

pub use error::{Result, RoutingError};
pub use search::{CostAwarePathSearch, EdgeCost, Route, RoutePoint};
