//! Tick-driven simulation of cars and traffic-light controllers.
//!
//! A tick runs in two phases. First every agent steps, spread over up to
//! `worker_threads` scoped threads; a step only touches the agent's own
//! state and outbound queue. Then every outbound queue is flushed once, in
//! agent id order, so runs are reproducible for a given seed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vanet_consensus::Personality;
use vanet_metrics::{MetricsSnapshot, SharingMetrics};
use vanet_protocols::{
    AgentContext, AgentEvent, AgentId, AgentKind, ChannelEndpoint, GossipAgent, RadioHub, SharingConfig,
};
use vanet_routing::RoutePoint;
use vanet_topology::{GeoPoint, GraphHandle, NodeId, RoadGraph, SegmentId};

use crate::error::{Error, Result};
use crate::events::{SimEvent, SimSnapshot, TickSummary};

/// Configuration for the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seed for deterministic simulation
    pub seed: u64,
    pub sharing: SharingConfig,
    /// Threads used for the step phase of a tick
    pub worker_threads: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            sharing: SharingConfig::default(),
            worker_threads: 4,
        }
    }
}

impl SimulationConfig {
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_sharing(mut self, sharing: SharingConfig) -> Self {
        self.sharing = sharing;
        self
    }

    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }
}

type Agent = GossipAgent<ChannelEndpoint>;

/// Owns the graph, the radio, the metrics and every agent.
pub struct Simulation {
    config: SimulationConfig,
    graph: GraphHandle,
    hub: RadioHub,
    metrics: Arc<SharingMetrics>,
    agents: BTreeMap<AgentId, Agent>,
    events: Vec<SimEvent>,
    tick: u64,
    neighbors_stale: bool,
}

impl Simulation {
    pub fn new(graph: GraphHandle, config: SimulationConfig) -> Self {
        let metrics = Arc::new(SharingMetrics::new());
        Self {
            config,
            graph,
            hub: RadioHub::new(Arc::clone(&metrics)),
            metrics,
            agents: BTreeMap::new(),
            events: Vec::new(),
            tick: 0,
            neighbors_stale: false,
        }
    }

    fn context(&self) -> AgentContext {
        AgentContext {
            graph: Arc::clone(&self.graph),
            config: self.config.sharing,
            metrics: Arc::clone(&self.metrics),
            seed: self.config.seed,
        }
    }

    fn insert_agent(
        &mut self,
        id: AgentId,
        kind: AgentKind,
        position: GeoPoint,
        build: impl FnOnce(ChannelEndpoint, &AgentContext) -> Agent,
    ) -> Result<AgentId> {
        if self.agents.contains_key(&id) {
            return Err(Error::DuplicateAgent(id));
        }
        let ctx = self.context();
        let endpoint = self.hub.register(id, kind, position);
        self.agents.insert(id, build(endpoint, &ctx));
        self.events.push(SimEvent::AgentJoined {
            agent: id,
            kind,
            position,
            tick: self.tick,
        });
        debug!(agent = %id, ?kind, "agent joined");
        Ok(id)
    }

    /// Place a car.
    pub fn add_car(&mut self, id: AgentId, personality: Personality, position: GeoPoint) -> Result<AgentId> {
        self.insert_agent(id, AgentKind::Car, position, |endpoint, ctx| {
            GossipAgent::car(endpoint, personality, ctx)
        })
    }

    /// Place a traffic-light controller. Neighbours are recomputed before the next tick.
    pub fn add_traffic_light(&mut self, id: AgentId, position: GeoPoint) -> Result<AgentId> {
        self.neighbors_stale = true;
        self.insert_agent(id, AgentKind::TrafficLight, position, |endpoint, ctx| {
            GossipAgent::traffic_light(endpoint, ctx)
        })
    }

    /// Recompute every controller's directional neighbours.
    ///
    /// Returns the number of filled neighbour slots.
    pub fn discover_neighbors(&mut self) -> usize {
        let mut controllers = 0;
        let mut links = 0;
        for agent in self.agents.values_mut() {
            if agent.kind() == AgentKind::TrafficLight {
                controllers += 1;
                links += agent.discover_neighbors();
            }
        }
        self.neighbors_stale = false;
        self.events.push(SimEvent::NeighborsDiscovered {
            controllers,
            links,
            tick: self.tick,
        });
        links
    }

    /// Move an agent on the map.
    pub fn move_agent(&mut self, id: AgentId, position: GeoPoint) -> Result<()> {
        let kind = self.agent_ref(id)?.kind();
        self.hub.set_position(id, position)?;
        if kind == AgentKind::TrafficLight {
            self.neighbors_stale = true;
        }
        Ok(())
    }

    fn agent_ref(&self, id: AgentId) -> Result<&Agent> {
        self.agents.get(&id).ok_or(Error::UnknownAgent(id))
    }

    fn car_mut(&mut self, id: AgentId) -> Result<&mut Agent> {
        let agent = self.agents.get_mut(&id).ok_or(Error::UnknownAgent(id))?;
        if agent.kind() != AgentKind::Car {
            return Err(Error::WrongRole {
                agent: id,
                expected: AgentKind::Car,
            });
        }
        Ok(agent)
    }

    /// Set where a car is and where it is heading.
    pub fn set_trip(&mut self, car: AgentId, from: RoutePoint, to: RoutePoint) -> Result<()> {
        let agent = self.car_mut(car)?;
        agent.set_location(from);
        agent.set_destination(to);
        Ok(())
    }

    /// Plan a car's route; see [`GossipAgent::plan_route`].
    pub fn plan_route(&mut self, car: AgentId) -> Result<Option<f64>> {
        Ok(self.car_mut(car)?.plan_route()?)
    }

    /// A car drove `segment` from `entry` to `exit` between two ticks.
    ///
    /// The car is moved to the exit node. Returns the cost the car now
    /// reports for the segment, if any.
    pub fn record_traversal(
        &mut self,
        car: AgentId,
        segment: SegmentId,
        entry: NodeId,
        exit: NodeId,
        enter_tick: u64,
        exit_tick: u64,
    ) -> Result<Option<f64>> {
        let reported = self
            .car_mut(car)?
            .record_traversal(segment, entry, exit, enter_tick, exit_tick);

        if let Some(position) = self.graph.position(exit) {
            self.hub.set_position(car, position)?;
        }
        self.events.push(SimEvent::Traversed {
            agent: car,
            segment,
            exit,
            reported_cost: reported,
            tick: self.tick,
        });
        Ok(reported)
    }

    fn step_all(&mut self) -> Vec<(AgentId, vanet_protocols::Result<Vec<AgentEvent>>)> {
        let mut agents: Vec<&mut Agent> = self.agents.values_mut().collect();
        if agents.is_empty() {
            return Vec::new();
        }
        let chunk = agents.len().div_ceil(self.config.worker_threads.max(1));

        thread::scope(|scope| {
            let handles: Vec<_> = agents
                .chunks_mut(chunk)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter_mut()
                            .map(|agent| (agent.id(), agent.step()))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        })
    }

    /// Run every agent once and deliver what they sent.
    pub fn tick(&mut self) -> TickSummary {
        if self.neighbors_stale {
            self.discover_neighbors();
        }

        let tick = self.tick;
        let mut summary = TickSummary {
            tick,
            ..TickSummary::default()
        };

        for (agent, outcome) in self.step_all() {
            match outcome {
                Ok(events) => {
                    summary.events += events.len();
                    self.events
                        .extend(events.into_iter().map(|event| SimEvent::Agent { agent, event, tick }));
                }
                Err(e) => {
                    warn!(%agent, error = %e, "step failed");
                    summary.failures += 1;
                    self.events.push(SimEvent::Failed {
                        agent,
                        reason: e.to_string(),
                        tick,
                    });
                }
            }
        }

        for (&agent, state) in self.agents.iter_mut() {
            match state.flush() {
                Ok(delivered) => summary.delivered += delivered,
                Err(e) => {
                    warn!(%agent, error = %e, "flush failed");
                    summary.failures += 1;
                    self.events.push(SimEvent::Failed {
                        agent,
                        reason: e.to_string(),
                        tick,
                    });
                }
            }
        }

        self.events.push(SimEvent::TickCompleted {
            tick,
            delivered: summary.delivered,
            metrics: self.metrics.snapshot(),
        });
        debug!(tick, events = summary.events, delivered = summary.delivered, "tick complete");
        self.tick += 1;
        summary
    }

    /// Run a fixed number of ticks.
    pub fn run(&mut self, ticks: usize) -> Vec<TickSummary> {
        (0..ticks).map(|_| self.tick()).collect()
    }

    /// Tick until a tick delivers nothing, at most `max_ticks` times.
    ///
    /// Returns the number of ticks run.
    pub fn run_until_quiet(&mut self, max_ticks: usize) -> usize {
        for ran in 1..=max_ticks {
            if self.tick().is_quiet() {
                return ran;
            }
        }
        max_ticks
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// Agents in id order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn graph(&self) -> &GraphHandle {
        &self.graph
    }

    pub fn hub(&self) -> &RadioHub {
        &self.hub
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Get all recorded events.
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn snapshot(&self) -> SimSnapshot {
        let cars = self
            .agents
            .values()
            .filter(|a| a.kind() == AgentKind::Car)
            .count();
        SimSnapshot {
            tick: self.tick,
            cars,
            controllers: self.agents.len() - cars,
            pending_votes: self.agents.values().map(|a| a.knowledge().pending_len()).sum(),
            metrics: self.metrics.snapshot(),
        }
    }

    /// The event timeline as JSON.
    pub fn timeline_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.events)?)
    }
}
