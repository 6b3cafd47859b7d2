//! The gossip agent shared by cars and traffic-light controllers.
//!
//! # Message Handling
//!
//! | receiver   | message                | action                                        |
//! |------------|------------------------|-----------------------------------------------|
//! | controller | `CarReport`            | answer with own batch, split, spread, echo    |
//! | controller | `TrafficLightReport`   | split, spread (never echo)                    |
//! | controller | `RouteQuery`           | answer with pending votes for queried segments |
//! | car        | `CarReport`/`TrafficLightReport` | split, echo outdated to the sender  |
//! | car        | `RouteUpdate`          | split                                          |
//! | any        | `OutdatedEcho`         | drop matching pending votes                    |
//!
//! "Split" classifies every entry of a batch through the knowledge base:
//! outdated entries are set aside, every other entry is ingested.
//!
//! An agent never transmits synchronously: [`GossipAgent::step`] only fills
//! the outbound queue and [`GossipAgent::flush`] drains it once.

use std::mem;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use vanet_consensus::{CostBatch, CostKnowledgeBase, IngestOutcome, Personality, ReportClass, VoteSnapshot};
use vanet_metrics::SharingMetrics;
use vanet_topology::{Direction, GraphHandle, SegmentId};

use crate::car::CarState;
use crate::channel::{AgentKind, ChannelEndpoint, NetworkChannel};
use crate::config::SharingConfig;
use crate::controller::ControllerState;
use crate::error::{Error, Result};
use crate::message::{AgentId, Message, MessageKind, TargetApplication};

/// Everything an agent is built from besides its channel.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub graph: GraphHandle,
    pub config: SharingConfig,
    pub metrics: Arc<SharingMetrics>,
    /// Simulation seed; each agent derives its own stream from it
    pub seed: u64,
}

/// Something an agent did during a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentEvent {
    /// A vote reached quorum (or was trusted directly)
    CostAccepted {
        segment: SegmentId,
        cost: f64,
        class: Option<ReportClass>,
    },
    /// A valid batch was forwarded to a directional neighbour
    Spread {
        to: AgentId,
        direction: Direction,
        entries: usize,
    },
    /// Outdated entries were echoed back to their sender
    OutdatedEchoed { to: AgentId, entries: usize },
    /// An echo arrived and pending votes were dropped
    OutdatedDropped { from: AgentId, removed: usize },
    /// A car sent its pending votes
    Reported { to: AgentId, entries: usize },
    /// A car switched to a new route
    Replanned {
        segment: SegmentId,
        delta: f64,
        previous_cost: f64,
        new_cost: f64,
    },
    /// A car kept its route because the new search failed
    ReplanFailed { reason: String },
}

/// Role-specific state.
#[derive(Debug)]
pub enum AgentRole {
    Car(CarState),
    TrafficLight(ControllerState),
}

impl AgentRole {
    pub fn kind(&self) -> AgentKind {
        match self {
            AgentRole::Car(_) => AgentKind::Car,
            AgentRole::TrafficLight(_) => AgentKind::TrafficLight,
        }
    }
}

/// Protocol logic of one agent.
#[derive(Debug)]
pub struct GossipAgent<N = ChannelEndpoint> {
    pub(crate) id: AgentId,
    pub(crate) kb: CostKnowledgeBase,
    pub(crate) channel: N,
    pub(crate) config: SharingConfig,
    pub(crate) metrics: Arc<SharingMetrics>,
    pub(crate) rng: StdRng,
    pub(crate) role: AgentRole,
    pub(crate) events: Vec<AgentEvent>,
}

impl<N: NetworkChannel> GossipAgent<N> {
    pub fn new(role: AgentRole, channel: N, ctx: &AgentContext) -> Self {
        let id = channel.owner();
        Self {
            id,
            kb: CostKnowledgeBase::new(id.reporter(), Arc::clone(&ctx.graph), ctx.config.knowledge),
            channel,
            config: ctx.config,
            metrics: Arc::clone(&ctx.metrics),
            rng: StdRng::seed_from_u64(ctx.seed ^ id.0 as u64),
            role,
            events: Vec::new(),
        }
    }

    /// A car agent.
    pub fn car(channel: N, personality: Personality, ctx: &AgentContext) -> Self {
        Self::new(AgentRole::Car(CarState::new(personality)), channel, ctx)
    }

    /// A traffic-light controller agent. Call
    /// [`discover_neighbors`](Self::discover_neighbors) once every
    /// controller is registered.
    pub fn traffic_light(channel: N, ctx: &AgentContext) -> Self {
        Self::new(AgentRole::TrafficLight(ControllerState::default()), channel, ctx)
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn kind(&self) -> AgentKind {
        self.role.kind()
    }

    pub fn role(&self) -> &AgentRole {
        &self.role
    }

    pub fn knowledge(&self) -> &CostKnowledgeBase {
        &self.kb
    }

    pub fn knowledge_mut(&mut self) -> &mut CostKnowledgeBase {
        &mut self.kb
    }

    pub fn channel(&self) -> &N {
        &self.channel
    }

    pub fn config(&self) -> &SharingConfig {
        &self.config
    }

    /// Consume every resident inbound message, then do the role's
    /// periodic work. Replies are only queued.
    pub fn step(&mut self) -> Result<Vec<AgentEvent>> {
        loop {
            match self.channel.deliver_inbound() {
                Ok(Some(message)) => self.process(message),
                Ok(None) => break,
                Err(Error::Wire(e)) => warn!(agent = %self.id, error = %e, "dropping corrupt frame"),
                Err(e) => return Err(e),
            }
        }

        if matches!(self.role, AgentRole::Car(_)) {
            self.car_tick();
        }

        Ok(mem::take(&mut self.events))
    }

    /// Drain the outbound queue once.
    pub fn flush(&mut self) -> Result<usize> {
        self.channel.drain_outbound_once()
    }

    /// [`step`](Self::step) then [`flush`](Self::flush).
    pub fn run(&mut self) -> Result<Vec<AgentEvent>> {
        let events = self.step()?;
        self.flush()?;
        Ok(events)
    }

    /// Handle one inbound message.
    pub fn process(&mut self, message: Message) {
        let kind = self.kind();
        if message.target != kind.application() {
            debug!(agent = %self.id, kind = ?message.kind, "message for another application");
            return;
        }

        match (kind, message.kind) {
            (_, MessageKind::OutdatedEcho) => self.on_outdated_echo(message),
            (AgentKind::TrafficLight, MessageKind::CarReport) => self.on_car_report(message),
            (AgentKind::TrafficLight, MessageKind::TrafficLightReport) => {
                self.on_controller_report(message)
            }
            (AgentKind::TrafficLight, MessageKind::RouteQuery) => self.on_route_query(message),
            (AgentKind::Car, MessageKind::CarReport | MessageKind::TrafficLightReport) => {
                self.on_report_to_car(message)
            }
            (AgentKind::Car, MessageKind::RouteUpdate) => self.on_route_update(message),
            (_, other) => trace!(agent = %self.id, kind = ?other, "ignored"),
        }
    }

    /// Classify every entry: outdated ones are returned, the rest are ingested.
    pub(crate) fn split(&mut self, payload: CostBatch) -> (Vec<SegmentId>, CostBatch) {
        let mut valid = Vec::new();
        let mut outdated = CostBatch::new();

        for (segment, snapshot) in payload {
            if self.kb.is_outdated(segment, &snapshot) {
                outdated.insert(segment, snapshot);
            } else {
                self.apply(segment, &snapshot);
                valid.push(segment);
            }
        }

        trace!(agent = %self.id, valid = valid.len(), outdated = outdated.len(), "split batch");
        (valid, outdated)
    }

    fn apply(&mut self, segment: SegmentId, snapshot: &VoteSnapshot) {
        let IngestOutcome::Accepted {
            cost,
            class,
            replan,
        } = self.kb.ingest(segment, snapshot)
        else {
            return;
        };

        match class {
            Some(ReportClass::Malicious) => self.metrics.record_malicious(),
            Some(ReportClass::Genuine) => self.metrics.record_genuine(),
            None => {}
        }
        self.events.push(AgentEvent::CostAccepted {
            segment,
            cost,
            class,
        });

        if let (Some(request), AgentRole::Car(car)) = (replan, &mut self.role) {
            car.request_replan(request);
        }
    }

    pub(crate) fn send(
        &mut self,
        destination: AgentId,
        kind: MessageKind,
        target: TargetApplication,
        payload: CostBatch,
        direction: Option<Direction>,
    ) {
        let mut message = Message::new(self.id, destination, kind, target, payload);
        if let Some(direction) = direction {
            message = message.with_direction(direction);
        }
        self.channel.enqueue_outbound(message);
    }

    pub(crate) fn echo_outdated(&mut self, to: AgentId, target: TargetApplication, outdated: CostBatch) {
        if outdated.is_empty() {
            return;
        }
        self.metrics.record_outdated_echo();
        self.events.push(AgentEvent::OutdatedEchoed {
            to,
            entries: outdated.len(),
        });
        self.send(to, MessageKind::OutdatedEcho, target, outdated, None);
    }

    fn on_outdated_echo(&mut self, message: Message) {
        let removed = self.kb.remove_outdated(&message.payload);
        self.events.push(AgentEvent::OutdatedDropped {
            from: message.source,
            removed,
        });
    }
}

/// The application serving the sender of a report.
pub(crate) fn sender_application(kind: MessageKind) -> TargetApplication {
    match kind {
        MessageKind::TrafficLightReport | MessageKind::RouteUpdate => {
            TargetApplication::TrafficLightRouting
        }
        _ => TargetApplication::CarRouting,
    }
}
