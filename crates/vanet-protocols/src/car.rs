//! Car behaviour: measuring segments, reporting and route planning.
//!
//! A car reports its pending votes to the closest controller in range (and
//! to nearby cars when car-to-car sharing is on) after it learnt something
//! new. When an accepted cost makes a segment of its route materially
//! worse, the car searches a new route on its next step; if the search
//! fails the previous route is kept.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, trace, warn};
use vanet_consensus::{CostBatch, Personality, ReplanRequest, VoteSnapshot, REPORT_MULTIPLICATION_FACTOR};
use vanet_routing::{CostAwarePathSearch, Route, RoutePoint};
use vanet_topology::{GraphHandle, NodeId, SegmentId};

use crate::channel::{AgentKind, NetworkChannel};
use crate::error::Result;
use crate::gossip::{sender_application, AgentEvent, AgentRole, GossipAgent};
use crate::message::{Message, MessageKind, TargetApplication};

/// Car-only state.
#[derive(Debug, Default)]
pub struct CarState {
    personality: Personality,
    location: Option<RoutePoint>,
    destination: Option<RoutePoint>,
    route: Option<Route>,
    pending_replan: Option<ReplanRequest>,
    unreported: bool,
}

impl CarState {
    pub fn new(personality: Personality) -> Self {
        Self {
            personality,
            ..Self::default()
        }
    }

    pub fn personality(&self) -> Personality {
        self.personality
    }

    pub fn location(&self) -> Option<&RoutePoint> {
        self.location.as_ref()
    }

    pub fn destination(&self) -> Option<&RoutePoint> {
        self.destination.as_ref()
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn pending_replan(&self) -> Option<&ReplanRequest> {
        self.pending_replan.as_ref()
    }

    /// Whether the car learnt something it has not reported yet.
    pub fn has_unreported(&self) -> bool {
        self.unreported
    }

    /// Keep the request with the largest cost increase.
    pub(crate) fn request_replan(&mut self, request: ReplanRequest) {
        match &self.pending_replan {
            Some(current) if current.delta() >= request.delta() => {}
            _ => self.pending_replan = Some(request),
        }
    }
}

impl<N: NetworkChannel> GossipAgent<N> {
    pub fn car_state(&self) -> Option<&CarState> {
        match &self.role {
            AgentRole::Car(car) => Some(car),
            AgentRole::TrafficLight(_) => None,
        }
    }

    fn car_state_mut(&mut self) -> Option<&mut CarState> {
        match &mut self.role {
            AgentRole::Car(car) => Some(car),
            AgentRole::TrafficLight(_) => None,
        }
    }

    /// Place the car. No effect on controllers.
    pub fn set_location(&mut self, location: RoutePoint) {
        if let Some(car) = self.car_state_mut() {
            car.location = Some(location);
        }
    }

    pub fn set_destination(&mut self, destination: RoutePoint) {
        if let Some(car) = self.car_state_mut() {
            car.destination = Some(destination);
        }
    }

    /// Cost of the current route under today's knowledge.
    pub fn route_cost(&mut self) -> Option<f64> {
        let segments: Vec<SegmentId> = self.car_state()?.route.as_ref()?.hops.clone();
        Some(self.kb.route_cost(&segments))
    }

    /// Search a route from the car's location to its destination and adopt it.
    ///
    /// Returns the cost of the adopted route, or `None` when the car has no
    /// location or destination or no path exists; the previous route is then
    /// kept. A new route is announced to the closest controller as a
    /// [`MessageKind::RouteQuery`].
    pub fn plan_route(&mut self) -> Result<Option<f64>> {
        let Some(car) = self.car_state() else {
            return Ok(None);
        };
        let (Some(from), Some(to)) = (car.location, car.destination) else {
            return Ok(None);
        };

        let graph = GraphHandle::clone(self.kb.graph());
        let found = CostAwarePathSearch::new(graph.as_ref()).find_path(&mut self.kb, &from, &to)?;
        let Some(route) = found else {
            warn!(agent = %self.id, from = %from.segment, to = %to.segment, "no path, keeping previous route");
            return Ok(None);
        };

        let cost = route.cost;
        debug!(agent = %self.id, hops = route.hops.len(), cost, "route planned");
        self.kb.set_active_route(route.hops.iter().copied());
        self.query_route(&route);
        if let Some(car) = self.car_state_mut() {
            car.route = Some(route);
        }
        Ok(Some(cost))
    }

    /// Ask the closest controller what it knows about the route's segments.
    fn query_route(&mut self, route: &Route) {
        let Some(controller) = self
            .channel
            .discover_peers_within_radius(self.config.car_report_radius)
            .into_iter()
            .find(|peer| peer.kind == AgentKind::TrafficLight)
        else {
            return;
        };

        let reporter = self.id.reporter();
        let mut query = CostBatch::new();
        for &segment in &route.hops {
            if let Some(cost) = self.kb.current_cost(segment) {
                query.insert(segment, VoteSnapshot::single(cost, reporter));
            }
        }
        self.send(
            controller.id,
            MessageKind::RouteQuery,
            TargetApplication::TrafficLightRouting,
            query,
            None,
        );
    }

    /// Handle the pending replan request, if any.
    ///
    /// Returns whether the car switched to a new route.
    pub fn replan(&mut self) -> Result<bool> {
        let Some(request) = self.car_state_mut().and_then(|car| car.pending_replan.take()) else {
            return Ok(false);
        };
        let previous_cost = self.route_cost().unwrap_or(request.previous_cost);

        let Some(new_cost) = self.plan_route()? else {
            return Ok(false);
        };

        self.metrics.record_replan();
        info!(agent = %self.id, segment = %request.segment, previous_cost, new_cost, "replanned");
        self.events.push(AgentEvent::Replanned {
            segment: request.segment,
            delta: request.delta(),
            previous_cost,
            new_cost,
        });
        Ok(true)
    }

    /// Account for driving `segment` from `entry` to `exit`.
    ///
    /// An honest car measures the segment; a malicious one fabricates a cost
    /// for it and for a handful of random segments. Returns the cost the car
    /// now reports for `segment`, if any.
    pub fn record_traversal(
        &mut self,
        segment: SegmentId,
        entry: NodeId,
        exit: NodeId,
        enter_time: u64,
        exit_time: u64,
    ) -> Option<f64> {
        let personality = self.car_state()?.personality;
        let coin = personality == Personality::MaliciousRandom && self.rng.gen_bool(0.5);

        let reported = match personality.fabricated_cost(coin) {
            None => self
                .kb
                .discover_new_cost(segment, entry, exit, enter_time, exit_time),
            Some(fake) => {
                self.fabricate(segment, fake);
                Some(fake)
            }
        };

        if let Some(car) = self.car_state_mut() {
            car.location = Some(RoutePoint::at_node(segment, exit));
            if reported.is_some() {
                car.unreported = true;
            }
        }
        reported
    }

    fn fabricate(&mut self, segment: SegmentId, cost: f64) {
        self.kb.add_report(segment, cost);
        let all = self.kb.graph().segment_ids();
        for _ in 0..REPORT_MULTIPLICATION_FACTOR {
            if let Some(&target) = all.choose(&mut self.rng) {
                self.kb.add_report(target, cost);
            }
        }
        debug!(agent = %self.id, %segment, cost, "fabricated reports");
    }

    /// A report from a controller or another car: ingest what is new and
    /// echo the rest to the sender.
    pub(crate) fn on_report_to_car(&mut self, message: Message) {
        let Message {
            source,
            kind,
            payload,
            ..
        } = message;
        let (valid, outdated) = self.split(payload);
        debug!(
            agent = %self.id,
            from = %source,
            valid = valid.len(),
            outdated = outdated.len(),
            "report received"
        );
        self.echo_outdated(source, sender_application(kind), outdated);
    }

    /// A controller's answer to a route query. Known entries are dropped
    /// without an echo.
    pub(crate) fn on_route_update(&mut self, message: Message) {
        let source = message.source;
        let (valid, outdated) = self.split(message.payload);
        trace!(
            agent = %self.id,
            from = %source,
            valid = valid.len(),
            known = outdated.len(),
            "route update"
        );
    }

    /// Periodic car work: act on a replan request, then report news.
    pub(crate) fn car_tick(&mut self) {
        if self.car_state().is_some_and(|car| car.pending_replan.is_some()) {
            if let Err(e) = self.replan() {
                warn!(agent = %self.id, error = %e, "replan failed, keeping route");
                self.events.push(AgentEvent::ReplanFailed {
                    reason: e.to_string(),
                });
            }
        }
        self.report();
    }

    fn report(&mut self) {
        if !self.car_state().is_some_and(CarState::has_unreported) || !self.kb.has_pending() {
            return;
        }

        let peers = self
            .channel
            .discover_peers_within_radius(self.config.car_report_radius);
        let controller = peers
            .iter()
            .find(|peer| peer.kind == AgentKind::TrafficLight)
            .map(|peer| peer.id);
        let cars: Vec<_> = if self.config.car_to_car_sharing {
            peers
                .iter()
                .filter(|peer| peer.kind == AgentKind::Car)
                .map(|peer| peer.id)
                .collect()
        } else {
            Vec::new()
        };
        if controller.is_none() && cars.is_empty() {
            return;
        }

        let batch = self.kb.pending_batch();
        let targets = controller
            .map(|id| (id, TargetApplication::TrafficLightRouting))
            .into_iter()
            .chain(cars.into_iter().map(|id| (id, TargetApplication::CarRouting)));
        for (to, target) in targets {
            self.events.push(AgentEvent::Reported {
                to,
                entries: batch.len(),
            });
            self.send(to, MessageKind::CarReport, target, batch.clone(), None);
        }

        if let Some(car) = self.car_state_mut() {
            car.unreported = false;
        }
    }
}
