//! Traffic-light controller behaviour.
//!
//! A controller keeps at most one neighbouring controller per compass
//! direction. Valid news is spread to a random neighbour slot (two slots
//! with [`FanOut::TwoSlot`]); a slot holding the agent the news came from
//! is skipped, so a round may send nothing.

use rand::Rng;
use tracing::{debug, trace};
use vanet_topology::{partition_by_direction, DirectionalNeighbors, SegmentId, MAX_DIRECTIONAL_NEIGHBORS};

use crate::channel::{AgentKind, NetworkChannel};
use crate::config::FanOut;
use crate::gossip::{AgentEvent, AgentRole, GossipAgent};
use crate::message::{AgentId, Message, MessageKind, TargetApplication};

/// Controller-only state.
#[derive(Debug, Default)]
pub struct ControllerState {
    neighbors: DirectionalNeighbors<AgentId>,
}

impl ControllerState {
    pub fn neighbors(&self) -> &DirectionalNeighbors<AgentId> {
        &self.neighbors
    }
}

impl<N: NetworkChannel> GossipAgent<N> {
    /// Pick the closest controller in each direction within the configured
    /// neighbour radius. Returns how many slots are filled; always 0 for cars.
    pub fn discover_neighbors(&mut self) -> usize {
        let AgentRole::TrafficLight(state) = &mut self.role else {
            return 0;
        };
        let Some(origin) = self.channel.position() else {
            return 0;
        };

        let radius = self.config.neighbor_radius;
        let controllers = self
            .channel
            .discover_peers_within_radius(radius)
            .into_iter()
            .filter(|peer| peer.kind == AgentKind::TrafficLight)
            .map(|peer| (peer.id, peer.position));

        state.neighbors = partition_by_direction(self.id, origin, controllers, radius);
        debug!(agent = %self.id, neighbors = state.neighbors.len(), "neighbours discovered");
        state.neighbors.len()
    }

    pub(crate) fn on_car_report(&mut self, message: Message) {
        let car = message.source;

        // Tell the car what we have been holding before looking at its news
        if self.kb.has_pending() {
            let batch = self.kb.pending_batch();
            self.send(
                car,
                MessageKind::TrafficLightReport,
                TargetApplication::CarRouting,
                batch,
                None,
            );
        }

        let (valid, outdated) = self.split(message.payload);
        self.spread(&valid, car);
        self.echo_outdated(car, TargetApplication::CarRouting, outdated);
    }

    pub(crate) fn on_controller_report(&mut self, message: Message) {
        let (valid, _) = self.split(message.payload);
        self.spread(&valid, message.source);
    }

    pub(crate) fn on_route_query(&mut self, message: Message) {
        let answer = self.kb.pending_subset(message.payload.keys());
        trace!(agent = %self.id, car = %message.source, answered = answer.len(), "route query");
        if !answer.is_empty() {
            self.send(
                message.source,
                MessageKind::RouteUpdate,
                TargetApplication::CarRouting,
                answer,
                None,
            );
        }
    }

    /// Forward our merged votes for `segments` to the chosen neighbour slots.
    fn spread(&mut self, segments: &[SegmentId], source: AgentId) {
        let AgentRole::TrafficLight(state) = &self.role else {
            return;
        };
        if segments.is_empty() || state.neighbors.is_empty() {
            return;
        }
        let neighbors: Vec<_> = state.neighbors.iter().collect();

        let batch = self.kb.pending_subset(segments);
        if batch.is_empty() {
            return;
        }

        let slots = pick_slots(&mut self.rng, neighbors.len(), self.config.fan_out);
        for (slot, (direction, peer)) in neighbors.into_iter().enumerate() {
            if peer == source || !slots.contains(&slot) {
                continue;
            }
            self.events.push(AgentEvent::Spread {
                to: peer,
                direction,
                entries: batch.len(),
            });
            self.send(
                peer,
                MessageKind::TrafficLightReport,
                TargetApplication::TrafficLightRouting,
                batch.clone(),
                Some(direction),
            );
        }
    }
}

/// Indices of the neighbour slots to forward to, out of `filled`.
fn pick_slots<R: Rng>(rng: &mut R, filled: usize, fan_out: FanOut) -> Vec<usize> {
    let first = rng.gen_range(0..filled);
    match fan_out {
        FanOut::TwoSlot if filled >= MAX_DIRECTIONAL_NEIGHBORS => {
            let mut second = rng.gen_range(0..filled);
            if second == first {
                second = (first + 1) % filled;
            }
            vec![first, second]
        }
        _ => vec![first],
    }
}
