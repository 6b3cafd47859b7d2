//! Simulated radio transport.
//!
//! Every agent owns a [`ChannelEndpoint`] registered on a shared
//! [`RadioHub`]. Sends only append to the endpoint's outbound queue; the
//! queue is drained once per tick, encoding each message to a bincode frame
//! and appending it to the destination's inbox. Messages enqueued while an
//! agent processes its inbox therefore leave on the *next* drain.
//!
//! Delivery is FIFO per link. No operation blocks: the hub lock is only
//! held while frames are moved between queues.

use std::collections::{BTreeMap, VecDeque};
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};
use vanet_metrics::SharingMetrics;
use vanet_topology::GeoPoint;

use crate::error::{Error, Result};
use crate::message::{AgentId, Message, TargetApplication};

/// What kind of station an agent is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    Car,
    TrafficLight,
}

impl AgentKind {
    /// The application that handles messages for this kind of agent.
    pub const fn application(self) -> TargetApplication {
        match self {
            AgentKind::Car => TargetApplication::CarRouting,
            AgentKind::TrafficLight => TargetApplication::TrafficLightRouting,
        }
    }
}

/// A reachable peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerInfo {
    pub id: AgentId,
    pub kind: AgentKind,
    pub position: GeoPoint,
    /// Metres from the asking agent
    pub distance: f64,
}

/// Transport contract consumed by the gossip agents.
pub trait NetworkChannel {
    /// Agent owning this channel.
    fn owner(&self) -> AgentId;

    /// Current position of the owner, if registered.
    fn position(&self) -> Option<GeoPoint>;

    /// Peers strictly within `radius` metres, closest first.
    fn discover_peers_within_radius(&self, radius: f64) -> Vec<PeerInfo>;

    /// Queue a message; nothing is transmitted until the next drain.
    fn enqueue_outbound(&mut self, message: Message);

    /// Deliver every message queued before this call, in FIFO order.
    ///
    /// Returns how many were delivered.
    fn drain_outbound_once(&mut self) -> Result<usize>;

    /// Next delivered message, if any.
    fn deliver_inbound(&mut self) -> Result<Option<Message>>;

    /// Messages waiting in the outbound queue.
    fn pending_outbound(&self) -> usize;
}

#[derive(Debug)]
struct Station {
    kind: AgentKind,
    position: GeoPoint,
    inbox: VecDeque<Vec<u8>>,
}

#[derive(Debug, Default)]
struct HubState {
    stations: BTreeMap<AgentId, Station>,
}

/// Shared medium connecting every endpoint of a simulation.
#[derive(Debug, Clone)]
pub struct RadioHub {
    state: Arc<Mutex<HubState>>,
    metrics: Arc<SharingMetrics>,
}

impl RadioHub {
    pub fn new(metrics: Arc<SharingMetrics>) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState::default())),
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an agent and hand out its endpoint.
    ///
    /// Registering an id twice replaces the previous station and its inbox.
    pub fn register(&self, id: AgentId, kind: AgentKind, position: GeoPoint) -> ChannelEndpoint {
        self.lock().stations.insert(
            id,
            Station {
                kind,
                position,
                inbox: VecDeque::new(),
            },
        );
        ChannelEndpoint {
            owner: id,
            hub: self.clone(),
            outbound: VecDeque::new(),
        }
    }

    /// A second endpoint for an agent that is already registered.
    ///
    /// Unlike [`register`](Self::register), the station and its inbox are
    /// left untouched.
    pub fn attach(&self, id: AgentId) -> Result<ChannelEndpoint> {
        if !self.lock().stations.contains_key(&id) {
            return Err(Error::Unregistered(id));
        }
        Ok(ChannelEndpoint {
            owner: id,
            hub: self.clone(),
            outbound: VecDeque::new(),
        })
    }

    /// Move a registered agent.
    pub fn set_position(&self, id: AgentId, position: GeoPoint) -> Result<()> {
        let mut state = self.lock();
        let station = state.stations.get_mut(&id).ok_or(Error::Unregistered(id))?;
        station.position = position;
        Ok(())
    }

    pub fn position(&self, id: AgentId) -> Option<GeoPoint> {
        self.lock().stations.get(&id).map(|s| s.position)
    }

    pub fn kind(&self, id: AgentId) -> Option<AgentKind> {
        self.lock().stations.get(&id).map(|s| s.kind)
    }

    /// Frames waiting in an agent's inbox.
    pub fn inbox_len(&self, id: AgentId) -> usize {
        self.lock().stations.get(&id).map_or(0, |s| s.inbox.len())
    }

    /// Registered agents in id order.
    pub fn agents(&self) -> Vec<AgentId> {
        self.lock().stations.keys().copied().collect()
    }

    pub fn metrics(&self) -> &Arc<SharingMetrics> {
        &self.metrics
    }
}

/// One agent's side of the radio.
#[derive(Debug)]
pub struct ChannelEndpoint {
    owner: AgentId,
    hub: RadioHub,
    outbound: VecDeque<Message>,
}

impl ChannelEndpoint {
    pub fn hub(&self) -> &RadioHub {
        &self.hub
    }
}

impl NetworkChannel for ChannelEndpoint {
    fn owner(&self) -> AgentId {
        self.owner
    }

    fn position(&self) -> Option<GeoPoint> {
        self.hub.position(self.owner)
    }

    fn discover_peers_within_radius(&self, radius: f64) -> Vec<PeerInfo> {
        let state = self.hub.lock();
        let Some(origin) = state.stations.get(&self.owner).map(|s| s.position) else {
            return Vec::new();
        };

        let mut peers: Vec<PeerInfo> = state
            .stations
            .iter()
            .filter(|(id, _)| **id != self.owner)
            .filter_map(|(&id, station)| {
                let distance = origin.distance_to(&station.position);
                (distance < radius).then_some(PeerInfo {
                    id,
                    kind: station.kind,
                    position: station.position,
                    distance,
                })
            })
            .collect();

        peers.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        peers
    }

    fn enqueue_outbound(&mut self, message: Message) {
        trace!(
            from = %self.owner,
            to = %message.destination,
            kind = ?message.kind,
            entries = message.payload.len(),
            "queued"
        );
        self.hub.metrics.record_sent();
        self.outbound.push_back(message);
    }

    fn drain_outbound_once(&mut self) -> Result<usize> {
        let batch = mem::take(&mut self.outbound);
        if batch.is_empty() {
            return Ok(0);
        }

        let (frames, unencodable) = encode_frames(batch, Message::to_bytes);

        let mut delivered = 0;
        let mut dropped = 0;
        let mut unknown = None;
        {
            let mut state = self.hub.lock();
            for (destination, frame) in frames {
                match state.stations.get_mut(&destination) {
                    Some(station) => {
                        station.inbox.push_back(frame);
                        delivered += 1;
                    }
                    None => {
                        dropped += 1;
                        unknown.get_or_insert(destination);
                    }
                }
            }
        }
        self.hub.metrics.record_delivered(delivered as u64);

        if let Some(e) = unencodable {
            return Err(e);
        }
        match unknown {
            Some(destination) => {
                warn!(from = %self.owner, %destination, dropped, "undeliverable messages");
                Err(Error::UnknownDestination {
                    destination,
                    dropped,
                })
            }
            None => Ok(delivered),
        }
    }

    fn deliver_inbound(&mut self) -> Result<Option<Message>> {
        let frame = {
            let mut state = self.hub.lock();
            let station = state
                .stations
                .get_mut(&self.owner)
                .ok_or(Error::Unregistered(self.owner))?;
            station.inbox.pop_front()
        };
        frame.map(|bytes| Message::from_bytes(&bytes)).transpose()
    }

    fn pending_outbound(&self) -> usize {
        self.outbound.len()
    }
}

/// Encode every message of a drained queue. A message that fails to encode
/// is dropped on its own; the first such error is returned alongside the
/// frames that did encode.
fn encode_frames<F>(
    batch: VecDeque<Message>,
    mut encode: F,
) -> (Vec<(AgentId, Vec<u8>)>, Option<Error>)
where
    F: FnMut(&Message) -> Result<Vec<u8>>,
{
    let mut frames = Vec::with_capacity(batch.len());
    let mut failure = None;
    for message in batch {
        match encode(&message) {
            Ok(bytes) => frames.push((message.destination, bytes)),
            Err(e) => {
                warn!(
                    to = %message.destination,
                    kind = ?message.kind,
                    error = %e,
                    "unencodable message"
                );
                failure.get_or_insert(e);
            }
        }
    }
    (frames, failure)
}
