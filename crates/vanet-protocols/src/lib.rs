//! VANET Protocols - Gossip Dissemination of Segment Costs
//!
//! Cars measure how long road segments take to drive and share those
//! measurements, as votes, with traffic-light controllers and with each
//! other. Controllers relay what they learn to their directional
//! neighbours, so news travels across the city without a central server.
//!
//! # Overview
//!
//! - [`Message`]: one bincode frame on the simulated radio, carrying a
//!   [`CostBatch`](vanet_consensus::CostBatch)
//! - [`NetworkChannel`]: the transport contract; [`RadioHub`] and
//!   [`ChannelEndpoint`] implement it in memory
//! - [`GossipAgent`]: the per-agent state machine, either a car or a
//!   traffic-light controller
//!
//! # Suppressing Duplicates
//!
//! Every received entry is checked against the receiver's knowledge. Entries
//! that bring nothing new are *outdated*: they are echoed back to the sender
//! (except between controllers), and the sender drops its own pending vote.
//! Only valid entries are relayed, which is what makes the gossip settle.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vanet_protocols::{AgentContext, AgentId, AgentKind, GossipAgent, RadioHub, SharingConfig};
//!
//! let metrics = Arc::new(SharingMetrics::new());
//! let hub = RadioHub::new(Arc::clone(&metrics));
//! let ctx = AgentContext { graph, config: SharingConfig::default(), metrics, seed: 1 };
//!
//! let light = hub.register(AgentId(100), AgentKind::TrafficLight, crossing);
//! let mut light = GossipAgent::traffic_light(light, &ctx);
//! light.discover_neighbors();
//!
//! loop {
//!     let events = light.step()?;
//!     light.flush()?;
//! }
//! ```

mod car;
mod channel;
mod config;
mod controller;
pub mod error;
mod gossip;
mod message;

pub use car::CarState;
pub use channel::{AgentKind, ChannelEndpoint, NetworkChannel, PeerInfo, RadioHub};
pub use config::{FanOut, SharingConfig};
pub use controller::ControllerState;
pub use error::{Error, Result};
pub use gossip::{AgentContext, AgentEvent, AgentRole, GossipAgent};
pub use message::{AgentId, Message, MessageKind, TargetApplication};
