//! VANET Cost Sharing Simulation
//!
//! Bootstraps a road graph, a simulated radio, shared metrics and a set of
//! car and traffic-light agents, then drives them tick by tick while
//! recording an event timeline.
//!
//! # Architecture
//!
//! - **Simulation**: owns every agent and runs the two-phase tick
//! - **Events**: the timeline, serialisable with `serde_json`
//! - **Scenario**: synthetic street grids
//!
//! Kinematics are not modelled: callers report completed segment
//! traversals with [`Simulation::record_traversal`].
//!
//! # Usage
//!
//! ```ignore
//! let city = GridCity::new(4, 4);
//! let mut sim = Simulation::new(city.build()?.into_handle(), SimulationConfig::default());
//! sim.add_traffic_light(AgentId(100), city.position(0, 0))?;
//! sim.add_car(AgentId(1), Personality::Honest, city.position(0, 0))?;
//! sim.record_traversal(AgentId(1), city.east_segment(0, 0), city.node(0, 0), city.node(0, 1), 0, 90)?;
//! sim.run_until_quiet(50);
//! println!("{}", sim.metrics());
//! ```

pub mod error;
mod events;
mod scenario;
mod simulation;

pub use error::{Error, Result};
pub use events::{SimEvent, SimSnapshot, TickSummary};
pub use scenario::GridCity;
pub use simulation::{Simulation, SimulationConfig};
