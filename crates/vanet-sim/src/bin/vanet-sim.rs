//! VANET Cost Sharing Demo
//!
//! Run a grid city where honest cars report a congested street and
//! malicious cars flood fabricated costs, then print the sharing metrics.
//!
//! Usage: `vanet-sim [grid-size] [honest-cars] [malicious-cars] [timeline.json]`

use std::env;
use std::fs;

use vanet_consensus::Personality;
use vanet_protocols::AgentId;
use vanet_sim::{GridCity, Simulation, SimulationConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();

    let size: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(4).max(2);
    let honest: i64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(6);
    let malicious: i64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(2);
    let timeline = args.get(4);

    println!("VANET Cost Sharing");
    println!("==================");
    println!();
    println!("{size}x{size} grid, {honest} honest cars, {malicious} malicious cars");

    let city = GridCity::new(size, size);
    let mut sim = Simulation::new(city.build()?.into_handle(), SimulationConfig::default());

    for row in 0..size {
        for col in 0..size {
            let id = AgentId(1_000 + (row * size + col) as i64);
            sim.add_traffic_light(id, city.position(row, col))?;
        }
    }

    // Everyone drives the first street of the southern edge
    let segment = city.east_segment(0, 0);
    let (entry, exit) = (city.node(0, 0), city.node(0, 1));
    for id in 1..=honest + malicious {
        let personality = if id > honest {
            Personality::MaliciousIncreased
        } else {
            Personality::Honest
        };
        let car = AgentId(id);
        sim.add_car(car, personality, city.position(0, 0))?;
        // About 2 m/s: heavy congestion
        sim.record_traversal(car, segment, entry, exit, 0, 110)?;
    }

    let ticks = sim.run_until_quiet(200);

    println!();
    println!("Simulation complete after {ticks} ticks:");
    println!("  Agents: {}", sim.agent_count());
    println!("  Events: {}", sim.event_count());
    println!("  {}", sim.metrics());

    if let Some(path) = timeline {
        fs::write(path, sim.timeline_json()?)?;
        println!("  Timeline written to {path}");
    }

    Ok(())
}
