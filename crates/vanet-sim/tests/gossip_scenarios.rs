//! End-to-end sharing scenarios on small street grids.

use vanet_consensus::{Personality, INCREASED_VALUE};
use vanet_protocols::{AgentEvent, AgentId, SharingConfig};
use vanet_routing::RoutePoint;
use vanet_sim::{GridCity, SimEvent, Simulation, SimulationConfig};
use vanet_topology::SegmentId;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn simulation(city: &GridCity, config: SimulationConfig) -> Simulation {
    Simulation::new(city.build().unwrap().into_handle(), config)
}

fn resolved(sim: &Simulation, agent: i64, segment: SegmentId) -> Option<f64> {
    sim.agent(AgentId(agent)).unwrap().knowledge().resolved_cost(segment)
}

fn agent_events(sim: &Simulation, agent: i64) -> Vec<AgentEvent> {
    sim.events()
        .iter()
        .filter_map(|e| match e {
            SimEvent::Agent { agent: a, event, .. } if *a == AgentId(agent) => Some(event.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn stale_report_is_echoed_and_dropped() {
    init_tracing();
    let city = GridCity::new(1, 3);
    let mut sim = simulation(&city, SimulationConfig::default());
    sim.add_traffic_light(AgentId(100), city.position(0, 1)).unwrap();

    let street = city.east_segment(0, 0);
    let mut observed = None;
    for id in [1, 2] {
        sim.add_car(AgentId(id), Personality::Honest, city.position(0, 0)).unwrap();
        observed = sim
            .record_traversal(AgentId(id), street, city.node(0, 0), city.node(0, 1), 0, 100)
            .unwrap();
    }
    let cost = observed.unwrap();
    sim.run_until_quiet(20);
    assert_eq!(resolved(&sim, 100, street), Some(cost));

    // Car 1 drives on; its next report still carries its old vote for the
    // first street, which the controller already knows.
    let next = city.east_segment(0, 1);
    sim.record_traversal(AgentId(1), next, city.node(0, 1), city.node(0, 2), 100, 160)
        .unwrap();
    sim.run_until_quiet(20);

    assert_eq!(resolved(&sim, 100, street), Some(cost));
    assert!(agent_events(&sim, 100)
        .iter()
        .any(|e| matches!(e, AgentEvent::OutdatedEchoed { to: AgentId(1), entries: 1 })));
    assert!(agent_events(&sim, 1)
        .iter()
        .any(|e| matches!(e, AgentEvent::OutdatedDropped { from: AgentId(100), removed: 1 })));

    let car = sim.agent(AgentId(1)).unwrap().knowledge();
    assert!(car.pending_vote(street).is_none());
    assert!(car.pending_vote(next).is_some());
    assert!(sim.metrics().outdated_echoes >= 1);
}

fn quorum_run(config: SimulationConfig) -> (Simulation, SegmentId, f64) {
    let city = GridCity::new(1, 2);
    let mut sim = simulation(&city, config);
    sim.add_traffic_light(AgentId(100), city.position(0, 1)).unwrap();

    let street = city.east_segment(0, 0);
    let mut honest_cost = 0.0;
    for id in 1..=4 {
        let personality = if id == 4 {
            Personality::MaliciousIncreased
        } else {
            Personality::Honest
        };
        sim.add_car(AgentId(id), personality, city.position(0, 0)).unwrap();
        let reported = sim
            .record_traversal(AgentId(id), street, city.node(0, 0), city.node(0, 1), 0, 100)
            .unwrap()
            .unwrap();
        if id < 4 {
            honest_cost = reported;
        }
    }
    sim.run_until_quiet(30);
    (sim, street, honest_cost)
}

#[test]
fn lone_liar_cannot_move_accepted_cost() {
    init_tracing();
    let (sim, street, honest_cost) = quorum_run(SimulationConfig::default());
    assert_eq!(resolved(&sim, 100, street), Some(honest_cost));

    let vote = sim
        .agent(AgentId(100))
        .unwrap()
        .knowledge()
        .pending_vote(street)
        .unwrap();
    let fake = vote.candidate_for(INCREASED_VALUE).unwrap();
    assert_eq!(fake.stamps.len(), 1);
}

#[test]
fn without_voting_last_report_wins() {
    let config = SimulationConfig::default().with_sharing(SharingConfig::default().without_voting());
    let (sim, street, _) = quorum_run(config);
    assert_eq!(resolved(&sim, 100, street), Some(INCREASED_VALUE));
}

#[test]
fn congestion_on_route_triggers_replan() {
    init_tracing();
    let city = GridCity::new(2, 2);
    let mut sim = simulation(&city, SimulationConfig::default());
    sim.add_traffic_light(AgentId(100), city.position(0, 0)).unwrap();

    let driver = AgentId(10);
    sim.add_car(driver, Personality::Honest, city.position(0, 0)).unwrap();
    sim.set_trip(
        driver,
        RoutePoint::at_node(city.east_segment(0, 0), city.node(0, 0)),
        RoutePoint::at_node(city.north_segment(0, 1), city.node(1, 1)),
    )
    .unwrap();
    sim.plan_route(driver).unwrap().unwrap();

    let route = sim
        .agent(driver)
        .unwrap()
        .car_state()
        .unwrap()
        .route()
        .unwrap()
        .clone();
    let jammed = route.hops[0];

    // Two cars crawl through the first street of the route
    for id in [1, 2] {
        sim.add_car(AgentId(id), Personality::Honest, city.position(0, 0)).unwrap();
        sim.record_traversal(
            AgentId(id),
            jammed,
            route.intersections[0],
            route.intersections[1],
            0,
            1_000,
        )
        .unwrap();
    }
    sim.run_until_quiet(30);

    let replanned = agent_events(&sim, 10).into_iter().find_map(|e| match e {
        AgentEvent::Replanned {
            segment,
            previous_cost,
            new_cost,
            ..
        } => Some((segment, previous_cost, new_cost)),
        _ => None,
    });
    let (segment, previous_cost, new_cost) = replanned.unwrap();
    assert_eq!(segment, jammed);
    assert!(new_cost < previous_cost);

    let new_route = sim
        .agent(driver)
        .unwrap()
        .car_state()
        .unwrap()
        .route()
        .unwrap();
    assert!(!new_route.contains_segment(jammed));
    assert_eq!(new_route.stop(), Some(city.node(1, 1)));

    let metrics = sim.metrics();
    assert_eq!(metrics.replans, 1);
    assert!(metrics.genuine_accepted >= 1);
    assert_eq!(metrics.malicious_accepted, 0);
}

#[test]
fn news_reaches_a_neighbouring_controller() {
    init_tracing();
    let city = GridCity::new(1, 3);
    let mut sim = simulation(&city, SimulationConfig::default());
    for col in 0..3 {
        sim.add_traffic_light(AgentId(100 + col as i64), city.position(0, col))
            .unwrap();
    }

    let street = city.east_segment(0, 0);
    let mut cost = None;
    for id in [1, 2] {
        sim.add_car(AgentId(id), Personality::Honest, city.position(0, 0)).unwrap();
        cost = sim
            .record_traversal(AgentId(id), street, city.node(0, 0), city.node(0, 1), 0, 100)
            .unwrap();
    }
    sim.run_until_quiet(30);

    // The middle controller heard the cars directly
    assert_eq!(resolved(&sim, 101, street), cost);
    let relayed = [100, 102]
        .into_iter()
        .filter(|&id| resolved(&sim, id, street) == cost)
        .count();
    assert!(relayed >= 1);
    assert!(agent_events(&sim, 101)
        .iter()
        .any(|e| matches!(e, AgentEvent::Spread { .. })));
}
