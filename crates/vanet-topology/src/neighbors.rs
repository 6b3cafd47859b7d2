//! Directional neighbour partition for traffic-light controllers.
//!
//! Every controller keeps at most four gossip neighbours, one per compass
//! direction. A peer fills a direction when it lies on that side of the
//! owner (by latitude/longitude sign), is within the maximum radius, is the
//! closest such peer seen so far, and does not already hold another
//! direction. This bounds the gossip fan-out of the controller sub-network.

use crate::geo::{GeoOffset, GeoPoint};

/// Compass direction of a gossip neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// All directions, in slot order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Slot index (0-3).
    pub const fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::South => 1,
            Direction::East => 2,
            Direction::West => 3,
        }
    }

    /// Whether a peer at `offset` from the owner lies on this side.
    pub fn accepts(self, offset: GeoOffset) -> bool {
        match self {
            Direction::North => offset.dlat > 0.0,
            Direction::South => offset.dlat < 0.0,
            Direction::East => offset.dlon > 0.0,
            Direction::West => offset.dlon < 0.0,
        }
    }
}

/// The (at most four) directional neighbours of a controller.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalNeighbors<T> {
    slots: [Option<(T, f64)>; 4],
}

impl<T> Default for DirectionalNeighbors<T> {
    fn default() -> Self {
        Self {
            slots: [None, None, None, None],
        }
    }
}

impl<T: Copy + PartialEq> DirectionalNeighbors<T> {
    /// Neighbour holding a direction.
    pub fn get(&self, direction: Direction) -> Option<T> {
        self.slots[direction.index()].map(|(id, _)| id)
    }

    /// Distance in metres to the neighbour holding a direction.
    pub fn distance(&self, direction: Direction) -> Option<f64> {
        self.slots[direction.index()].map(|(_, d)| d)
    }

    /// Filled slots in North, South, East, West order.
    pub fn iter(&self) -> impl Iterator<Item = (Direction, T)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(move |dir| self.get(dir).map(|id| (dir, id)))
    }

    /// Number of filled directions.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` holds any direction.
    pub fn contains(&self, id: T) -> bool {
        self.slots.iter().flatten().any(|(held, _)| *held == id)
    }

    fn held_elsewhere(&self, id: T, direction: Direction) -> bool {
        self.slots
            .iter()
            .enumerate()
            .any(|(i, slot)| i != direction.index() && matches!(slot, Some((held, _)) if *held == id))
    }
}

/// Partition candidate peers into directional neighbours of `origin`.
///
/// Candidates are visited in the given order; `owner` is skipped.
pub fn partition_by_direction<T, I>(
    owner: T,
    origin: GeoPoint,
    candidates: I,
    max_radius: f64,
) -> DirectionalNeighbors<T>
where
    T: Copy + PartialEq,
    I: IntoIterator<Item = (T, GeoPoint)>,
{
    let mut neighbors = DirectionalNeighbors::default();

    for (id, position) in candidates {
        if id == owner {
            continue;
        }
        let dist = origin.distance_to(&position);
        if dist >= max_radius {
            continue;
        }
        let offset = position - origin;

        for direction in Direction::ALL {
            if !direction.accepts(offset) {
                continue;
            }
            let closer = neighbors
                .distance(direction)
                .map_or(true, |best| dist < best);
            if closer && !neighbors.held_elsewhere(id, direction) {
                neighbors.slots[direction.index()] = Some((id, dist));
            }
        }
    }

    neighbors
}
