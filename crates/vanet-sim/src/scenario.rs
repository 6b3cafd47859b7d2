//! Synthetic street grids for demos, tests and benchmarks.

use vanet_topology::{GeoPoint, NodeId, Result, SegmentId, StaticRoadGraph};

/// A Manhattan-style grid of two-way streets, one segment per block side.
///
/// Row 0 is the southern edge and column 0 the western edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCity {
    pub rows: usize,
    pub cols: usize,
    /// Block size in degrees
    pub spacing: f64,
    /// Speed limit of every street (m/s)
    pub speed_limit: f64,
}

impl GridCity {
    /// Blocks of roughly 220 m with a 50 km/h limit.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            spacing: 0.002,
            speed_limit: 14.0,
        }
    }

    #[must_use]
    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    #[must_use]
    pub fn with_speed_limit(mut self, speed_limit: f64) -> Self {
        self.speed_limit = speed_limit;
        self
    }

    fn index(&self, row: usize, col: usize) -> i64 {
        (row * self.cols + col) as i64
    }

    /// Intersection at a grid corner.
    pub fn node(&self, row: usize, col: usize) -> NodeId {
        NodeId(self.index(row, col) + 1)
    }

    pub fn position(&self, row: usize, col: usize) -> GeoPoint {
        GeoPoint::new(row as f64 * self.spacing, col as f64 * self.spacing)
    }

    /// Segment from `(row, col)` to `(row, col + 1)`.
    pub fn east_segment(&self, row: usize, col: usize) -> SegmentId {
        SegmentId(2 * self.index(row, col) + 1)
    }

    /// Segment from `(row, col)` to `(row + 1, col)`.
    pub fn north_segment(&self, row: usize, col: usize) -> SegmentId {
        SegmentId(2 * self.index(row, col) + 2)
    }

    pub fn build(&self) -> Result<StaticRoadGraph> {
        let mut builder = StaticRoadGraph::builder();
        for row in 0..self.rows {
            for col in 0..self.cols {
                let p = self.position(row, col);
                builder = builder.node(self.node(row, col).0, p.lat, p.lon);
            }
        }
        for row in 0..self.rows {
            for col in 0..self.cols {
                let here = self.node(row, col).0;
                if col + 1 < self.cols {
                    let east = self.node(row, col + 1).0;
                    builder = builder.segment(self.east_segment(row, col).0, &[here, east], self.speed_limit);
                }
                if row + 1 < self.rows {
                    let north = self.node(row + 1, col).0;
                    builder = builder.segment(self.north_segment(row, col).0, &[here, north], self.speed_limit);
                }
            }
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanet_topology::RoadGraph;

    #[test]
    fn grid_has_expected_shape() {
        let city = GridCity::new(3, 4);
        let graph = city.build().unwrap();
        assert_eq!(graph.node_count(), 12);
        // 3 rows of 3 east segments, 2 rows of 4 north segments
        assert_eq!(graph.segment_count(), 9 + 8);

        let corner = graph.neighbors_of(city.node(0, 0));
        assert_eq!(corner.len(), 2);
        let segment = graph.segment(city.north_segment(1, 2)).unwrap();
        assert_eq!(segment.nodes, vec![city.node(1, 2), city.node(2, 2)]);
    }
}
