//! Geographic positions on the road map.
//!
//! Positions are WGS84 latitude/longitude pairs. Distances use the haversine
//! formula, which is accurate enough for the few-kilometre radii used for
//! radio range and controller neighbourhoods.

use std::ops::Sub;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A point on the map.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    /// Latitude in degrees (positive = north)
    pub lat: f64,
    /// Longitude in degrees (positive = east)
    pub lon: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in metres.
    pub fn distance_to(&self, other: &Self) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// Offset between two points in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoOffset {
    pub dlat: f64,
    pub dlon: f64,
}

impl Sub for GeoPoint {
    type Output = GeoOffset;

    #[inline]
    fn sub(self, other: Self) -> GeoOffset {
        GeoOffset {
            dlat: self.lat - other.lat,
            dlon: self.lon - other.lon,
        }
    }
}
