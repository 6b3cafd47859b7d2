//! Malicious reporters and how their reports are recognised.
//!
//! A malicious car does not measure anything: it stamps a sentinel cost on
//! the segment it just left plus a handful of random segments. Because the
//! sentinels are extreme, accepted costs that fuzzily match them identify a
//! successful attack in the metrics.

use serde::{Deserialize, Serialize};

use crate::threshold::is_same_cost;

/// Fabricated cost reported to make a segment look congested.
pub const INCREASED_VALUE: f64 = 4000.0;

/// Fabricated cost reported to make a segment look empty.
pub const DECREASED_VALUE: f64 = 1.0;

/// Random segments a malicious car reports on, per traversal.
pub const REPORT_MULTIPLICATION_FACTOR: usize = 10;

/// How an agent reports segment costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Personality {
    /// Reports its own measurements
    #[default]
    Honest,
    /// Always reports [`INCREASED_VALUE`]
    MaliciousIncreased,
    /// Always reports [`DECREASED_VALUE`]
    MaliciousDecreased,
    /// Flips a coin between the two sentinels per report
    MaliciousRandom,
}

impl Personality {
    pub fn is_malicious(self) -> bool {
        !matches!(self, Personality::Honest)
    }

    /// The fabricated cost for one report, or `None` for honest agents.
    ///
    /// `coin` is only consulted by [`Personality::MaliciousRandom`]; `true`
    /// picks the increased sentinel.
    pub fn fabricated_cost(self, coin: bool) -> Option<f64> {
        match self {
            Personality::Honest => None,
            Personality::MaliciousIncreased => Some(INCREASED_VALUE),
            Personality::MaliciousDecreased => Some(DECREASED_VALUE),
            Personality::MaliciousRandom if coin => Some(INCREASED_VALUE),
            Personality::MaliciousRandom => Some(DECREASED_VALUE),
        }
    }
}

/// Classification of an accepted report on the active route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportClass {
    Malicious,
    Genuine,
}

/// Classify a reported cost against the sentinels.
pub fn classify_report(cost: f64) -> ReportClass {
    if is_same_cost(cost, DECREASED_VALUE) || is_same_cost(cost, INCREASED_VALUE) {
        ReportClass::Malicious
    } else {
        ReportClass::Genuine
    }
}
