//! Sharing configuration.

use serde::{Deserialize, Serialize};
use vanet_consensus::KnowledgeConfig;

/// How many directional neighbours a controller forwards a valid batch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FanOut {
    /// One neighbour picked uniformly at random per round
    #[default]
    SingleSlot,
    /// Two distinct random neighbours, once a controller has all four
    /// directions filled; otherwise behaves like `SingleSlot`
    TwoSlot,
}

/// Runtime knobs of the gossip protocol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SharingConfig {
    /// Knowledge base settings shared by every agent
    pub knowledge: KnowledgeConfig,
    /// Maximum distance (m) between directional controller neighbours
    pub neighbor_radius: f64,
    /// Maximum distance (m) at which a car reaches a controller or another car
    pub car_report_radius: f64,
    pub fan_out: FanOut,
    /// Cars also report to cars in range
    pub car_to_car_sharing: bool,
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            knowledge: KnowledgeConfig::default(),
            neighbor_radius: 2_000.0,
            car_report_radius: 500.0,
            fan_out: FanOut::SingleSlot,
            car_to_car_sharing: false,
        }
    }
}

impl SharingConfig {
    /// Trust received costs without a quorum.
    #[must_use]
    pub fn without_voting(mut self) -> Self {
        self.knowledge.use_voting_system = false;
        self
    }

    #[must_use]
    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    #[must_use]
    pub fn with_neighbor_radius(mut self, radius: f64) -> Self {
        self.neighbor_radius = radius;
        self
    }

    #[must_use]
    pub fn with_car_report_radius(mut self, radius: f64) -> Self {
        self.car_report_radius = radius;
        self
    }

    #[must_use]
    pub fn with_car_to_car_sharing(mut self, enabled: bool) -> Self {
        self.car_to_car_sharing = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol() {
        let config = SharingConfig::default();
        assert!(config.knowledge.use_voting_system);
        assert_eq!(config.fan_out, FanOut::SingleSlot);
        assert!(!config.car_to_car_sharing);
    }

    #[test]
    fn builders_chain() {
        let config = SharingConfig::default()
            .without_voting()
            .with_fan_out(FanOut::TwoSlot)
            .with_car_to_car_sharing(true)
            .with_neighbor_radius(800.0);
        assert!(!config.knowledge.use_voting_system);
        assert_eq!(config.fan_out, FanOut::TwoSlot);
        assert!(config.car_to_car_sharing);
        assert_eq!(config.neighbor_radius, 800.0);
        assert_eq!(config.car_report_radius, SharingConfig::default().car_report_radius);
    }
}
