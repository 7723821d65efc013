//! Tuning knobs for a colony session.
//!
//! Both structs are plain serde values with defaults for every field, so a
//! host can override just the parts it cares about.

use serde::{Deserialize, Serialize};

use crate::fixed::Fixed64;
use crate::id::ResourceType;

/// Worker pool tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkforceConfig {
    /// Starting worker limit, worker count and unemployed count.
    pub base_limit: u32,
    /// Seconds between recruitment waves while below the limit.
    pub replenishment_interval: Fixed64,
    /// Seconds before satisfaction starts to drift.
    pub satisfaction_start_delay: Fixed64,
    pub min_satisfaction: Fixed64,
    pub max_satisfaction: Fixed64,
    pub initial_satisfaction: Fixed64,
    /// Recruits per wave by satisfaction tier.
    pub yield_lowest: u32,
    pub yield_low: u32,
    pub yield_medium: u32,
    pub yield_high: u32,
    pub yield_highest: u32,
    /// Satisfaction drift per second by unemployment tier.
    pub no_unemployment_effect: Fixed64,
    pub low_unemployment_effect: Fixed64,
    pub medium_unemployment_effect: Fixed64,
    pub high_unemployment_effect: Fixed64,
    /// Drift per second per percent of homeless workers.
    pub homelessness_factor: Fixed64,
}

impl Default for WorkforceConfig {
    fn default() -> Self {
        Self {
            base_limit: 10,
            replenishment_interval: Fixed64::from_num(2.5),
            satisfaction_start_delay: Fixed64::ONE,
            min_satisfaction: Fixed64::ONE,
            max_satisfaction: Fixed64::from_num(5),
            initial_satisfaction: Fixed64::from_num(3),
            yield_lowest: 1,
            yield_low: 1,
            yield_medium: 2,
            yield_high: 3,
            yield_highest: 5,
            no_unemployment_effect: Fixed64::from_num(0.05),
            low_unemployment_effect: Fixed64::from_num(0.02),
            medium_unemployment_effect: Fixed64::from_num(-0.02),
            high_unemployment_effect: Fixed64::from_num(-0.05),
            homelessness_factor: Fixed64::from_num(0.01),
        }
    }
}

/// Session-wide settings consumed by [`Colony::new`](crate::colony::Colony::new).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColonyConfig {
    /// Storage capacity before any storage building is placed.
    pub base_capacity: Fixed64,
    /// Stock added to the ledger at construction, in order.
    pub start_resources: Vec<(ResourceType, u32)>,
    pub workforce: WorkforceConfig,
    /// Ring buffer size per event kind.
    pub event_buffer_capacity: usize,
}

impl Default for ColonyConfig {
    fn default() -> Self {
        Self {
            base_capacity: Fixed64::from_num(100),
            start_resources: Vec::new(),
            workforce: WorkforceConfig::default(),
            event_buffer_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workforce_defaults() {
        let cfg = WorkforceConfig::default();
        assert_eq!(cfg.replenishment_interval, Fixed64::from_num(2.5));
        assert_eq!(cfg.initial_satisfaction, Fixed64::from_num(3));
        assert!(cfg.min_satisfaction <= cfg.initial_satisfaction);
        assert!(cfg.initial_satisfaction <= cfg.max_satisfaction);
    }

    #[test]
    fn colony_defaults() {
        let cfg = ColonyConfig::default();
        assert_eq!(cfg.base_capacity, Fixed64::from_num(100));
        assert!(cfg.start_resources.is_empty());
        assert_eq!(cfg.event_buffer_capacity, 1024);
    }
}
