//! Read-only query API for inspecting colony state.
//!
//! Snapshot types are owned copies, suitable for UI panels or logging; they
//! hold no references into the colony.

use crate::fixed::Fixed64;
use crate::id::{ResourceType, UnitId};
use crate::spatial::CellPos;
use crate::unit::{ConditionStatus, ProductionUnit, UnitState};

// ---------------------------------------------------------------------------
// Unit snapshot
// ---------------------------------------------------------------------------

/// An aggregated, read-only view of a single production unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub name: String,
    pub position: CellPos,
    pub output: ResourceType,
    pub state: UnitState,
    /// Progress as a 0..1 fraction.
    pub progress: Fixed64,
    /// Efficiency as of the last update.
    pub efficiency: Fixed64,
    pub paused: bool,
    pub operational: bool,
    pub maintenance: bool,
    pub output_blocked: bool,
    pub priority: Option<u32>,
    pub workers: u32,
    pub worker_limit: u32,
    pub required_workers: u32,
    pub conditions: Vec<ConditionStatus>,
}

impl UnitSnapshot {
    pub fn of(id: UnitId, unit: &ProductionUnit) -> Self {
        Self {
            id,
            name: unit.name().to_string(),
            position: unit.position(),
            output: unit.output(),
            state: unit.state(),
            progress: unit.progress(),
            efficiency: unit.efficiency(),
            paused: unit.is_paused(),
            operational: unit.is_operational(),
            maintenance: unit.in_maintenance(),
            output_blocked: unit.is_output_blocked(),
            priority: unit.priority(),
            workers: unit.worker_count(),
            worker_limit: unit.worker_limit(),
            required_workers: unit.required_workers(),
            conditions: unit.condition_status(),
        }
    }
}

// ---------------------------------------------------------------------------
// Colony summary
// ---------------------------------------------------------------------------

/// Colony-wide figures at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ColonySummary {
    pub tick: u64,
    pub elapsed: Fixed64,
    pub halted: bool,
    pub stock: Vec<(ResourceType, u32)>,
    pub current_volume: Fixed64,
    pub total_capacity: Fixed64,
    pub worker_count: u32,
    pub worker_limit: u32,
    pub unemployed: u32,
    pub satisfaction: Fixed64,
    pub units: usize,
    pub producing: usize,
    pub funds: i64,
}
