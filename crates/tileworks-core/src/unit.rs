//! Production units: declarative input conditions, the per-tick state
//! machine and periodic upkeep.
//!
//! A unit never owns shared services. Each update borrows the ledger, the
//! spatial allocator and the worker pool through a [`UnitContext`] and
//! returns a [`UnitTickReport`] describing what happened; the scheduler turns
//! reports into events.

use std::collections::BTreeSet;

use crate::economy::Economy;
use crate::fixed::{Fixed64, clamp01, ratio};
use crate::id::{ResourceType, UnitId};
use crate::ledger::ResourceLedger;
use crate::spatial::{CellPos, SpatialAllocator};
use crate::workforce::WorkforceAllocator;

/// Storage conditions stop pulling once a cycle is this far along.
const PULL_CUTOFF: f64 = 0.85;

/// Efficiency at or below this is not operational.
const OPERATIONAL_THRESHOLD: f64 = 0.01;

// ---------------------------------------------------------------------------
// Definition types
// ---------------------------------------------------------------------------

/// Where a condition's input comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ConditionKind {
    /// Stock pulled from the shared ledger and held for the cycle.
    StorageResource,
    /// Map cells carrying the resource within `radius` of the unit.
    EnvironmentTile { radius: u32 },
}

/// A single input requirement.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProductionCondition {
    pub resource: ResourceType,
    pub required_amount: u32,
    pub kind: ConditionKind,
    /// Player throttle, never above `required_amount`.
    pub requested_amount: u32,
}

impl ProductionCondition {
    pub fn storage(resource: ResourceType, required_amount: u32) -> Self {
        Self {
            resource,
            required_amount,
            kind: ConditionKind::StorageResource,
            requested_amount: required_amount,
        }
    }

    pub fn tiles(resource: ResourceType, required_amount: u32, radius: u32) -> Self {
        Self {
            resource,
            required_amount,
            kind: ConditionKind::EnvironmentTile { radius },
            requested_amount: required_amount,
        }
    }
}

/// Template a unit is placed from.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionDef {
    pub name: String,
    pub output: ResourceType,
    /// Seconds per cycle at full efficiency.
    pub base_cycle_time: Fixed64,
    pub base_output_amount: u32,
    /// Lower ranks update first; unranked units go last.
    pub priority: Option<u32>,
    /// 0 means the unit needs no workers.
    pub required_workers: u32,
    /// Funds spent per service interval.
    pub service_cost: i64,
    pub service_interval: Fixed64,
    pub conditions: Vec<ProductionCondition>,
}

impl ProductionDef {
    pub fn new(
        name: impl Into<String>,
        output: ResourceType,
        base_cycle_time: Fixed64,
        base_output_amount: u32,
    ) -> Self {
        Self {
            name: name.into(),
            output,
            base_cycle_time,
            base_output_amount,
            priority: None,
            required_workers: 0,
            service_cost: 0,
            service_interval: Fixed64::from_num(10),
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: ProductionCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_priority(mut self, rank: u32) -> Self {
        self.priority = Some(rank);
        self
    }

    pub fn with_workers(mut self, required: u32) -> Self {
        self.required_workers = required;
        self
    }

    pub fn with_service(mut self, cost: i64, interval: Fixed64) -> Self {
        self.service_cost = cost;
        self.service_interval = interval;
        self
    }

    /// Configuration problems. None of them stop a unit from being built.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.base_cycle_time <= Fixed64::ZERO {
            errors.push(ConfigError::ZeroCycleTime {
                unit: self.name.clone(),
            });
        }
        let mut seen = BTreeSet::new();
        for condition in &self.conditions {
            if !seen.insert(condition.resource) {
                errors.push(ConfigError::DuplicateCondition {
                    unit: self.name.clone(),
                    resource: condition.resource,
                });
            }
            if condition.required_amount == 0 {
                errors.push(ConfigError::ZeroRequiredAmount {
                    unit: self.name.clone(),
                    resource: condition.resource,
                });
            }
        }
        errors
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unit '{unit}' has more than one condition for resource {resource:?}")]
    DuplicateCondition { unit: String, resource: ResourceType },
    #[error("unit '{unit}' requires zero of resource {resource:?}")]
    ZeroRequiredAmount { unit: String, resource: ResourceType },
    #[error("unit '{unit}' has a non-positive cycle time")]
    ZeroCycleTime { unit: String },
}

// ---------------------------------------------------------------------------
// Runtime state
// ---------------------------------------------------------------------------

/// Coarse unit state, reported in events and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum UnitState {
    Paused,
    /// Efficiency too low to make progress.
    Starved,
    Producing,
}

/// One condition plus what the unit currently holds against it.
#[derive(Debug, Clone)]
struct ConditionSlot {
    condition: ProductionCondition,
    /// Stock pulled for the current cycle (storage conditions).
    committed: u32,
    /// Claimed cells in claim order (tile conditions).
    cells: Vec<CellPos>,
}

impl ConditionSlot {
    fn satisfied(&self) -> u32 {
        match self.condition.kind {
            ConditionKind::StorageResource => self.committed,
            ConditionKind::EnvironmentTile { .. } => self.cells.len() as u32,
        }
    }
}

/// Per-condition view for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionStatus {
    pub resource: ResourceType,
    pub kind: ConditionKind,
    pub satisfied: u32,
    pub required: u32,
    pub requested: u32,
}

/// Shared services a unit reads and mutates during its update.
pub struct UnitContext<'a> {
    pub id: UnitId,
    pub ledger: &'a mut ResourceLedger,
    pub spatial: &'a mut SpatialAllocator,
    pub workforce: &'a mut WorkforceAllocator,
}

/// What a single update did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitTickReport {
    /// New state, if it differs from the previous one.
    pub state_changed: Option<UnitState>,
    /// Output quantity pushed to the ledger.
    pub cycle_completed: Option<u32>,
    /// Set on the tick the output first fails to fit.
    pub output_blocked: bool,
    /// Stock pulled from the ledger this tick.
    pub consumed: Vec<(ResourceType, u32)>,
}

/// Stock and workers a unit holds, handed back on removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitHoldings {
    pub commitments: Vec<(ResourceType, u32)>,
    pub workers: u32,
}

// ---------------------------------------------------------------------------
// ProductionUnit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ProductionUnit {
    name: String,
    position: CellPos,
    output: ResourceType,
    base_cycle_time: Fixed64,
    base_output_amount: u32,
    priority: Option<u32>,
    required_workers: u32,
    service_cost: i64,
    service_interval: Fixed64,
    conditions: Vec<ConditionSlot>,
    /// Candidate cells seen but not claimed; skipped until a terrain change.
    blocked: BTreeSet<CellPos>,

    /// Effective seconds worked on the current cycle.
    work: Fixed64,
    efficiency: Fixed64,
    paused: bool,
    operational: bool,
    worker_count: u32,
    worker_limit: u32,
    maintenance: bool,
    service_timer: Fixed64,
    output_blocked: bool,
    state: UnitState,
}

impl ProductionUnit {
    /// Build a unit at `position`. Configuration problems are logged and the
    /// unit is built anyway; for duplicated conditions the last one wins.
    pub fn new(def: &ProductionDef, position: CellPos) -> Self {
        for error in def.validate() {
            match error {
                ConfigError::DuplicateCondition { .. } => {
                    tracing::error!(%error, "invalid production definition")
                }
                ConfigError::ZeroRequiredAmount { .. } | ConfigError::ZeroCycleTime { .. } => {
                    tracing::warn!(%error, "suspicious production definition")
                }
            }
        }

        let mut conditions: Vec<ConditionSlot> = Vec::with_capacity(def.conditions.len());
        for condition in &def.conditions {
            let mut condition = condition.clone();
            condition.requested_amount = condition.requested_amount.min(condition.required_amount);
            let slot = ConditionSlot {
                condition,
                committed: 0,
                cells: Vec::new(),
            };
            match conditions
                .iter_mut()
                .find(|s| s.condition.resource == slot.condition.resource)
            {
                Some(existing) => *existing = slot,
                None => conditions.push(slot),
            }
        }

        Self {
            name: def.name.clone(),
            position,
            output: def.output,
            base_cycle_time: def.base_cycle_time,
            base_output_amount: def.base_output_amount,
            priority: def.priority,
            required_workers: def.required_workers,
            service_cost: def.service_cost,
            service_interval: def.service_interval,
            conditions,
            blocked: BTreeSet::new(),
            work: Fixed64::ZERO,
            efficiency: Fixed64::ZERO,
            paused: false,
            operational: false,
            worker_count: 0,
            worker_limit: def.required_workers,
            maintenance: false,
            service_timer: def.service_interval,
            output_blocked: false,
            state: UnitState::Starved,
        }
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance the unit by `dt` seconds. Paused units do nothing.
    pub fn update(&mut self, dt: Fixed64, ctx: &mut UnitContext<'_>) -> UnitTickReport {
        let mut report = UnitTickReport::default();
        if self.paused {
            return report;
        }

        self.pull(ctx, &mut report);
        self.balance_workers(ctx.workforce);
        self.efficiency = self.compute_efficiency();
        self.operational = self.efficiency > Fixed64::from_num(OPERATIONAL_THRESHOLD);

        if self.operational {
            self.advance(dt, ctx.ledger, &mut report);
        }

        let state = if self.operational {
            UnitState::Producing
        } else {
            UnitState::Starved
        };
        if state != self.state {
            self.state = state;
            report.state_changed = Some(state);
        }
        report
    }

    fn pull(&mut self, ctx: &mut UnitContext<'_>, report: &mut UnitTickReport) {
        let storage_open = self.progress() <= Fixed64::from_num(PULL_CUTOFF);
        for slot in &mut self.conditions {
            let resource = slot.condition.resource;
            match slot.condition.kind {
                ConditionKind::StorageResource => {
                    if !storage_open {
                        continue;
                    }
                    let needed = slot.condition.requested_amount.saturating_sub(slot.committed);
                    if needed == 0 {
                        continue;
                    }
                    let taken = ctx.ledger.consume_resource(resource, needed);
                    if taken > 0 {
                        slot.committed += taken;
                        report.consumed.push((resource, taken));
                        tracing::trace!(unit = %self.name, ?resource, taken, "pulled stock");
                    }
                }
                ConditionKind::EnvironmentTile { radius } => {
                    let needed = slot
                        .condition
                        .required_amount
                        .saturating_sub(slot.cells.len() as u32) as usize;
                    if needed == 0 {
                        continue;
                    }
                    let available: Vec<CellPos> = ctx
                        .spatial
                        .query_cells_in_radius(self.position, resource, radius)
                        .into_iter()
                        .filter(|c| !ctx.spatial.is_occupied(*c) && !self.blocked.contains(c))
                        .collect();
                    if available.is_empty() {
                        continue;
                    }
                    let split = needed.min(available.len());
                    let (claimed, rest) = available.split_at(split);
                    ctx.spatial.occupy_many(claimed, ctx.id);
                    slot.cells.extend_from_slice(claimed);
                    self.blocked.extend(rest.iter().copied());
                    tracing::trace!(unit = %self.name, ?resource, claimed = split, "claimed cells");
                }
            }
        }
    }

    fn balance_workers(&mut self, workforce: &mut WorkforceAllocator) {
        if self.worker_count < self.worker_limit {
            self.worker_count += workforce.request_workers(self.worker_limit - self.worker_count);
        } else if self.worker_count > self.worker_limit {
            workforce.release_workers(self.worker_count - self.worker_limit);
            self.worker_count = self.worker_limit;
        }
    }

    /// Worst-satisfied condition, scaled by workforce fill and halved under
    /// maintenance.
    pub fn compute_efficiency(&self) -> Fixed64 {
        let mut efficiency = self
            .conditions
            .iter()
            .filter(|s| s.condition.required_amount > 0)
            .map(|s| clamp01(ratio(s.satisfied(), s.condition.required_amount)))
            .fold(Fixed64::ONE, |a, b| a.min(b));
        if self.required_workers > 0 {
            efficiency *= clamp01(ratio(self.worker_count, self.required_workers));
        }
        if self.maintenance {
            efficiency /= Fixed64::from_num(2);
        }
        efficiency
    }

    fn advance(&mut self, dt: Fixed64, ledger: &mut ResourceLedger, report: &mut UnitTickReport) {
        self.work = self.work.saturating_add(dt.saturating_mul(self.efficiency));
        if self.work < self.base_cycle_time {
            return;
        }

        if ledger.add_resource(self.output, self.base_output_amount) {
            self.work = Fixed64::ZERO;
            self.output_blocked = false;
            for slot in &mut self.conditions {
                if slot.condition.kind == ConditionKind::StorageResource {
                    slot.committed = 0;
                }
            }
            report.cycle_completed = Some(self.base_output_amount);
        } else {
            self.work = self.base_cycle_time.max(Fixed64::ZERO);
            if !self.output_blocked {
                self.output_blocked = true;
                report.output_blocked = true;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Service
    // -----------------------------------------------------------------------

    /// Count down the service interval. On expiry the unit enters maintenance
    /// when funds are exhausted (or leaves it when they are not) and the
    /// service cost is charged either way. Returns the new maintenance flag if
    /// it changed.
    pub fn service_update(&mut self, dt: Fixed64, economy: &mut dyn Economy) -> Option<bool> {
        self.service_timer -= dt;
        if self.service_timer > Fixed64::ZERO {
            return None;
        }
        self.service_timer = self.service_interval;

        let flagged = economy.current_funds() <= 0;
        economy.spend_funds(self.service_cost);
        if flagged == self.maintenance {
            return None;
        }
        self.maintenance = flagged;
        Some(flagged)
    }

    // -----------------------------------------------------------------------
    // Player controls
    // -----------------------------------------------------------------------

    /// Returns the new state if pausing or resuming changed it.
    pub fn set_paused(&mut self, paused: bool) -> Option<UnitState> {
        if self.paused == paused {
            return None;
        }
        self.paused = paused;
        self.state = if paused {
            UnitState::Paused
        } else if self.operational {
            UnitState::Producing
        } else {
            UnitState::Starved
        };
        Some(self.state)
    }

    /// Throttle a condition. Clamped to the required amount; applies from the
    /// next pull. Returns false when the unit has no such condition.
    pub fn set_requested_amount(&mut self, resource: ResourceType, amount: u32) -> bool {
        let Some(slot) = self
            .conditions
            .iter_mut()
            .find(|s| s.condition.resource == resource)
        else {
            return false;
        };
        slot.condition.requested_amount = amount.min(slot.condition.required_amount);
        true
    }

    /// Clamped to the required worker count.
    pub fn set_worker_limit(&mut self, limit: u32) {
        self.worker_limit = limit.min(self.required_workers);
    }

    pub fn set_priority(&mut self, rank: Option<u32>) {
        self.priority = rank;
    }

    // -----------------------------------------------------------------------
    // Cells
    // -----------------------------------------------------------------------

    /// Operator claim of a single cell. Rejected (false) when the cell is
    /// occupied, carries no matching resource, lies outside the condition's
    /// radius, or the condition is already full.
    pub fn claim_cell(&mut self, id: UnitId, spatial: &mut SpatialAllocator, cell: CellPos) -> bool {
        if spatial.is_occupied(cell) {
            return false;
        }
        let Some(resource) = spatial.resource_at(cell) else {
            return false;
        };
        let position = self.position;
        let Some(slot) = self.conditions.iter_mut().find(|s| {
            s.condition.resource == resource
                && matches!(s.condition.kind, ConditionKind::EnvironmentTile { radius }
                    if position.chebyshev_distance(&cell) <= radius)
        }) else {
            return false;
        };
        if slot.cells.len() as u32 >= slot.condition.required_amount {
            return false;
        }
        spatial.occupy(cell, id);
        slot.cells.push(cell);
        self.blocked.remove(&cell);
        true
    }

    /// Operator release of an owned cell. The cell is blocked for this unit
    /// so the next scan does not take it straight back.
    pub fn release_cell(&mut self, spatial: &mut SpatialAllocator, cell: CellPos) -> bool {
        if !self.drop_cell(cell) {
            return false;
        }
        spatial.release(cell);
        self.blocked.insert(cell);
        true
    }

    /// The terrain under an owned cell lost its resource. The allocator has
    /// already dropped the occupancy.
    pub fn handle_cell_removed(&mut self, cell: CellPos) -> bool {
        self.drop_cell(cell)
    }

    /// Make a blocked cell eligible again.
    pub fn unblock_cell(&mut self, cell: CellPos) -> bool {
        self.blocked.remove(&cell)
    }

    fn drop_cell(&mut self, cell: CellPos) -> bool {
        for slot in &mut self.conditions {
            if let Some(pos) = slot.cells.iter().position(|c| *c == cell) {
                slot.cells.remove(pos);
                return true;
            }
        }
        false
    }

    /// Give up held stock, workers and cells. Cells are released from the
    /// allocator by the caller.
    pub fn take_holdings(&mut self) -> UnitHoldings {
        let mut commitments = Vec::new();
        for slot in &mut self.conditions {
            if slot.committed > 0 {
                commitments.push((slot.condition.resource, slot.committed));
                slot.committed = 0;
            }
            slot.cells.clear();
        }
        let workers = std::mem::take(&mut self.worker_count);
        UnitHoldings {
            commitments,
            workers,
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> CellPos {
        self.position
    }

    pub fn output(&self) -> ResourceType {
        self.output
    }

    pub fn base_output_amount(&self) -> u32 {
        self.base_output_amount
    }

    pub fn priority(&self) -> Option<u32> {
        self.priority
    }

    /// Fraction of the current cycle done, `0..=1`.
    pub fn progress(&self) -> Fixed64 {
        if self.base_cycle_time <= Fixed64::ZERO {
            return Fixed64::ZERO;
        }
        clamp01(self.work / self.base_cycle_time)
    }

    pub fn efficiency(&self) -> Fixed64 {
        self.efficiency
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    pub fn in_maintenance(&self) -> bool {
        self.maintenance
    }

    pub fn is_output_blocked(&self) -> bool {
        self.output_blocked
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn worker_count(&self) -> u32 {
        self.worker_count
    }

    pub fn worker_limit(&self) -> u32 {
        self.worker_limit
    }

    pub fn required_workers(&self) -> u32 {
        self.required_workers
    }

    /// Stock held for the current cycle.
    pub fn committed(&self, resource: ResourceType) -> u32 {
        self.conditions
            .iter()
            .find(|s| s.condition.resource == resource)
            .map(|s| s.committed)
            .unwrap_or(0)
    }

    /// Cells claimed for a tile condition, in claim order.
    pub fn allocated_cells(&self, resource: ResourceType) -> &[CellPos] {
        self.conditions
            .iter()
            .find(|s| s.condition.resource == resource)
            .map(|s| s.cells.as_slice())
            .unwrap_or(&[])
    }

    pub fn blocked_cells(&self) -> &BTreeSet<CellPos> {
        &self.blocked
    }

    pub fn condition(&self, resource: ResourceType) -> Option<&ProductionCondition> {
        self.conditions
            .iter()
            .map(|s| &s.condition)
            .find(|c| c.resource == resource)
    }

    pub fn condition_status(&self) -> Vec<ConditionStatus> {
        self.conditions
            .iter()
            .map(|s| ConditionStatus {
                resource: s.condition.resource,
                kind: s.condition.kind,
                satisfied: s.satisfied(),
                required: s.condition.required_amount,
                requested: s.condition.requested_amount,
            })
            .collect()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
