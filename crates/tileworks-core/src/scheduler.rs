//! Registry of production units and the per-tick update order.
//!
//! Units live in a slot map keyed by [`UnitId`]. Every registered unit is
//! billed by the service pass; the unpaused subset (the active set) is
//! updated by the production pass in ascending priority, ranked units before
//! unranked ones and ties broken by registration order. An earlier unit in
//! that order always sees the shared services first, which is how contention
//! for stock, cells and workers is resolved.

use slotmap::{SecondaryMap, SlotMap};

use crate::economy::Economy;
use crate::event::Event;
use crate::fixed::Fixed64;
use crate::id::{ResourceType, UnitId};
use crate::ledger::ResourceLedger;
use crate::spatial::{CellPos, SpatialAllocator};
use crate::unit::{ProductionUnit, UnitContext};
use crate::workforce::WorkforceAllocator;

#[derive(Debug, Default)]
pub struct ProductionScheduler {
    units: SlotMap<UnitId, ProductionUnit>,
    /// Registration sequence number per registered unit.
    sequence: SecondaryMap<UnitId, u64>,
    /// Registered units in registration order.
    registry: Vec<UnitId>,
    /// Registered, unpaused units in update order.
    active: Vec<UnitId>,
    next_sequence: u64,
    halted: bool,
    outbox: Vec<Event>,
}

impl ProductionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Take ownership of a unit. It does nothing until registered.
    pub fn add_unit(&mut self, unit: ProductionUnit) -> UnitId {
        self.units.insert(unit)
    }

    /// Register a unit for updates. Returns false for unknown ids and for
    /// units that are already registered.
    pub fn register(&mut self, id: UnitId) -> bool {
        let Some(unit) = self.units.get(id) else {
            return false;
        };
        if self.sequence.contains_key(id) {
            return false;
        }
        tracing::debug!(unit = %unit.name(), "unit registered");
        let paused = unit.is_paused();
        self.sequence.insert(id, self.next_sequence);
        self.next_sequence += 1;
        self.registry.push(id);
        if !paused {
            self.active.push(id);
            self.sort_active();
        }
        self.outbox.push(Event::UnitRegistered { unit: id });
        true
    }

    /// Remove a unit and hand back everything it holds: its cells are
    /// released, its workers return to the pool and its committed stock goes
    /// back to the ledger as far as capacity allows.
    pub fn unregister(
        &mut self,
        id: UnitId,
        ledger: &mut ResourceLedger,
        spatial: &mut SpatialAllocator,
        workforce: &mut WorkforceAllocator,
    ) -> Option<ProductionUnit> {
        let mut unit = self.units.remove(id)?;
        let was_registered = self.sequence.remove(id).is_some();
        self.registry.retain(|u| *u != id);
        self.active.retain(|u| *u != id);

        spatial.release_all(id);
        let holdings = unit.take_holdings();
        workforce.release_workers(holdings.workers);
        for (resource, amount) in holdings.commitments {
            let refund = amount.min(ledger.room_for(resource));
            if refund > 0 {
                ledger.add_resource(resource, refund);
            }
            if refund < amount {
                tracing::warn!(
                    unit = %unit.name(),
                    ?resource,
                    refunded = refund,
                    lost = amount - refund,
                    "no room to refund all committed stock"
                );
            }
        }

        if was_registered {
            tracing::debug!(unit = %unit.name(), "unit unregistered");
            self.outbox.push(Event::UnitUnregistered { unit: id });
        }
        Some(unit)
    }

    pub fn is_registered(&self, id: UnitId) -> bool {
        self.sequence.contains_key(id)
    }

    // -----------------------------------------------------------------------
    // Controls
    // -----------------------------------------------------------------------

    /// Pause or resume a unit. Takes effect from the next production pass.
    pub fn set_paused(&mut self, id: UnitId, paused: bool) -> bool {
        let Some(unit) = self.units.get_mut(id) else {
            return false;
        };
        if let Some(state) = unit.set_paused(paused) {
            self.outbox.push(Event::UnitStateChanged { unit: id, state });
        }
        self.set_active(id, !paused);
        true
    }

    /// Add to or drop from the active set. Only registered units can be
    /// active.
    pub fn set_active(&mut self, id: UnitId, active: bool) {
        let listed = self.active.contains(&id);
        if active && !listed && self.is_registered(id) {
            self.active.push(id);
            self.sort_active();
        } else if !active && listed {
            self.active.retain(|u| *u != id);
        }
    }

    pub fn set_priority(&mut self, id: UnitId, rank: Option<u32>) -> bool {
        let Some(unit) = self.units.get_mut(id) else {
            return false;
        };
        unit.set_priority(rank);
        self.sort_active();
        true
    }

    pub fn set_requested_amount(&mut self, id: UnitId, resource: ResourceType, amount: u32) -> bool {
        self.units
            .get_mut(id)
            .is_some_and(|unit| unit.set_requested_amount(resource, amount))
    }

    pub fn set_worker_limit(&mut self, id: UnitId, limit: u32) -> bool {
        let Some(unit) = self.units.get_mut(id) else {
            return false;
        };
        unit.set_worker_limit(limit);
        true
    }

    /// Stop both passes for good. Unit state is kept for inspection.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    fn sort_active(&mut self) {
        let units = &self.units;
        let sequence = &self.sequence;
        self.active.sort_by_key(|id| {
            let rank = units.get(*id).and_then(|u| u.priority()).unwrap_or(u32::MAX);
            let seq = sequence.get(*id).copied().unwrap_or(u64::MAX);
            (rank, seq)
        });
    }

    // -----------------------------------------------------------------------
    // Passes
    // -----------------------------------------------------------------------

    /// Update every active unit once, in priority order.
    pub fn tick_production(
        &mut self,
        dt: Fixed64,
        ledger: &mut ResourceLedger,
        spatial: &mut SpatialAllocator,
        workforce: &mut WorkforceAllocator,
    ) {
        if self.halted {
            return;
        }
        for &id in &self.active {
            let Some(unit) = self.units.get_mut(id) else {
                continue;
            };
            let mut ctx = UnitContext {
                id,
                ledger: &mut *ledger,
                spatial: &mut *spatial,
                workforce: &mut *workforce,
            };
            let report = unit.update(dt, &mut ctx);

            if let Some(state) = report.state_changed {
                self.outbox.push(Event::UnitStateChanged { unit: id, state });
            }
            if report.output_blocked {
                self.outbox.push(Event::OutputBlocked { unit: id });
            }
            if let Some(quantity) = report.cycle_completed {
                self.outbox.push(Event::CycleCompleted {
                    unit: id,
                    resource: unit.output(),
                    quantity,
                });
            }
        }
    }

    /// Run upkeep for every registered unit, paused or not.
    pub fn tick_service(&mut self, dt: Fixed64, economy: &mut dyn Economy) {
        if self.halted {
            return;
        }
        for &id in &self.registry {
            let Some(unit) = self.units.get_mut(id) else {
                continue;
            };
            if let Some(flagged) = unit.service_update(dt, economy) {
                tracing::debug!(unit = %unit.name(), flagged, "maintenance changed");
                self.outbox.push(Event::MaintenanceChanged { unit: id, flagged });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Cells
    // -----------------------------------------------------------------------

    /// A terrain edit touched `cell`. Every unit may scan it again; if the
    /// allocator evicted an owner, that owner drops the cell.
    pub fn handle_terrain_change(&mut self, cell: CellPos, evicted: Option<UnitId>) {
        for unit in self.units.values_mut() {
            unit.unblock_cell(cell);
        }
        if let Some(owner) = evicted
            && let Some(unit) = self.units.get_mut(owner)
        {
            unit.handle_cell_removed(cell);
        }
    }

    pub fn claim_cell(&mut self, id: UnitId, spatial: &mut SpatialAllocator, cell: CellPos) -> bool {
        self.units
            .get_mut(id)
            .is_some_and(|unit| unit.claim_cell(id, spatial, cell))
    }

    pub fn release_cell(&mut self, id: UnitId, spatial: &mut SpatialAllocator, cell: CellPos) -> bool {
        self.units
            .get_mut(id)
            .is_some_and(|unit| unit.release_cell(spatial, cell))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get(&self, id: UnitId) -> Option<&ProductionUnit> {
        self.units.get(id)
    }

    /// Registered units in registration order.
    pub fn registered(&self) -> &[UnitId] {
        &self.registry
    }

    /// Active units in update order.
    pub fn active(&self) -> &[UnitId] {
        &self.active
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (UnitId, &ProductionUnit)> {
        self.registry
            .iter()
            .filter_map(|&id| self.units.get(id).map(|u| (id, u)))
    }

    /// Take the events recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
