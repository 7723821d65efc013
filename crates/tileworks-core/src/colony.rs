//! The colony: one simulation session owning every shared service.
//!
//! # Architecture
//!
//! The `Colony` owns:
//! - A [`ResourceLedger`] (global stock and storage capacity)
//! - A [`SpatialAllocator`] (resource cell cache and occupancy)
//! - A [`WorkforceAllocator`] (worker pool and satisfaction)
//! - A [`ProductionScheduler`] (units, registry, active order)
//! - The [`Economy`] collaborator that pays for upkeep
//! - An [`EventBus`] for typed simulation events
//!
//! # Step pipeline
//!
//! Each [`step`](Colony::step) runs:
//! 1. **Production** -- active units pull inputs and advance their cycles
//! 2. **Service** -- every registered unit counts down and pays its upkeep
//! 3. **Workforce** -- recruitment and satisfaction drift
//! 4. **Post-tick** -- component outboxes go onto the bus; events are delivered
//! 5. **Bookkeeping** -- tick counter and elapsed time
//!
//! After [`declare_bankruptcy`](Colony::declare_bankruptcy) every step is a
//! no-op. State stays readable.

use crate::catalog::ResourceCatalog;
use crate::config::ColonyConfig;
use crate::economy::Economy;
use crate::event::{Event, EventBus, EventKind, PassiveListener, SubscriptionId};
use crate::fixed::{Fixed64, Ticks};
use crate::id::{ResourceType, UnitId};
use crate::ledger::ResourceLedger;
use crate::query::{ColonySummary, UnitSnapshot};
use crate::scheduler::ProductionScheduler;
use crate::spatial::{CellPos, SpatialAllocator, Terrain};
use crate::unit::{ProductionDef, ProductionUnit, UnitState};
use crate::workforce::WorkforceAllocator;

pub struct Colony {
    catalog: ResourceCatalog,
    ledger: ResourceLedger,
    spatial: SpatialAllocator,
    workforce: WorkforceAllocator,
    scheduler: ProductionScheduler,
    economy: Box<dyn Economy>,
    /// Typed event bus for simulation events.
    pub event_bus: EventBus,
    tick: Ticks,
    elapsed: Fixed64,
    bankrupt: bool,
}

impl std::fmt::Debug for Colony {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Colony")
            .field("tick", &self.tick)
            .field("elapsed", &self.elapsed)
            .field("bankrupt", &self.bankrupt)
            .field("units", &self.scheduler.unit_count())
            .field("funds", &self.economy.current_funds())
            .finish()
    }
}

impl Colony {
    /// Build a session. Start resources are stocked in order; any that do not
    /// fit are skipped with a warning. The initial service figures are
    /// buffered as events and go out with the first step.
    pub fn new(
        catalog: &ResourceCatalog,
        config: ColonyConfig,
        terrain: &dyn Terrain,
        economy: Box<dyn Economy>,
    ) -> Self {
        let mut ledger = ResourceLedger::new(catalog, config.base_capacity);
        for &(resource, amount) in &config.start_resources {
            if !ledger.add_resource(resource, amount) {
                tracing::warn!(
                    resource = catalog.name(resource),
                    amount,
                    "start resources do not fit"
                );
            }
        }
        let workforce = WorkforceAllocator::new(config.workforce);

        let mut event_bus = EventBus::new(config.event_buffer_capacity);
        event_bus.emit_all(ledger.drain_events());
        event_bus.emit(Event::CapacityChanged {
            total_capacity: ledger.total_capacity(),
        });
        event_bus.emit(Event::WorkerLimitChanged {
            limit: workforce.worker_limit(),
        });
        event_bus.emit(Event::WorkerCountChanged {
            count: workforce.worker_count(),
        });
        event_bus.emit(Event::UnemployedChanged {
            unemployed: workforce.unemployed(),
        });
        event_bus.emit(Event::SatisfactionChanged {
            level: workforce.satisfaction(),
            modifier: workforce.satisfaction_modifier(),
        });

        Self {
            catalog: catalog.clone(),
            ledger,
            spatial: SpatialAllocator::from_terrain(terrain),
            workforce,
            scheduler: ProductionScheduler::new(),
            economy,
            event_bus,
            tick: 0,
            elapsed: Fixed64::ZERO,
            bankrupt: false,
        }
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// Advance the colony by `dt` seconds. Returns false (and does nothing)
    /// once bankrupt.
    pub fn step(&mut self, dt: Fixed64) -> bool {
        if self.bankrupt {
            return false;
        }

        // Phase 1: Production.
        self.scheduler.tick_production(
            dt,
            &mut self.ledger,
            &mut self.spatial,
            &mut self.workforce,
        );

        // Phase 2: Service.
        self.scheduler.tick_service(dt, self.economy.as_mut());

        // Phase 3: Workforce.
        self.workforce.update_recruitment(dt);
        self.workforce.update_satisfaction(dt);

        // Phase 4: Post-tick.
        self.flush_events();

        // Phase 5: Bookkeeping.
        self.tick += 1;
        self.elapsed = self.elapsed.saturating_add(dt);
        true
    }

    /// Move everything the services recorded onto the bus and deliver it.
    pub fn flush_events(&mut self) {
        self.event_bus.emit_all(self.ledger.drain_events());
        self.event_bus.emit_all(self.workforce.drain_events());
        self.event_bus.emit_all(self.scheduler.drain_events());
        self.event_bus.deliver();
    }

    /// The economy went under. Production and service stop for good; the
    /// signal is delivered right away since no later step will run.
    pub fn declare_bankruptcy(&mut self) {
        if self.bankrupt {
            return;
        }
        tracing::debug!(tick = self.tick, "bankruptcy declared, halting production");
        self.bankrupt = true;
        self.scheduler.halt();
        self.event_bus.emit(Event::Bankruptcy);
        self.flush_events();
    }

    pub fn is_bankrupt(&self) -> bool {
        self.bankrupt
    }

    // -----------------------------------------------------------------------
    // Units
    // -----------------------------------------------------------------------

    /// Build a unit from `def` at `position` and register it.
    pub fn place_unit(&mut self, def: &ProductionDef, position: CellPos) -> UnitId {
        let id = self
            .scheduler
            .add_unit(ProductionUnit::new(def, position));
        self.scheduler.register(id);
        id
    }

    /// Demolish a unit. Returns false for unknown ids.
    pub fn remove_unit(&mut self, id: UnitId) -> bool {
        self.scheduler
            .unregister(id, &mut self.ledger, &mut self.spatial, &mut self.workforce)
            .is_some()
    }

    pub fn set_paused(&mut self, id: UnitId, paused: bool) -> bool {
        self.scheduler.set_paused(id, paused)
    }

    pub fn set_worker_limit(&mut self, id: UnitId, limit: u32) -> bool {
        self.scheduler.set_worker_limit(id, limit)
    }

    pub fn set_requested_amount(&mut self, id: UnitId, resource: ResourceType, amount: u32) -> bool {
        self.scheduler.set_requested_amount(id, resource, amount)
    }

    pub fn set_priority(&mut self, id: UnitId, rank: Option<u32>) -> bool {
        self.scheduler.set_priority(id, rank)
    }

    pub fn claim_cell(&mut self, id: UnitId, cell: CellPos) -> bool {
        self.scheduler.claim_cell(id, &mut self.spatial, cell)
    }

    pub fn release_cell(&mut self, id: UnitId, cell: CellPos) -> bool {
        self.scheduler.release_cell(id, &mut self.spatial, cell)
    }

    // -----------------------------------------------------------------------
    // Collaborator signals
    // -----------------------------------------------------------------------

    /// Storage built (+) or demolished (-).
    pub fn adjust_capacity(&mut self, delta: Fixed64) {
        self.ledger.adjust_capacity(delta);
    }

    /// Housing built (+) or demolished (-).
    pub fn adjust_worker_limit(&mut self, delta: i32) {
        self.workforce.adjust_worker_limit(delta);
    }

    /// The terrain layer changed at `cell`. Refreshes the cache, evicts the
    /// occupant if the resource is gone and lets every unit rescan the cell.
    pub fn on_terrain_cell_changed(&mut self, terrain: &dyn Terrain, cell: CellPos) {
        let evicted = self.spatial.notify_terrain_cell_changed(terrain, cell);
        if let Some(unit) = evicted {
            self.event_bus.emit(Event::CellEvicted { cell, unit });
        }
        self.scheduler.handle_terrain_change(cell, evicted);
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn on_event(&mut self, kind: EventKind, listener: PassiveListener) -> SubscriptionId {
        self.event_bus.on_passive(kind, listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.event_bus.unsubscribe(id)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn snapshot(&self, id: UnitId) -> Option<UnitSnapshot> {
        self.scheduler.get(id).map(|unit| UnitSnapshot::of(id, unit))
    }

    /// Snapshots of every registered unit in registration order.
    pub fn snapshots(&self) -> Vec<UnitSnapshot> {
        self.scheduler
            .iter()
            .map(|(id, unit)| UnitSnapshot::of(id, unit))
            .collect()
    }

    pub fn summary(&self) -> ColonySummary {
        ColonySummary {
            tick: self.tick,
            elapsed: self.elapsed,
            halted: self.bankrupt,
            stock: self.ledger.stock().collect(),
            current_volume: self.ledger.current_volume(),
            total_capacity: self.ledger.total_capacity(),
            worker_count: self.workforce.worker_count(),
            worker_limit: self.workforce.worker_limit(),
            unemployed: self.workforce.unemployed(),
            satisfaction: self.workforce.satisfaction(),
            units: self.scheduler.registered().len(),
            producing: self
                .scheduler
                .iter()
                .filter(|(_, u)| u.state() == UnitState::Producing)
                .count(),
            funds: self.economy.current_funds(),
        }
    }

    pub fn unit(&self, id: UnitId) -> Option<&ProductionUnit> {
        self.scheduler.get(id)
    }

    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Direct ledger access for hosts that trade or build outside a step.
    pub fn ledger_mut(&mut self) -> &mut ResourceLedger {
        &mut self.ledger
    }

    pub fn spatial(&self) -> &SpatialAllocator {
        &self.spatial
    }

    pub fn workforce(&self) -> &WorkforceAllocator {
        &self.workforce
    }

    pub fn scheduler(&self) -> &ProductionScheduler {
        &self.scheduler
    }

    pub fn economy(&self) -> &dyn Economy {
        self.economy.as_ref()
    }

    pub fn economy_mut(&mut self) -> &mut dyn Economy {
        self.economy.as_mut()
    }

    pub fn tick(&self) -> Ticks {
        self.tick
    }

    /// Simulated seconds since construction.
    pub fn elapsed(&self) -> Fixed64 {
        self.elapsed
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogBuilder;
    use crate::config::WorkforceConfig;
    use crate::economy::Treasury;
    use crate::spatial::GridTerrain;
    use crate::unit::ProductionCondition;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fixed(v: f64) -> Fixed64 {
        Fixed64::from_num(v)
    }

    struct Setup {
        catalog: ResourceCatalog,
        terrain: GridTerrain,
        wood: ResourceType,
        plank: ResourceType,
        forest: ResourceType,
    }

    fn setup() -> Setup {
        let mut b = CatalogBuilder::new();
        let wood = b.register("wood", fixed(1.0)).unwrap();
        let plank = b.register("plank", fixed(1.0)).unwrap();
        let forest = b.register("forest", fixed(0.0)).unwrap();
        let mut terrain = GridTerrain::new();
        terrain.fill(CellPos::new(1, 1), CellPos::new(2, 2), forest);
        Setup {
            catalog: b.build(),
            terrain,
            wood,
            plank,
            forest,
        }
    }

    fn colony(s: &Setup, start_wood: u32, funds: i64) -> Colony {
        let config = ColonyConfig {
            start_resources: vec![(s.wood, start_wood)],
            workforce: WorkforceConfig {
                base_limit: 5,
                ..WorkforceConfig::default()
            },
            ..ColonyConfig::default()
        };
        Colony::new(&s.catalog, config, &s.terrain, Box::new(Treasury::new(funds)))
    }

    fn record(colony: &mut Colony, kind: EventKind) -> Rc<RefCell<Vec<Event>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        colony.on_event(kind, Box::new(move |e| sink.borrow_mut().push(e.clone())));
        seen
    }

    // -----------------------------------------------------------------------
    // Test 1: Construction stocks start resources and buffers initial figures
    // -----------------------------------------------------------------------
    #[test]
    fn construction_stocks_and_announces() {
        let s = setup();
        let mut c = colony(&s, 20, 100);
        let limits = record(&mut c, EventKind::WorkerLimitChanged);
        assert_eq!(c.ledger().quantity(s.wood), 20);
        assert_eq!(c.ledger().total_capacity(), fixed(100.0));
        assert_eq!(c.spatial().resource_cell_count(), 4);

        c.step(fixed(0.1));
        assert_eq!(*limits.borrow(), vec![Event::WorkerLimitChanged { limit: 5 }]);
    }

    #[test]
    fn oversized_start_resources_skipped() {
        let s = setup();
        let c = colony(&s, 500, 100);
        assert_eq!(c.ledger().quantity(s.wood), 0);
    }

    // -----------------------------------------------------------------------
    // Test 2: Full pipeline produces output
    // -----------------------------------------------------------------------
    #[test]
    fn step_runs_production() {
        let s = setup();
        let mut c = colony(&s, 10, 100);
        let cycles = record(&mut c, EventKind::CycleCompleted);
        let def = ProductionDef::new("sawmill", s.plank, fixed(2.0), 1)
            .with_condition(ProductionCondition::storage(s.wood, 5));
        let id = c.place_unit(&def, CellPos::new(0, 0));

        for _ in 0..4 {
            c.step(fixed(1.0));
        }
        assert_eq!(c.ledger().quantity(s.plank), 2);
        assert_eq!(c.ledger().quantity(s.wood), 0);
        assert_eq!(cycles.borrow().len(), 2);
        assert_eq!(c.tick(), 4);
        assert_eq!(c.elapsed(), fixed(4.0));

        let snap = c.snapshot(id).unwrap();
        assert_eq!(snap.name, "sawmill");
        assert_eq!(snap.conditions[0].required, 5);
    }

    // -----------------------------------------------------------------------
    // Test 3: Bankruptcy halts everything
    // -----------------------------------------------------------------------
    #[test]
    fn bankruptcy_halts_steps() {
        let s = setup();
        let mut c = colony(&s, 10, 100);
        let signals = record(&mut c, EventKind::Bankruptcy);
        let def = ProductionDef::new("sawmill", s.plank, fixed(1.0), 1)
            .with_condition(ProductionCondition::storage(s.wood, 5));
        c.place_unit(&def, CellPos::new(0, 0));

        c.declare_bankruptcy();
        assert_eq!(signals.borrow().len(), 1);
        assert!(!c.step(fixed(1.0)));
        assert_eq!(c.ledger().quantity(s.wood), 10);
        assert_eq!(c.tick(), 0);

        c.declare_bankruptcy();
        assert_eq!(signals.borrow().len(), 1);
        assert!(c.summary().halted);
    }

    // -----------------------------------------------------------------------
    // Test 4: Terrain removal evicts the owner
    // -----------------------------------------------------------------------
    #[test]
    fn terrain_removal_evicts_owner() {
        let mut s = setup();
        let mut c = colony(&s, 0, 100);
        let evictions = record(&mut c, EventKind::CellEvicted);
        let def = ProductionDef::new("lumberjack", s.wood, fixed(10.0), 1)
            .with_condition(ProductionCondition::tiles(s.forest, 4, 2));
        let id = c.place_unit(&def, CellPos::new(0, 0));
        c.step(fixed(1.0));
        assert_eq!(c.unit(id).map(|u| u.efficiency()), Some(Fixed64::ONE));

        let cell = CellPos::new(1, 1);
        s.terrain.clear_resource(cell);
        c.on_terrain_cell_changed(&s.terrain, cell);
        c.step(fixed(1.0));
        assert_eq!(c.unit(id).map(|u| u.efficiency()), Some(fixed(0.75)));
        assert_eq!(*evictions.borrow(), vec![Event::CellEvicted { cell, unit: id }]);
    }

    // -----------------------------------------------------------------------
    // Test 5: Remove returns holdings
    // -----------------------------------------------------------------------
    #[test]
    fn remove_unit_frees_workers() {
        let s = setup();
        let mut c = colony(&s, 0, 100);
        let def = ProductionDef::new("hut", s.wood, fixed(10.0), 1).with_workers(3);
        let id = c.place_unit(&def, CellPos::new(0, 0));
        c.step(fixed(0.1));
        assert_eq!(c.workforce().unemployed(), 2);
        assert!(c.remove_unit(id));
        assert_eq!(c.workforce().unemployed(), 5);
        assert!(!c.remove_unit(id));
        assert!(c.snapshot(id).is_none());
    }
}
