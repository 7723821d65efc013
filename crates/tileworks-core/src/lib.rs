//! Tileworks Core -- the simulation core of a tile-based factory builder.
//!
//! Production units compete for three shared resources: stock in a global
//! storage ledger, resource-bearing map cells, and a pool of workers. Each
//! unit derives an efficiency from its worst-satisfied input and advances
//! production cycles over simulated time.
//!
//! # Five-Phase Step Pipeline
//!
//! Each call to [`colony::Colony::step`] advances the colony by `dt` seconds:
//!
//! 1. **Production** -- Active units, in priority order, pull stock, claim
//!    cells, balance workers, recompute efficiency and advance progress.
//! 2. **Service** -- Every registered unit counts down its upkeep interval
//!    and pays the economy; unpaid upkeep puts it into maintenance.
//! 3. **Workforce** -- Recruitment waves and satisfaction drift.
//! 4. **Post-tick** -- Deliver buffered events to subscribers.
//! 5. **Bookkeeping** -- Increment tick counter and elapsed time.
//!
//! A declared bankruptcy halts the pipeline permanently.
//!
//! # Key Types
//!
//! - [`colony::Colony`] -- Session object and pipeline orchestrator.
//! - [`ledger::ResourceLedger`] -- Resource quantities under a shared
//!   volumetric capacity.
//! - [`spatial::SpatialAllocator`] -- Resource cell cache, radius queries and
//!   cell occupancy.
//! - [`workforce::WorkforceAllocator`] -- Worker pool, recruitment and
//!   satisfaction.
//! - [`unit::ProductionUnit`] -- Conditions, efficiency and the per-tick
//!   state machine.
//! - [`scheduler::ProductionScheduler`] -- Unit registry and priority order.
//! - [`catalog::ResourceCatalog`] -- Immutable resource definitions (frozen
//!   at startup).
//! - [`event::EventBus`] -- Subscription-based event bus with buffered delivery.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.

pub mod catalog;
pub mod colony;
pub mod config;
pub mod economy;
pub mod event;
pub mod fixed;
pub mod id;
pub mod ledger;
pub mod query;
pub mod scheduler;
pub mod spatial;
pub mod unit;
pub mod workforce;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
