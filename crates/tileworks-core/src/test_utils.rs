//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::catalog::{CatalogBuilder, ResourceCatalog};
use crate::colony::Colony;
use crate::config::{ColonyConfig, WorkforceConfig};
use crate::economy::Treasury;
use crate::fixed::Fixed64;
use crate::id::ResourceType;
use crate::spatial::{CellPos, GridTerrain};
use crate::unit::{ProductionCondition, ProductionDef};

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Resource constructors
// ===========================================================================
//
// Ids match the registration order of `test_catalog()`.

pub fn wood() -> ResourceType {
    ResourceType(1)
}
pub fn stone() -> ResourceType {
    ResourceType(2)
}
pub fn plank() -> ResourceType {
    ResourceType(3)
}
pub fn tool() -> ResourceType {
    ResourceType(4)
}
pub fn forest() -> ResourceType {
    ResourceType(5)
}
pub fn ore() -> ResourceType {
    ResourceType(6)
}

/// Stone takes 2 volume, the other stored goods 1. The terrain resources
/// (forest, ore) take none.
pub fn test_catalog() -> ResourceCatalog {
    let mut b = CatalogBuilder::new();
    for (name, volume) in [
        ("wood", 1.0),
        ("stone", 2.0),
        ("plank", 1.0),
        ("tool", 1.0),
        ("forest", 0.0),
        ("ore", 0.0),
    ] {
        b.register(name, fixed(volume)).unwrap();
    }
    b.build()
}

// ===========================================================================
// Terrain
// ===========================================================================

/// A 3x3 forest patch at (2..=4, 2..=4) and a single ore cell at (10, 10).
pub fn test_terrain() -> GridTerrain {
    let mut t = GridTerrain::new();
    t.fill(CellPos::new(2, 2), CellPos::new(4, 4), forest());
    t.set_resource(CellPos::new(10, 10), ore());
    t
}

// ===========================================================================
// Unit templates
// ===========================================================================

/// wood x10 -> plank x1 every 5 s.
pub fn sawmill() -> ProductionDef {
    ProductionDef::new("sawmill", plank(), fixed(5.0), 1)
        .with_condition(ProductionCondition::storage(wood(), 10))
}

/// Needs `tiles` forest cells within `radius`; wood x1 every 2 s.
pub fn lumberjack(tiles: u32, radius: u32) -> ProductionDef {
    ProductionDef::new("lumberjack", wood(), fixed(2.0), 1)
        .with_condition(ProductionCondition::tiles(forest(), tiles, radius))
}

/// plank x2 + stone x1 -> tool x1 every 4 s, 2 workers.
pub fn workshop() -> ProductionDef {
    ProductionDef::new("workshop", tool(), fixed(4.0), 1)
        .with_condition(ProductionCondition::storage(plank(), 2))
        .with_condition(ProductionCondition::storage(stone(), 1))
        .with_workers(2)
}

// ===========================================================================
// Colony
// ===========================================================================

/// A colony over `test_terrain()` with the given stock, funds and worker base.
pub fn test_colony(start: &[(ResourceType, u32)], funds: i64, workers: u32) -> Colony {
    let config = ColonyConfig {
        base_capacity: fixed(100.0),
        start_resources: start.to_vec(),
        workforce: WorkforceConfig {
            base_limit: workers,
            ..WorkforceConfig::default()
        },
        ..ColonyConfig::default()
    };
    Colony::new(
        &test_catalog(),
        config,
        &test_terrain(),
        Box::new(Treasury::new(funds)),
    )
}

/// Step `colony` `n` times by `dt` seconds.
pub fn run(colony: &mut Colony, n: usize, dt: f64) {
    let dt = fixed(dt);
    for _ in 0..n {
        colony.step(dt);
    }
}
