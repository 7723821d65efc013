//! Turns a colony content directory into core types.
//!
//! A directory holds one file per kind of content (`resources`,
//! `buildings`, optional `colony` and `map`), each in RON, TOML or JSON.
//! [`load_game_data`] reads them in dependency order and resolves every
//! name reference against what was defined before it.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tileworks_core::catalog::{CatalogBuilder, CatalogError, ResourceCatalog};
use tileworks_core::config::{ColonyConfig, WorkforceConfig};
use tileworks_core::fixed::Fixed64;
use tileworks_core::id::ResourceType;
use tileworks_core::spatial::{CellPos, GridTerrain};
use tileworks_core::unit::{ProductionCondition, ProductionDef};

use crate::schema::{
    BuildingData, ColonyData, ConditionSource, MapData, ResourceData, WorkforceData,
};

// ===========================================================================
// Errors
// ===========================================================================

/// Why a colony content directory could not be turned into [`GameData`].
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// `resources` or `buildings` has no file in the content directory.
    #[error("no {kind} file (.ron, .toml or .json) in {dir}")]
    MissingContent { kind: &'static str, dir: PathBuf },

    #[error("{file}: expected a .ron, .toml or .json extension")]
    UnknownExtension { file: PathBuf },

    /// The same content is defined in two formats, e.g. `map.ron` and
    /// `map.json`.
    #[error("{first} and {second} both define the same content, keep one")]
    AmbiguousContent { first: PathBuf, second: PathBuf },

    #[error("{file}: malformed content: {detail}")]
    Malformed { file: PathBuf, detail: String },

    /// A building, start stock or map entry names something never defined.
    #[error("{file}: no {kind} named '{name}'")]
    UnknownName {
        file: PathBuf,
        name: String,
        kind: &'static str,
    },

    #[error("{file}: '{name}' is defined twice")]
    DuplicateName { file: PathBuf, name: String },

    /// A number does not fit the simulation's fixed-point range.
    #[error("{file}: {field} = {value} is outside the simulation range")]
    OutOfRange {
        file: PathBuf,
        field: &'static str,
        value: f64,
    },

    /// A lower bound sits above its upper bound.
    #[error("{file}: {low} ({min}) is above {high} ({max})")]
    InvertedBounds {
        file: PathBuf,
        low: &'static str,
        high: &'static str,
        min: f64,
        max: f64,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Content files
// ===========================================================================

/// Serialization formats accepted for colony content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Ron,
    Toml,
    Json,
}

impl DataFormat {
    const ALL: [(DataFormat, &'static str); 3] = [
        (DataFormat::Ron, "ron"),
        (DataFormat::Toml, "toml"),
        (DataFormat::Json, "json"),
    ];

    /// Format of a content file, from its extension.
    pub fn of(path: &Path) -> Result<Self, DataLoadError> {
        let ext = path.extension().and_then(|e| e.to_str());
        Self::ALL
            .iter()
            .find(|(_, name)| Some(*name) == ext)
            .map(|(format, _)| *format)
            .ok_or_else(|| DataLoadError::UnknownExtension {
                file: path.to_path_buf(),
            })
    }
}

/// Find the file holding one kind of content (`resources`, `colony`, ...)
/// in `dir`. At most one of `kind.ron`, `kind.toml` and `kind.json` may
/// exist.
pub fn locate_content(dir: &Path, kind: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut present = DataFormat::ALL
        .iter()
        .map(|(_, ext)| dir.join(format!("{kind}.{ext}")))
        .filter(|path| path.exists());
    let first = present.next();
    match (first, present.next()) {
        (Some(first), Some(second)) => Err(DataLoadError::AmbiguousContent { first, second }),
        (first, _) => Ok(first),
    }
}

/// [`locate_content`] for content the colony cannot start without.
pub fn require_content(dir: &Path, kind: &'static str) -> Result<PathBuf, DataLoadError> {
    locate_content(dir, kind)?.ok_or_else(|| DataLoadError::MissingContent {
        kind,
        dir: dir.to_path_buf(),
    })
}

fn malformed(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Malformed {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Parse a whole content file, e.g. `colony.toml` or `map.ron`.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = DataFormat::of(path)?;
    let text = std::fs::read_to_string(path)?;
    match format {
        DataFormat::Ron => ron::from_str(&text).map_err(|e| malformed(path, e)),
        DataFormat::Json => serde_json::from_str(&text).map_err(|e| malformed(path, e)),
        DataFormat::Toml => toml::from_str(&text).map_err(|e| malformed(path, e)),
    }
}

/// Parse a content file that lists definitions. RON and JSON hold a bare
/// list; TOML holds an array of tables under `table`, as in
/// `[[resources]]`.
pub fn read_entries<T: DeserializeOwned>(
    path: &Path,
    table: &str,
) -> Result<Vec<T>, DataLoadError> {
    if DataFormat::of(path)? != DataFormat::Toml {
        return read_document(path);
    }
    let mut root: toml::Table = read_document(path)?;
    let entries = root
        .remove(table)
        .ok_or_else(|| malformed(path, format!("no [[{table}]] entries")))?;
    entries
        .try_into()
        .map_err(|e: toml::de::Error| malformed(path, e))
}

// ===========================================================================
// Names
// ===========================================================================

/// Definition registered under `name`, or `UnknownName` for a dangling
/// reference.
pub fn lookup<'a, V>(
    defined: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    defined.get(name).ok_or_else(|| DataLoadError::UnknownName {
        file: file.to_path_buf(),
        name: name.to_string(),
        kind,
    })
}

pub fn ensure_unique<V>(
    defined: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if !defined.contains_key(name) {
        return Ok(());
    }
    Err(DataLoadError::DuplicateName {
        file: file.to_path_buf(),
        name: name.to_string(),
    })
}

fn to_fixed(value: f64, field: &'static str, file: &Path) -> Result<Fixed64, DataLoadError> {
    Fixed64::checked_from_num(value).ok_or_else(|| DataLoadError::OutOfRange {
        file: file.to_path_buf(),
        field,
        value,
    })
}

// ===========================================================================
// Resolved output
// ===========================================================================

/// A building to place when the colony starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub building: String,
    pub position: CellPos,
}

/// Everything needed to start a colony session.
#[derive(Debug)]
pub struct GameData {
    pub catalog: ResourceCatalog,
    /// Building templates by name.
    pub buildings: HashMap<String, ProductionDef>,
    pub config: ColonyConfig,
    pub terrain: GridTerrain,
    /// Map placements in file order.
    pub placements: Vec<Placement>,
}

impl GameData {
    /// Template for a placement. Placements are resolved at load time, so
    /// this is only `None` for a `Placement` built by hand.
    pub fn building(&self, name: &str) -> Option<&ProductionDef> {
        self.buildings.get(name)
    }
}

// ===========================================================================
// Loading pipeline
// ===========================================================================

/// Load every data file in `dir` and resolve it into core types.
///
/// `resources` and `buildings` are required; `colony` and `map` fall back to
/// defaults and an empty map.
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    let resources_path = require_content(dir, "resources")?;
    let resources: Vec<ResourceData> = read_entries(&resources_path, "resources")?;
    let (catalog, resource_ids) = build_catalog(&resources, &resources_path)?;

    let buildings_path = require_content(dir, "buildings")?;
    let building_data: Vec<BuildingData> = read_entries(&buildings_path, "buildings")?;
    let mut buildings = HashMap::with_capacity(building_data.len());
    for data in &building_data {
        ensure_unique(&buildings, &data.name, &buildings_path)?;
        let def = resolve_building(data, &resource_ids, &buildings_path)?;
        for problem in def.validate() {
            tracing::warn!(building = %data.name, %problem, "building definition problem");
        }
        buildings.insert(data.name.clone(), def);
    }

    let config = match locate_content(dir, "colony")? {
        Some(path) => {
            let data: ColonyData = read_document(&path)?;
            resolve_colony(&data, &resource_ids, &path)?
        }
        None => ColonyConfig::default(),
    };

    let (terrain, placements) = match locate_content(dir, "map")? {
        Some(path) => {
            let data: MapData = read_document(&path)?;
            resolve_map(&data, &resource_ids, &buildings, &path)?
        }
        None => (GridTerrain::new(), Vec::new()),
    };

    tracing::info!(
        resources = catalog.len(),
        buildings = buildings.len(),
        placements = placements.len(),
        dir = %dir.display(),
        "loaded game data"
    );

    Ok(GameData {
        catalog,
        buildings,
        config,
        terrain,
        placements,
    })
}

fn build_catalog(
    resources: &[ResourceData],
    file: &Path,
) -> Result<(ResourceCatalog, HashMap<String, ResourceType>), DataLoadError> {
    let mut builder = CatalogBuilder::new();
    let mut ids = HashMap::with_capacity(resources.len());
    for data in resources {
        ensure_unique(&ids, &data.name, file)?;
        let volume = to_fixed(data.volume, "volume", file)?;
        let id = builder.register(&data.name, volume)?;
        ids.insert(data.name.clone(), id);
    }
    Ok((builder.build(), ids))
}

fn resolve_building(
    data: &BuildingData,
    resources: &HashMap<String, ResourceType>,
    file: &Path,
) -> Result<ProductionDef, DataLoadError> {
    let output = *lookup(resources, &data.output, file, "resource")?;
    let cycle_time = to_fixed(data.cycle_time, "cycle_time", file)?;
    let interval = to_fixed(data.service_interval, "service_interval", file)?;

    let mut def = ProductionDef::new(&data.name, output, cycle_time, data.output_amount)
        .with_workers(data.workers)
        .with_service(data.service_cost, interval);
    def.priority = data.priority;

    for cond in &data.conditions {
        let resource = *lookup(resources, &cond.resource, file, "resource")?;
        def = def.with_condition(match cond.source {
            ConditionSource::Storage => ProductionCondition::storage(resource, cond.amount),
            ConditionSource::Tiles => {
                ProductionCondition::tiles(resource, cond.amount, cond.radius)
            }
        });
    }
    Ok(def)
}

fn resolve_colony(
    data: &ColonyData,
    resources: &HashMap<String, ResourceType>,
    file: &Path,
) -> Result<ColonyConfig, DataLoadError> {
    let mut config = ColonyConfig::default();
    if let Some(capacity) = data.base_capacity {
        config.base_capacity = to_fixed(capacity, "base_capacity", file)?;
    }
    for (name, amount) in &data.start_resources {
        let resource = *lookup(resources, name, file, "resource")?;
        config.start_resources.push((resource, *amount));
    }
    config.workforce = resolve_workforce(&data.workforce, file)?;
    Ok(config)
}

fn resolve_workforce(data: &WorkforceData, file: &Path) -> Result<WorkforceConfig, DataLoadError> {
    let mut wf = WorkforceConfig::default();
    if let Some(limit) = data.base_limit {
        wf.base_limit = limit;
    }

    let fields = [
        (data.replenishment_interval, "replenishment_interval", &mut wf.replenishment_interval),
        (data.satisfaction_start_delay, "satisfaction_start_delay", &mut wf.satisfaction_start_delay),
        (data.min_satisfaction, "min_satisfaction", &mut wf.min_satisfaction),
        (data.max_satisfaction, "max_satisfaction", &mut wf.max_satisfaction),
        (data.initial_satisfaction, "initial_satisfaction", &mut wf.initial_satisfaction),
        (data.homelessness_factor, "homelessness_factor", &mut wf.homelessness_factor),
    ];
    for (value, field, slot) in fields {
        if let Some(v) = value {
            *slot = to_fixed(v, field, file)?;
        }
    }
    if wf.min_satisfaction > wf.max_satisfaction {
        return Err(DataLoadError::InvertedBounds {
            file: file.to_path_buf(),
            low: "min_satisfaction",
            high: "max_satisfaction",
            min: wf.min_satisfaction.to_num(),
            max: wf.max_satisfaction.to_num(),
        });
    }

    if let Some([lowest, low, medium, high, highest]) = data.tier_yields {
        wf.yield_lowest = lowest;
        wf.yield_low = low;
        wf.yield_medium = medium;
        wf.yield_high = high;
        wf.yield_highest = highest;
    }
    if let Some([none, low, medium, high]) = data.unemployment_effects {
        wf.no_unemployment_effect = to_fixed(none, "unemployment_effects", file)?;
        wf.low_unemployment_effect = to_fixed(low, "unemployment_effects", file)?;
        wf.medium_unemployment_effect = to_fixed(medium, "unemployment_effects", file)?;
        wf.high_unemployment_effect = to_fixed(high, "unemployment_effects", file)?;
    }
    Ok(wf)
}

fn resolve_map(
    data: &MapData,
    resources: &HashMap<String, ResourceType>,
    buildings: &HashMap<String, ProductionDef>,
    file: &Path,
) -> Result<(GridTerrain, Vec<Placement>), DataLoadError> {
    let mut terrain = GridTerrain::new();
    for tile in &data.tiles {
        let resource = *lookup(resources, &tile.resource, file, "resource")?;
        if tile.width == 0 || tile.height == 0 {
            tracing::warn!(resource = %tile.resource, x = tile.x, y = tile.y, "empty tile rectangle skipped");
            continue;
        }
        let min = CellPos::new(tile.x, tile.y);
        let extent = |n: u32| i32::try_from(n - 1).unwrap_or(i32::MAX);
        let max = CellPos::new(
            tile.x.saturating_add(extent(tile.width)),
            tile.y.saturating_add(extent(tile.height)),
        );
        terrain.fill(min, max, resource);
    }

    let mut placements = Vec::with_capacity(data.placements.len());
    for p in &data.placements {
        lookup(buildings, &p.building, file, "building")?;
        placements.push(Placement {
            building: p.building.clone(),
            position: CellPos::new(p.x, p.y),
        });
    }
    Ok((terrain, placements))
}

// ===========================================================================
// Tests
// ===========================================================================
