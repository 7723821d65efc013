//! Serde data file structs for colony content definitions.
//!
//! These structs define the on-disk format for resources, buildings, colony
//! tuning and the starting map. They are deserialized from RON, JSON, or
//! TOML data files and then resolved into core types by the loader.

use serde::Deserialize;

// ===========================================================================
// Resources
// ===========================================================================

/// A resource kind in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceData {
    pub name: String,
    /// Storage volume per unit.
    #[serde(default = "default_volume")]
    pub volume: f64,
}

fn default_volume() -> f64 {
    1.0
}

// ===========================================================================
// Buildings
// ===========================================================================

/// A production building template in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildingData {
    pub name: String,
    pub output: String,
    /// Seconds per cycle at full efficiency.
    pub cycle_time: f64,
    #[serde(default = "default_output_amount")]
    pub output_amount: u32,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub workers: u32,
    #[serde(default)]
    pub service_cost: i64,
    #[serde(default = "default_service_interval")]
    pub service_interval: f64,
    #[serde(default)]
    pub conditions: Vec<ConditionData>,
}

fn default_output_amount() -> u32 {
    1
}

fn default_service_interval() -> f64 {
    10.0
}

/// One input requirement of a building.
#[derive(Debug, Clone, Deserialize)]
pub struct ConditionData {
    pub resource: String,
    pub amount: u32,
    #[serde(default)]
    pub source: ConditionSource,
    /// Search radius for tile conditions.
    #[serde(default)]
    pub radius: u32,
}

/// Where a condition is satisfied from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionSource {
    #[default]
    Storage,
    Tiles,
}

// ===========================================================================
// Colony
// ===========================================================================

/// Colony tuning. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColonyData {
    #[serde(default)]
    pub base_capacity: Option<f64>,
    #[serde(default)]
    pub start_resources: Vec<(String, u32)>,
    #[serde(default)]
    pub workforce: WorkforceData,
}

/// Worker pool overrides; unset fields keep their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkforceData {
    pub base_limit: Option<u32>,
    pub replenishment_interval: Option<f64>,
    pub satisfaction_start_delay: Option<f64>,
    pub min_satisfaction: Option<f64>,
    pub max_satisfaction: Option<f64>,
    pub initial_satisfaction: Option<f64>,
    /// Recruits per wave, lowest tier first (five entries).
    pub tier_yields: Option<[u32; 5]>,
    /// Drift per second for none / low / medium / high unemployment.
    pub unemployment_effects: Option<[f64; 4]>,
    pub homelessness_factor: Option<f64>,
}

// ===========================================================================
// Map
// ===========================================================================

/// Starting terrain and pre-placed buildings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MapData {
    #[serde(default)]
    pub tiles: Vec<TileData>,
    #[serde(default)]
    pub placements: Vec<PlacementData>,
}

/// A rectangle of resource cells, `width` x `height` from `(x, y)`.
#[derive(Debug, Clone, Deserialize)]
pub struct TileData {
    pub resource: String,
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_extent")]
    pub width: u32,
    #[serde(default = "default_extent")]
    pub height: u32,
}

fn default_extent() -> u32 {
    1
}

/// A building placed at load time.
#[derive(Debug, Clone, Deserialize)]
pub struct PlacementData {
    pub building: String,
    pub x: i32,
    pub y: i32,
}

// ===========================================================================
// TOML wrappers (TOML does not support top-level arrays)
// ===========================================================================

/// Wrapper for a list of resources in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlResources {
    pub resources: Vec<ResourceData>,
}

/// Wrapper for a list of buildings in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlBuildings {
    pub buildings: Vec<BuildingData>,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resources_from_ron() {
        let ron = r#"[(name: "wood"), (name: "stone", volume: 2.5)]"#;
        let resources: Vec<ResourceData> = ron::from_str(ron).unwrap();
        assert_eq!(resources.len(), 2);
        assert!((resources[0].volume - 1.0).abs() < f64::EPSILON);
        assert!((resources[1].volume - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn building_from_ron_with_defaults() {
        let ron = r#"(
            name: "sawmill",
            output: "plank",
            cycle_time: 5.0,
            conditions: [
                (resource: "wood", amount: 10),
                (resource: "forest", amount: 4, source: tiles, radius: 2),
            ],
        )"#;
        let b: BuildingData = ron::from_str(ron).unwrap();
        assert_eq!(b.output_amount, 1);
        assert_eq!(b.workers, 0);
        assert_eq!(b.priority, None);
        assert!((b.service_interval - 10.0).abs() < f64::EPSILON);
        assert_eq!(b.conditions[0].source, ConditionSource::Storage);
        assert_eq!(b.conditions[1].source, ConditionSource::Tiles);
        assert_eq!(b.conditions[1].radius, 2);
    }

    #[test]
    fn building_from_json() {
        let json = r#"{
            "name": "workshop",
            "output": "tool",
            "cycle_time": 4.0,
            "workers": 2,
            "priority": 1,
            "service_cost": 3,
            "conditions": [{"resource": "plank", "amount": 2, "source": "storage"}]
        }"#;
        let b: BuildingData = serde_json::from_str(json).unwrap();
        assert_eq!(b.workers, 2);
        assert_eq!(b.priority, Some(1));
        assert_eq!(b.service_cost, 3);
    }

    #[test]
    fn buildings_from_toml() {
        let toml_str = r#"
            [[buildings]]
            name = "lumberjack"
            output = "wood"
            cycle_time = 2.0

            [[buildings.conditions]]
            resource = "forest"
            amount = 3
            source = "tiles"
            radius = 2
        "#;
        let wrapper: TomlBuildings = toml::from_str(toml_str).unwrap();
        assert_eq!(wrapper.buildings.len(), 1);
        assert_eq!(wrapper.buildings[0].conditions[0].radius, 2);
    }

    #[test]
    fn colony_from_toml() {
        let toml_str = r#"
            base_capacity = 250.0
            start_resources = [["wood", 40], ["stone", 10]]

            [workforce]
            base_limit = 8
            tier_yields = [1, 1, 2, 3, 5]
        "#;
        let colony: ColonyData = toml::from_str(toml_str).unwrap();
        assert_eq!(colony.base_capacity, Some(250.0));
        assert_eq!(colony.start_resources[1], ("stone".to_string(), 10));
        assert_eq!(colony.workforce.base_limit, Some(8));
        assert_eq!(colony.workforce.tier_yields, Some([1, 1, 2, 3, 5]));
        assert!(colony.workforce.homelessness_factor.is_none());
    }

    #[test]
    fn map_from_ron() {
        let ron = r#"(
            tiles: [(resource: "forest", x: 2, y: 2, width: 3, height: 3)],
            placements: [(building: "lumberjack", x: 3, y: 0)],
        )"#;
        let map: MapData = ron::from_str(ron).unwrap();
        assert_eq!(map.tiles[0].width, 3);
        assert_eq!(map.placements[0].building, "lumberjack");
    }

    #[test]
    fn empty_colony_object() {
        let colony: ColonyData = serde_json::from_str("{}").unwrap();
        assert!(colony.base_capacity.is_none());
        assert!(colony.start_resources.is_empty());
    }
}
