//! Spatial index of resource-bearing map cells and the units occupying them.
//!
//! Maintains two maps:
//! - `resources`: cell -> resource type, a cache of the terrain layer
//! - `occupancy`: cell -> owning unit
//!
//! The unit side of the relation (unit -> cells) lives in each
//! [`ProductionUnit`](crate::unit::ProductionUnit); only ids cross between
//! the two.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::id::{ResourceType, UnitId};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A cell on the 2D map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    pub x: i32,
    pub y: i32,
}

impl CellPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev (chessboard) distance to another cell.
    pub fn chebyshev_distance(&self, other: &CellPos) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Shifted cell, clamped at the edge of the coordinate range.
    pub fn offset(&self, dx: i32, dy: i32) -> CellPos {
        CellPos::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

// ---------------------------------------------------------------------------
// Terrain contract
// ---------------------------------------------------------------------------

/// The tile layer the allocator caches from.
pub trait Terrain {
    /// Resource carried by a cell, if any.
    fn resource_at(&self, cell: CellPos) -> Option<ResourceType>;

    fn is_buildable(&self, cell: CellPos) -> bool;

    /// Inclusive bounding box of all cells with content, if any.
    fn bounds(&self) -> Option<(CellPos, CellPos)>;
}

/// What a single terrain cell holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileInfo {
    pub resource: ResourceType,
    pub buildable: bool,
}

/// In-memory terrain layer. Cells that were never set are empty and
/// buildable.
#[derive(Debug, Clone, Default)]
pub struct GridTerrain {
    tiles: BTreeMap<CellPos, TileInfo>,
}

impl GridTerrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a resource on a cell (or clear it with [`ResourceType::NONE`]).
    pub fn set_resource(&mut self, cell: CellPos, resource: ResourceType) {
        self.tiles
            .entry(cell)
            .or_insert(TileInfo {
                resource: ResourceType::NONE,
                buildable: true,
            })
            .resource = resource;
    }

    pub fn clear_resource(&mut self, cell: CellPos) {
        self.set_resource(cell, ResourceType::NONE);
    }

    pub fn set_buildable(&mut self, cell: CellPos, buildable: bool) {
        self.tiles
            .entry(cell)
            .or_insert(TileInfo {
                resource: ResourceType::NONE,
                buildable: true,
            })
            .buildable = buildable;
    }

    /// Fill an inclusive rectangle with a resource.
    pub fn fill(&mut self, min: CellPos, max: CellPos, resource: ResourceType) {
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                self.set_resource(CellPos::new(x, y), resource);
            }
        }
    }
}

impl Terrain for GridTerrain {
    fn resource_at(&self, cell: CellPos) -> Option<ResourceType> {
        self.tiles
            .get(&cell)
            .map(|t| t.resource)
            .filter(|r| !r.is_none())
    }

    fn is_buildable(&self, cell: CellPos) -> bool {
        self.tiles.get(&cell).is_none_or(|t| t.buildable)
    }

    fn bounds(&self) -> Option<(CellPos, CellPos)> {
        let mut cells = self.tiles.keys();
        let first = *cells.next()?;
        Some(cells.fold((first, first), |(min, max), c| {
            (
                CellPos::new(min.x.min(c.x), min.y.min(c.y)),
                CellPos::new(max.x.max(c.x), max.y.max(c.y)),
            )
        }))
    }
}

// ---------------------------------------------------------------------------
// SpatialAllocator
// ---------------------------------------------------------------------------

/// Resource cell cache plus cell occupancy.
#[derive(Debug, Clone, Default)]
pub struct SpatialAllocator {
    resources: BTreeMap<CellPos, ResourceType>,
    occupancy: BTreeMap<CellPos, UnitId>,
}

impl SpatialAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an allocator with its cache filled from `terrain`.
    pub fn from_terrain(terrain: &dyn Terrain) -> Self {
        let mut allocator = Self::new();
        allocator.rebuild_cache(terrain);
        allocator
    }

    /// Re-scan the whole terrain. Occupancy is left alone.
    pub fn rebuild_cache(&mut self, terrain: &dyn Terrain) {
        self.resources.clear();
        let Some((min, max)) = terrain.bounds() else {
            return;
        };
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                let cell = CellPos::new(x, y);
                if let Some(resource) = terrain.resource_at(cell) {
                    self.resources.insert(cell, resource);
                }
            }
        }
    }

    // -- Queries --

    /// Cells carrying `resource` inside the square of half-width `radius`
    /// around `center`, scanned column by column (x outer, y inner).
    ///
    /// Walks the cached cells rather than the square, so a huge radius
    /// costs no more than the map.
    pub fn query_cells_in_radius(
        &self,
        center: CellPos,
        resource: ResourceType,
        radius: u32,
    ) -> Vec<CellPos> {
        let span = |c: i32| {
            let c = i64::from(c);
            let r = i64::from(radius);
            (saturate_i32(c - r), saturate_i32(c + r))
        };
        let (min_x, max_x) = span(center.x);
        let (min_y, max_y) = span(center.y);
        // CellPos orders by x then y, matching the scan order
        self.resources
            .range(CellPos::new(min_x, i32::MIN)..=CellPos::new(max_x, i32::MAX))
            .filter(|(cell, kind)| **kind == resource && (min_y..=max_y).contains(&cell.y))
            .map(|(&cell, _)| cell)
            .collect()
    }

    pub fn resource_at(&self, cell: CellPos) -> Option<ResourceType> {
        self.resources.get(&cell).copied()
    }

    pub fn is_occupied(&self, cell: CellPos) -> bool {
        self.occupancy.contains_key(&cell)
    }

    pub fn occupant(&self, cell: CellPos) -> Option<UnitId> {
        self.occupancy.get(&cell).copied()
    }

    pub fn cells_owned_by(&self, unit: UnitId) -> Vec<CellPos> {
        self.occupancy
            .iter()
            .filter(|(_, owner)| **owner == unit)
            .map(|(&cell, _)| cell)
            .collect()
    }

    pub fn resource_cell_count(&self) -> usize {
        self.resources.len()
    }

    pub fn occupied_count(&self) -> usize {
        self.occupancy.len()
    }

    // -- Occupancy --

    /// Claim a cell for `unit`, overwriting any previous owner. Callers check
    /// [`is_occupied`](Self::is_occupied) first.
    pub fn occupy(&mut self, cell: CellPos, unit: UnitId) {
        self.occupancy.insert(cell, unit);
    }

    pub fn occupy_many(&mut self, cells: &[CellPos], unit: UnitId) {
        for &cell in cells {
            self.occupancy.insert(cell, unit);
        }
    }

    pub fn release(&mut self, cell: CellPos) {
        self.occupancy.remove(&cell);
    }

    /// Drop every claim held by `unit`. Returns the released cells.
    pub fn release_all(&mut self, unit: UnitId) -> Vec<CellPos> {
        let released = self.cells_owned_by(unit);
        for cell in &released {
            self.occupancy.remove(cell);
        }
        released
    }

    // -- Terrain edits --

    /// Re-derive the cache entry for `cell` after a terrain edit.
    ///
    /// When the cell no longer carries a resource and was occupied, the claim
    /// is dropped and the former owner returned; the caller must forward the
    /// removal to that unit.
    pub fn notify_terrain_cell_changed(
        &mut self,
        terrain: &dyn Terrain,
        cell: CellPos,
    ) -> Option<UnitId> {
        if let Some(resource) = terrain.resource_at(cell) {
            self.resources.insert(cell, resource);
            return None;
        }
        self.resources.remove(&cell);
        let owner = self.occupancy.remove(&cell)?;
        tracing::debug!(x = cell.x, y = cell.y, "resource cell removed under an occupant");
        Some(owner)
    }
}

fn saturate_i32(v: i64) -> i32 {
    i32::try_from(v).unwrap_or(if v < 0 { i32::MIN } else { i32::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn forest() -> ResourceType {
        ResourceType(1)
    }
    fn ore() -> ResourceType {
        ResourceType(2)
    }

    fn two_units() -> (UnitId, UnitId) {
        let mut sm = SlotMap::<UnitId, ()>::with_key();
        (sm.insert(()), sm.insert(()))
    }

    fn sample_terrain() -> GridTerrain {
        let mut t = GridTerrain::new();
        t.fill(CellPos::new(0, 0), CellPos::new(2, 2), forest());
        t.set_resource(CellPos::new(5, 5), ore());
        t
    }

    #[test]
    fn chebyshev_distance() {
        let a = CellPos::new(0, 0);
        assert_eq!(a.chebyshev_distance(&CellPos::new(2, -1)), 2);
        assert_eq!(a.chebyshev_distance(&CellPos::new(-3, 3)), 3);

        let far = CellPos::new(i32::MIN, i32::MAX);
        assert_eq!(far.chebyshev_distance(&CellPos::new(i32::MAX, 0)), u32::MAX);
        assert_eq!(far.offset(-1, 1), far);
    }

    #[test]
    fn grid_terrain_bounds_and_lookup() {
        let t = sample_terrain();
        assert_eq!(t.bounds(), Some((CellPos::new(0, 0), CellPos::new(5, 5))));
        assert_eq!(t.resource_at(CellPos::new(1, 1)), Some(forest()));
        assert_eq!(t.resource_at(CellPos::new(4, 4)), None);
        assert!(t.is_buildable(CellPos::new(9, 9)));
    }

    #[test]
    fn cleared_resource_reads_as_empty() {
        let mut t = sample_terrain();
        t.clear_resource(CellPos::new(5, 5));
        assert_eq!(t.resource_at(CellPos::new(5, 5)), None);
    }

    #[test]
    fn cache_built_from_terrain() {
        let alloc = SpatialAllocator::from_terrain(&sample_terrain());
        assert_eq!(alloc.resource_cell_count(), 10);
        assert_eq!(alloc.resource_at(CellPos::new(5, 5)), Some(ore()));
    }

    #[test]
    fn radius_query_is_square_and_ordered() {
        let alloc = SpatialAllocator::from_terrain(&sample_terrain());
        // Radius 1 around (0,0) covers (-1..=1, -1..=1): forest at (0,0),(0,1),(1,0),(1,1).
        let cells = alloc.query_cells_in_radius(CellPos::new(0, 0), forest(), 1);
        assert_eq!(
            cells,
            vec![
                CellPos::new(0, 0),
                CellPos::new(0, 1),
                CellPos::new(1, 0),
                CellPos::new(1, 1),
            ]
        );
        // Diagonal corner is inside a square radius.
        let corner = alloc.query_cells_in_radius(CellPos::new(3, 3), forest(), 1);
        assert_eq!(corner, vec![CellPos::new(2, 2)]);
    }

    #[test]
    fn radius_query_filters_by_type() {
        let alloc = SpatialAllocator::from_terrain(&sample_terrain());
        let cells = alloc.query_cells_in_radius(CellPos::new(4, 4), ore(), 1);
        assert_eq!(cells, vec![CellPos::new(5, 5)]);
        assert!(alloc.query_cells_in_radius(CellPos::new(4, 4), ore(), 0).is_empty());
    }

    #[test]
    fn radius_query_past_i32_range() {
        let mut terrain = sample_terrain();
        let mut alloc = SpatialAllocator::from_terrain(&terrain);
        // added by edit so the cache scan stays small
        let corner = CellPos::new(i32::MAX, i32::MIN);
        terrain.set_resource(corner, ore());
        alloc.notify_terrain_cell_changed(&terrain, corner);

        let all = alloc.query_cells_in_radius(CellPos::new(1, 1), forest(), u32::MAX);
        assert_eq!(all.len(), 9);
        assert_eq!(all.first(), Some(&CellPos::new(0, 0)));
        assert_eq!(all.last(), Some(&CellPos::new(2, 2)));

        let edge = alloc.query_cells_in_radius(CellPos::new(i32::MAX, 0), ore(), u32::MAX);
        assert_eq!(edge, vec![CellPos::new(5, 5), corner]);

        // radii past i32::MAX are not truncated
        let from = CellPos::new(i32::MAX, 0);
        assert_eq!(from.chebyshev_distance(&corner), 1 << 31);
        assert!(alloc.query_cells_in_radius(from, ore(), 1 << 31).contains(&corner));
        assert!(!alloc.query_cells_in_radius(from, ore(), (1 << 31) - 1).contains(&corner));
    }

    #[test]
    fn occupy_is_last_writer_wins() {
        let (a, b) = two_units();
        let mut alloc = SpatialAllocator::from_terrain(&sample_terrain());
        let cell = CellPos::new(1, 1);
        alloc.occupy(cell, a);
        alloc.occupy(cell, b);
        assert_eq!(alloc.occupant(cell), Some(b));
        alloc.release(cell);
        assert!(!alloc.is_occupied(cell));
    }

    #[test]
    fn release_all_only_touches_owner() {
        let (a, b) = two_units();
        let mut alloc = SpatialAllocator::from_terrain(&sample_terrain());
        alloc.occupy_many(&[CellPos::new(0, 0), CellPos::new(0, 1)], a);
        alloc.occupy(CellPos::new(2, 2), b);

        let released = alloc.release_all(a);
        assert_eq!(released, vec![CellPos::new(0, 0), CellPos::new(0, 1)]);
        assert_eq!(alloc.occupied_count(), 1);
        assert_eq!(alloc.occupant(CellPos::new(2, 2)), Some(b));
    }

    #[test]
    fn terrain_removal_evicts_occupant() {
        let (a, _) = two_units();
        let mut terrain = sample_terrain();
        let mut alloc = SpatialAllocator::from_terrain(&terrain);
        let cell = CellPos::new(1, 1);
        alloc.occupy(cell, a);

        terrain.clear_resource(cell);
        assert_eq!(alloc.notify_terrain_cell_changed(&terrain, cell), Some(a));
        assert!(!alloc.is_occupied(cell));
        assert_eq!(alloc.resource_at(cell), None);
    }

    #[test]
    fn terrain_change_on_free_cell_returns_none() {
        let mut terrain = sample_terrain();
        let mut alloc = SpatialAllocator::from_terrain(&terrain);
        let cell = CellPos::new(7, 7);
        terrain.set_resource(cell, ore());
        assert_eq!(alloc.notify_terrain_cell_changed(&terrain, cell), None);
        assert_eq!(alloc.resource_at(cell), Some(ore()));

        terrain.clear_resource(cell);
        assert_eq!(alloc.notify_terrain_cell_changed(&terrain, cell), None);
        assert_eq!(alloc.resource_at(cell), None);
    }

    #[test]
    fn resource_swap_keeps_occupant() {
        let (a, _) = two_units();
        let mut terrain = sample_terrain();
        let mut alloc = SpatialAllocator::from_terrain(&terrain);
        let cell = CellPos::new(0, 0);
        alloc.occupy(cell, a);
        terrain.set_resource(cell, ore());
        assert_eq!(alloc.notify_terrain_cell_changed(&terrain, cell), None);
        assert_eq!(alloc.occupant(cell), Some(a));
        assert_eq!(alloc.resource_at(cell), Some(ore()));
    }
}
