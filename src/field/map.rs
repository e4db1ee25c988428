//! The playing field: terrain, connectivity graph and spawn layout
//!
//! Read-only once a match is set up; shared between all tasks behind an `Arc`.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::core::types::Position;
use crate::field::graph::SpatialGraph;
use crate::field::grid::Grid;

/// Filter applied by `Field::get_all_in_range`
#[derive(Debug, Clone, Copy)]
pub enum RangeFilter<'a> {
    /// Every in-bounds cell in the distance band
    Any,
    /// Only cells that are in the graph and not in the occupied set
    Free(&'a AHashSet<Position>),
}

#[derive(Debug, Clone)]
pub struct Field {
    grid: Grid,
    graph: SpatialGraph,
    nuclei: Vec<Position>,
    resource_slots: Vec<Vec<Position>>,
    attempts: u32,
}

/// One-time description of the map sent to clients at match start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSnapshot {
    pub rows: i32,
    pub cols: i32,
    /// One string per row: `.` playable, `#` hill, `~` free but cut off
    pub cells: Vec<String>,
    pub nuclei: Vec<Position>,
    pub resource_slots: Vec<Vec<Position>>,
}

impl Field {
    pub fn new(
        grid: Grid,
        graph: SpatialGraph,
        nuclei: Vec<Position>,
        resource_slots: Vec<Vec<Position>>,
    ) -> Self {
        Self {
            grid,
            graph,
            nuclei,
            resource_slots,
            attempts: 1,
        }
    }

    pub fn with_resource_slots(mut self, resource_slots: Vec<Vec<Position>>) -> Self {
        self.resource_slots = resource_slots;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Generation attempts needed to produce this field
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn rows(&self) -> i32 {
        self.grid.rows()
    }

    pub fn cols(&self) -> i32 {
        self.grid.cols()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn graph(&self) -> &SpatialGraph {
        &self.graph
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        self.grid.in_bounds(pos)
    }

    /// True if the cell belongs to the playable component
    pub fn in_graph(&self, pos: Position) -> bool {
        self.graph.contains(pos)
    }

    /// Starting nucleus position of each player, by player index
    pub fn nuclei(&self) -> &[Position] {
        &self.nuclei
    }

    /// Resource source cells of a player, one per bindable resource
    pub fn resource_slots(&self, player: usize) -> &[Position] {
        self.resource_slots
            .get(player)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Cells whose Euclidean distance to `start` lies in `[min_dist, max_dist]`
    ///
    /// Scans the bounding square around `start`. Empty if `start` is outside
    /// the map.
    pub fn get_all_in_range(
        &self,
        start: Position,
        max_dist: f64,
        min_dist: f64,
        filter: RangeFilter<'_>,
    ) -> AHashSet<Position> {
        let mut cells = AHashSet::new();
        if !self.in_bounds(start) {
            return cells;
        }

        let reach = max_dist.ceil() as i32;
        for row in (start.row - reach)..=(start.row + reach) {
            for col in (start.col - reach)..=(start.col + reach) {
                let pos = Position::new(row, col);
                if !self.in_bounds(pos) {
                    continue;
                }
                let dist = start.distance(&pos);
                if dist < min_dist || dist > max_dist {
                    continue;
                }
                if let RangeFilter::Free(occupied) = filter {
                    if occupied.contains(&pos) || !self.graph.contains(pos) {
                        continue;
                    }
                }
                cells.insert(pos);
            }
        }
        cells
    }

    /// Same as `get_all_in_range`, sorted for reproducible choices
    pub fn sorted_in_range(
        &self,
        start: Position,
        max_dist: f64,
        min_dist: f64,
        filter: RangeFilter<'_>,
    ) -> Vec<Position> {
        let mut cells: Vec<Position> = self
            .get_all_in_range(start, max_dist, min_dist, filter)
            .into_iter()
            .collect();
        cells.sort();
        cells
    }

    /// Route through the given way-points; see `SpatialGraph::get_way`
    pub fn get_way(&self, start: Position, waypoints: &[Position]) -> Vec<Position> {
        self.graph.get_way(start, waypoints)
    }

    pub fn snapshot(&self) -> FieldSnapshot {
        let cells = (0..self.rows())
            .map(|row| {
                (0..self.cols())
                    .map(|col| {
                        let pos = Position::new(row, col);
                        if self.graph.contains(pos) {
                            '.'
                        } else if self.grid.is_passable(pos) {
                            '~'
                        } else {
                            '#'
                        }
                    })
                    .collect()
            })
            .collect();
        FieldSnapshot {
            rows: self.rows(),
            cols: self.cols(),
            cells,
            nuclei: self.nuclei.clone(),
            resource_slots: self.resource_slots.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::grid::Terrain;

    fn open_field(rows: i32, cols: i32) -> Field {
        let grid = Grid::new(rows, cols);
        let graph = SpatialGraph::build(&grid, &[]).unwrap();
        Field::new(grid, graph, Vec::new(), Vec::new())
    }

    #[test]
    fn test_range_band() {
        let field = open_field(11, 11);
        let center = Position::new(5, 5);
        let ring = field.get_all_in_range(center, 1.5, 1.0, RangeFilter::Any);
        assert_eq!(ring.len(), 8);
        assert!(!ring.contains(&center));

        let disk = field.get_all_in_range(center, 2.0, 0.0, RangeFilter::Any);
        // 3x3 block plus the 4 cells at distance exactly 2
        assert_eq!(disk.len(), 13);
    }

    #[test]
    fn test_range_clipped_at_border() {
        let field = open_field(5, 5);
        let cells = field.get_all_in_range(Position::new(0, 0), 1.5, 0.0, RangeFilter::Any);
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn test_range_outside_map_is_empty() {
        let field = open_field(5, 5);
        assert!(field
            .get_all_in_range(Position::new(-1, 2), 3.0, 0.0, RangeFilter::Any)
            .is_empty());
    }

    #[test]
    fn test_free_filter_excludes_occupied_and_hills() {
        let mut grid = Grid::new(7, 7);
        grid.set_terrain(Position::new(3, 4), Terrain::Hill);
        let graph = SpatialGraph::build(&grid, &[]).unwrap();
        let field = Field::new(grid, graph, Vec::new(), Vec::new());

        let mut occupied = AHashSet::new();
        occupied.insert(Position::new(2, 3));
        let cells =
            field.get_all_in_range(Position::new(3, 3), 1.5, 0.0, RangeFilter::Free(&occupied));
        assert!(!cells.contains(&Position::new(3, 4)));
        assert!(!cells.contains(&Position::new(2, 3)));
        assert_eq!(cells.len(), 7);
    }

    #[test]
    fn test_snapshot_marks_cells() {
        let mut grid = Grid::new(2, 3);
        grid.set_terrain(Position::new(0, 1), Terrain::Hill);
        grid.set_terrain(Position::new(1, 1), Terrain::Hill);
        let graph = SpatialGraph::build(&grid, &[]).unwrap();
        let field = Field::new(grid, graph, Vec::new(), Vec::new());
        let snapshot = field.snapshot();
        // left column wins the tie (found first), right column is cut off
        assert_eq!(snapshot.cells, vec![".#~".to_string(), ".#~".to_string()]);
    }
}
