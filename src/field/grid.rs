//! Terrain grid

use serde::{Deserialize, Serialize};

use crate::core::types::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Terrain {
    #[default]
    Free,
    Hill,
}

impl Terrain {
    pub fn is_passable(&self) -> bool {
        matches!(self, Terrain::Free)
    }
}

/// Row-major terrain grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    rows: i32,
    cols: i32,
    cells: Vec<Terrain>,
}

impl Grid {
    /// Create a grid with only free cells
    pub fn new(rows: i32, cols: i32) -> Self {
        let rows = rows.max(0);
        let cols = cols.max(0);
        Self {
            rows,
            cols,
            cells: vec![Terrain::Free; (rows * cols) as usize],
        }
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn cols(&self) -> i32 {
        self.cols
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.row >= 0 && pos.col >= 0 && pos.row < self.rows && pos.col < self.cols
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if self.in_bounds(pos) {
            Some((pos.row * self.cols + pos.col) as usize)
        } else {
            None
        }
    }

    pub fn terrain(&self, pos: Position) -> Option<Terrain> {
        self.index(pos).map(|i| self.cells[i])
    }

    pub fn is_passable(&self, pos: Position) -> bool {
        self.terrain(pos).is_some_and(|t| t.is_passable())
    }

    pub fn set_terrain(&mut self, pos: Position, terrain: Terrain) {
        if let Some(i) = self.index(pos) {
            self.cells[i] = terrain;
        }
    }

    /// All positions in row-major order
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| Position::new(row, col)))
    }

    pub fn hill_count(&self) -> usize {
        self.cells.iter().filter(|t| !t.is_passable()).count()
    }
}
