//! Connectivity graph over passable cells and shortest-path routing
//!
//! Every passable cell is a node; cells within Euclidean distance 1.5 (the
//! 8-neighbourhood) are connected. Only the largest connected component is
//! kept, so every node of the graph is reachable from every other node.

use ahash::AHashMap;
use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;

use crate::core::error::{DissonanceError, Result};
use crate::core::types::Position;
use crate::field::grid::Grid;

/// Forward half of the 8-neighbourhood; the other half is covered by symmetry
const FORWARD_NEIGHBOURS: [(i32, i32); 4] = [(0, 1), (1, -1), (1, 0), (1, 1)];

#[derive(Debug, Clone, Default)]
pub struct SpatialGraph {
    graph: UnGraph<Position, ()>,
    nodes: AHashMap<Position, NodeIndex>,
}

impl SpatialGraph {
    /// Build the graph for `grid`, reduced to its largest connected component
    ///
    /// Fails if any of `required` (the nucleus positions) is not part of that
    /// component; the map is unplayable and must be regenerated.
    pub fn build(grid: &Grid, required: &[Position]) -> Result<Self> {
        let full = Self::build_full(grid);
        let reduced = full.largest_component();

        for pos in required {
            if !reduced.contains(*pos) {
                return Err(DissonanceError::InvalidPosition(
                    *pos,
                    "not connected to the main component".into(),
                ));
            }
        }

        tracing::debug!(
            nodes = reduced.len(),
            pruned = full.len() - reduced.len(),
            "built spatial graph"
        );
        Ok(reduced)
    }

    fn build_full(grid: &Grid) -> Self {
        let mut graph = UnGraph::new_undirected();
        let mut nodes = AHashMap::new();

        for pos in grid.positions().filter(|p| grid.is_passable(*p)) {
            let idx = graph.add_node(pos);
            nodes.insert(pos, idx);
        }

        // Edges are added in grid order so routing tie-breaks are reproducible
        for pos in grid.positions() {
            let Some(&idx) = nodes.get(&pos) else {
                continue;
            };
            for (dr, dc) in FORWARD_NEIGHBOURS {
                let neighbour = Position::new(pos.row + dr, pos.col + dc);
                if let Some(&other) = nodes.get(&neighbour) {
                    graph.add_edge(idx, other, ());
                }
            }
        }

        Self { graph, nodes }
    }

    fn largest_component(&self) -> Self {
        let mut components = UnionFind::<usize>::new(self.graph.node_count());
        for edge in self.graph.raw_edges() {
            components.union(edge.source().index(), edge.target().index());
        }

        let mut sizes: AHashMap<usize, usize> = AHashMap::new();
        for idx in self.graph.node_indices() {
            *sizes.entry(components.find(idx.index())).or_insert(0) += 1;
        }

        // Largest component; ties go to the component found first in node order
        let mut best: Option<(usize, usize)> = None;
        for idx in self.graph.node_indices() {
            let root = components.find(idx.index());
            let size = sizes[&root];
            if best.map_or(true, |(_, best_size)| size > best_size) {
                best = Some((root, size));
            }
        }
        let Some((root, _)) = best else {
            return Self::default();
        };

        let mut graph = UnGraph::new_undirected();
        let mut nodes = AHashMap::new();
        for idx in self.graph.node_indices() {
            if components.find(idx.index()) == root {
                let pos = self.graph[idx];
                nodes.insert(pos, graph.add_node(pos));
            }
        }
        for edge in self.graph.raw_edges() {
            let a = self.graph[edge.source()];
            let b = self.graph[edge.target()];
            if let (Some(&ia), Some(&ib)) = (nodes.get(&a), nodes.get(&b)) {
                graph.add_edge(ia, ib, ());
            }
        }

        Self { graph, nodes }
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.nodes.contains_key(&pos)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Graph neighbours of a cell (empty for cells outside the graph)
    pub fn neighbors(&self, pos: Position) -> Vec<Position> {
        match self.nodes.get(&pos) {
            Some(&idx) => self.graph.neighbors(idx).map(|n| self.graph[n]).collect(),
            None => Vec::new(),
        }
    }

    /// Shortest path between two cells, both ends included
    pub fn shortest_path(&self, from: Position, to: Position) -> Option<Vec<Position>> {
        let start = *self.nodes.get(&from)?;
        let goal = *self.nodes.get(&to)?;
        astar(
            &self.graph,
            start,
            |n| n == goal,
            |_| 1u32,
            |n| chebyshev(self.graph[n], to),
        )
        .map(|(_, path)| path.into_iter().map(|n| self.graph[n]).collect())
    }

    /// Route from `start` through every waypoint in order; the last waypoint is
    /// the destination.
    ///
    /// Legs that cannot be routed are logged and skipped, so the result may be
    /// partial. The result always starts with `start`.
    pub fn get_way(&self, start: Position, waypoints: &[Position]) -> Vec<Position> {
        let mut way = vec![start];
        let mut current = start;
        for &waypoint in waypoints {
            match self.shortest_path(current, waypoint) {
                Some(leg) => {
                    way.extend(leg.into_iter().skip(1));
                    current = waypoint;
                }
                None => {
                    tracing::warn!(from = %current, to = %waypoint, "no route for leg, skipping");
                }
            }
        }
        way
    }
}

fn chebyshev(a: Position, b: Position) -> u32 {
    (a.row - b.row).unsigned_abs().max((a.col - b.col).unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::grid::Terrain;

    fn wall(grid: &mut Grid, col: i32) {
        for row in 0..grid.rows() {
            grid.set_terrain(Position::new(row, col), Terrain::Hill);
        }
    }

    #[test]
    fn test_open_grid_fully_connected() {
        let grid = Grid::new(5, 5);
        let graph = SpatialGraph::build(&grid, &[Position::new(0, 0)]).unwrap();
        assert_eq!(graph.len(), 25);
        assert_eq!(graph.neighbors(Position::new(2, 2)).len(), 8);
        assert_eq!(graph.neighbors(Position::new(0, 0)).len(), 3);
    }

    #[test]
    fn test_keeps_largest_component() {
        let mut grid = Grid::new(5, 10);
        wall(&mut grid, 2);
        let graph = SpatialGraph::build(&grid, &[]).unwrap();
        // 5x7 on the right beats 5x2 on the left
        assert_eq!(graph.len(), 35);
        assert!(!graph.contains(Position::new(0, 0)));
        assert!(graph.contains(Position::new(0, 9)));
    }

    #[test]
    fn test_required_position_in_pruned_component_fails() {
        let mut grid = Grid::new(5, 10);
        wall(&mut grid, 2);
        let err = SpatialGraph::build(&grid, &[Position::new(1, 1)]).unwrap_err();
        assert!(matches!(err, DissonanceError::InvalidPosition(..)));
    }

    #[test]
    fn test_diagonal_gap_connects() {
        let mut grid = Grid::new(2, 2);
        grid.set_terrain(Position::new(0, 1), Terrain::Hill);
        grid.set_terrain(Position::new(1, 0), Terrain::Hill);
        let graph = SpatialGraph::build(&grid, &[Position::new(0, 0), Position::new(1, 1)]);
        assert!(graph.is_ok());
    }

    #[test]
    fn test_shortest_path_diagonal() {
        let graph = SpatialGraph::build(&Grid::new(6, 6), &[]).unwrap();
        let path = graph
            .shortest_path(Position::new(0, 0), Position::new(4, 4))
            .unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(path.first(), Some(&Position::new(0, 0)));
        assert_eq!(path.last(), Some(&Position::new(4, 4)));
    }

    #[test]
    fn test_get_way_splices_legs() {
        let graph = SpatialGraph::build(&Grid::new(6, 6), &[]).unwrap();
        let start = Position::new(0, 0);
        let way = graph.get_way(start, &[Position::new(0, 3), Position::new(3, 3)]);
        assert_eq!(way.first(), Some(&start));
        assert_eq!(way.last(), Some(&Position::new(3, 3)));
        assert!(way.contains(&Position::new(0, 3)));
        // no duplicated boundary cell
        assert_eq!(way.len(), 7);
        assert!(way.windows(2).all(|w| w[0].is_adjacent(&w[1])));
    }

    #[test]
    fn test_get_way_skips_unroutable_leg() {
        let mut grid = Grid::new(5, 10);
        wall(&mut grid, 2);
        let graph = SpatialGraph::build(&grid, &[]).unwrap();
        let start = Position::new(0, 5);
        // (0, 0) was pruned, so that leg is skipped and routing continues
        let way = graph.get_way(start, &[Position::new(0, 0), Position::new(0, 8)]);
        assert_eq!(way.first(), Some(&start));
        assert_eq!(way.last(), Some(&Position::new(0, 8)));
        assert_eq!(way.len(), 4);
    }

    #[test]
    fn test_get_way_from_outside_graph() {
        let graph = SpatialGraph::build(&Grid::new(3, 3), &[]).unwrap();
        let way = graph.get_way(Position::new(10, 10), &[Position::new(0, 0)]);
        assert_eq!(way, vec![Position::new(10, 10)]);
    }
}
