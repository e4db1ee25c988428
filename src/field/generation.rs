//! Procedural map generation
//!
//! Terrain is carved from a feature sequence at two scales (single cells and
//! small blobs). If a candidate map leaves a nucleus outside the main graph
//! component, or a nucleus without room for its resource slots, the densities
//! are lowered and generation is retried up to a fixed number of attempts.

use ahash::AHashSet;

use crate::audio::sequence::FeatureSequence;
use crate::core::config::FieldConfig;
use crate::core::error::{DissonanceError, Result};
use crate::core::types::Position;
use crate::field::graph::SpatialGraph;
use crate::field::grid::{Grid, Terrain};
use crate::field::map::{Field, RangeFilter};

/// Resource slots placed around each nucleus (one per bindable resource)
pub const RESOURCE_SLOTS: usize = 6;

/// Generate a playable field for `players` players
pub fn generate_field(
    config: &FieldConfig,
    players: usize,
    seq: &mut dyn FeatureSequence,
) -> Result<Field> {
    let nuclei = nucleus_positions(config, players, seq);
    let mut density = config.hill_density;
    let mut large_density = config.large_hill_density;

    for attempt in 1..=config.max_map_attempts {
        let mut grid = Grid::new(config.rows, config.cols);
        add_hills(&mut grid, seq, density, large_density);
        for &nucleus in &nuclei {
            clear_around(&mut grid, nucleus, config.resource_slot_max);
        }

        match assemble(config, grid, &nuclei, seq) {
            Ok(field) => {
                tracing::info!(attempt, density, nodes = field.graph().len(), "map generated");
                return Ok(field.with_attempts(attempt));
            }
            Err(e) => {
                tracing::warn!(attempt, density, "map rejected: {}", e);
                density *= config.density_decay;
                large_density *= config.density_decay;
            }
        }
    }

    Err(DissonanceError::MapUnplayable {
        attempts: config.max_map_attempts,
    })
}

/// Mark cells impassable at two size scales
pub fn add_hills(
    grid: &mut Grid,
    seq: &mut dyn FeatureSequence,
    density: f64,
    large_density: f64,
) {
    let cells: Vec<Position> = grid.positions().collect();
    for &pos in &cells {
        if seq.chance(density) {
            grid.set_terrain(pos, Terrain::Hill);
        }
    }
    for &pos in &cells {
        if seq.chance(large_density) {
            let radius = 1 + seq.next_below(2) as i32;
            for row in (pos.row - radius)..=(pos.row + radius) {
                for col in (pos.col - radius)..=(pos.col + radius) {
                    let cell = Position::new(row, col);
                    if pos.distance(&cell) <= radius as f64 {
                        grid.set_terrain(cell, Terrain::Hill);
                    }
                }
            }
        }
    }
}

/// Keep the nucleus and its resource ring free of hills
fn clear_around(grid: &mut Grid, center: Position, radius: f64) {
    let reach = radius.ceil() as i32;
    for row in (center.row - reach)..=(center.row + reach) {
        for col in (center.col - reach)..=(center.col + reach) {
            let cell = Position::new(row, col);
            if center.distance(&cell) <= radius {
                grid.set_terrain(cell, Terrain::Free);
            }
        }
    }
}

/// One nucleus per player, each in its own column section, alternating
/// between the upper and lower half of the map.
fn nucleus_positions(
    config: &FieldConfig,
    players: usize,
    seq: &mut dyn FeatureSequence,
) -> Vec<Position> {
    let players = players.max(1) as i32;
    let margin = config.edge_margin;
    let section = config.cols / players;
    let half = config.rows / 2;

    (0..players)
        .map(|i| {
            let col_lo = (i * section + margin).min(config.cols - margin - 1);
            let col_hi = ((i + 1) * section - margin).max(col_lo + 1);
            let (row_lo, row_hi) = if i % 2 == 0 {
                (margin, half.max(margin + 1))
            } else {
                (half.min(config.rows - margin - 1), config.rows - margin)
            };
            let row = row_lo + seq.next_below((row_hi - row_lo).max(1) as u32) as i32;
            let col = col_lo + seq.next_below((col_hi - col_lo).max(1) as u32) as i32;
            Position::new(row, col)
        })
        .collect()
}

fn assemble(
    config: &FieldConfig,
    grid: Grid,
    nuclei: &[Position],
    seq: &mut dyn FeatureSequence,
) -> Result<Field> {
    let graph = SpatialGraph::build(&grid, nuclei)?;
    let field = Field::new(grid, graph, nuclei.to_vec(), Vec::new());

    let mut occupied: AHashSet<Position> = nuclei.iter().copied().collect();
    let mut slots = Vec::with_capacity(nuclei.len());
    for &nucleus in nuclei {
        let mut candidates = field.sorted_in_range(
            nucleus,
            config.resource_slot_max,
            config.resource_slot_min,
            RangeFilter::Free(&occupied),
        );
        if candidates.len() < RESOURCE_SLOTS {
            return Err(DissonanceError::InvalidPosition(
                nucleus,
                format!("only {} free resource cells", candidates.len()),
            ));
        }
        let mut chosen = Vec::with_capacity(RESOURCE_SLOTS);
        for _ in 0..RESOURCE_SLOTS {
            let Some(idx) = seq.pick(candidates.len()) else {
                break;
            };
            let pos = candidates.swap_remove(idx);
            occupied.insert(pos);
            chosen.push(pos);
        }
        slots.push(chosen);
    }

    Ok(field.with_resource_slots(slots))
}
