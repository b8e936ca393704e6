//! Spawn Placement
//!
//! Snake spawn corners with an expanding ring search, and free-cell search
//! for pickups. All choices go through the match RNG so a seed reproduces
//! every placement.

use tracing::warn;

use crate::core::grid::{Cell, Direction, OccupancyIndex};
use crate::core::rng::DeterministicRng;
use crate::game::snake::Snake;

/// Distance of spawn corners from the board edge.
pub const CORNER_MARGIN: i32 = 2;

/// Random probes before falling back to a full scan.
pub const RANDOM_PROBES: u32 = 64;

/// Largest ring searched around a spawn corner.
pub const SPAWN_SEARCH_RADIUS: i32 = 4;

/// Length of a freshly spawned snake.
pub const SPAWN_LENGTH: usize = 2;

/// Spawn corner and heading for a slot. Slots beyond four wrap around.
///
/// | slot | corner | heading |
/// |---|---|---|
/// | 0 | top-left | right |
/// | 1 | bottom-right | left |
/// | 2 | top-right | down |
/// | 3 | bottom-left | up |
pub fn spawn_corner(slot: u8, cols: i32, rows: i32) -> (Cell, Direction) {
    let left = CORNER_MARGIN.min(cols - 1).max(0);
    let top = CORNER_MARGIN.min(rows - 1).max(0);
    let right = (cols - 1 - CORNER_MARGIN).max(0);
    let bottom = (rows - 1 - CORNER_MARGIN).max(0);
    match slot % 4 {
        0 => (Cell::new(left, top), Direction::Right),
        1 => (Cell::new(right, bottom), Direction::Left),
        2 => (Cell::new(right, top), Direction::Down),
        _ => (Cell::new(left, bottom), Direction::Up),
    }
}

/// Result of a spawn search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnPlacement {
    /// New snake
    pub snake: Snake,
    /// True when no free spot existed and the corner was used regardless
    pub forced: bool,
}

fn fits(occupancy: &OccupancyIndex, head: Cell, dir: Direction, cols: i32, rows: i32) -> bool {
    let tail = head.offset(dir.opposite());
    occupancy.is_free(head, cols, rows) && occupancy.is_free(tail, cols, rows)
}

/// Find a spot for a fresh two-segment snake.
///
/// Searches rings of growing Chebyshev radius (up to [`SPAWN_SEARCH_RADIUS`])
/// around the slot's corner, then probes random cells across the board, then
/// places at the corner even if occupied. Always returns a snake.
pub fn find_spawn(
    occupancy: &OccupancyIndex,
    slot: u8,
    cols: i32,
    rows: i32,
    rng: &mut DeterministicRng,
) -> SpawnPlacement {
    let (corner, dir) = spawn_corner(slot, cols, rows);

    for r in 0..=SPAWN_SEARCH_RADIUS {
        for y in (corner.y - r)..=(corner.y + r) {
            for x in (corner.x - r)..=(corner.x + r) {
                let cell = Cell::new(x, y);
                if cell.chebyshev(corner) != r {
                    continue;
                }
                if fits(occupancy, cell, dir, cols, rows) {
                    return SpawnPlacement { snake: Snake::straight(cell, dir, SPAWN_LENGTH), forced: false };
                }
            }
        }
    }

    for _ in 0..RANDOM_PROBES {
        let cell = Cell::new(rng.int_in_range(0, cols - 1), rng.int_in_range(0, rows - 1));
        if fits(occupancy, cell, dir, cols, rows) {
            return SpawnPlacement { snake: Snake::straight(cell, dir, SPAWN_LENGTH), forced: false };
        }
    }

    warn!(slot, x = corner.x, y = corner.y, "No free spawn cell, forcing corner placement");
    SpawnPlacement { snake: Snake::straight(corner, dir, SPAWN_LENGTH), forced: true }
}

/// Pick a free on-board cell for a pickup.
///
/// Random probes first, then a row-major scan. `None` only when the board is
/// full.
pub fn random_free_cell(
    occupancy: &OccupancyIndex,
    cols: i32,
    rows: i32,
    rng: &mut DeterministicRng,
) -> Option<Cell> {
    if cols <= 0 || rows <= 0 {
        return None;
    }
    for _ in 0..RANDOM_PROBES {
        let cell = Cell::new(rng.int_in_range(0, cols - 1), rng.int_in_range(0, rows - 1));
        if !occupancy.is_occupied(cell) {
            return Some(cell);
        }
    }
    (0..rows)
        .flat_map(|y| (0..cols).map(move |x| Cell::new(x, y)))
        .find(|cell| !occupancy.is_occupied(*cell))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corners() {
        assert_eq!(spawn_corner(0, 30, 20), (Cell::new(2, 2), Direction::Right));
        assert_eq!(spawn_corner(1, 30, 20), (Cell::new(27, 17), Direction::Left));
        assert_eq!(spawn_corner(2, 30, 20), (Cell::new(27, 2), Direction::Down));
        assert_eq!(spawn_corner(3, 30, 20), (Cell::new(2, 17), Direction::Up));
        assert_eq!(spawn_corner(4, 30, 20), spawn_corner(0, 30, 20));
    }

    #[test]
    fn test_empty_board_spawns_at_corner() {
        let mut rng = DeterministicRng::new(1);
        let placement = find_spawn(&OccupancyIndex::new(), 0, 30, 20, &mut rng);
        assert!(!placement.forced);
        assert_eq!(placement.snake.segments(), &[Cell::new(2, 2), Cell::new(1, 2)]);
    }

    #[test]
    fn test_ring_search_skips_occupied_corner() {
        let mut occupancy = OccupancyIndex::new();
        occupancy.insert(Cell::new(2, 2));
        let mut rng = DeterministicRng::new(1);
        let placement = find_spawn(&occupancy, 0, 30, 20, &mut rng);
        assert!(!placement.forced);
        let head = placement.snake.head();
        assert_eq!(head.chebyshev(Cell::new(2, 2)), 1);
        assert!(!occupancy.is_occupied(head));
        assert!(!occupancy.is_occupied(placement.snake.tail()));
    }

    #[test]
    fn test_crowded_corner_falls_back_to_random_cell() {
        // everything near the top-left corner is taken, the bottom half is open
        let mut occupancy = OccupancyIndex::new();
        for y in 0..10 {
            for x in 0..30 {
                occupancy.insert(Cell::new(x, y));
            }
        }
        let mut rng = DeterministicRng::new(5);
        let placement = find_spawn(&occupancy, 0, 30, 20, &mut rng);

        assert!(!placement.forced);
        let head = placement.snake.head();
        assert!(head.chebyshev(spawn_corner(0, 30, 20).0) > SPAWN_SEARCH_RADIUS);
        assert!(head.y >= 10);
        assert!(!occupancy.is_occupied(head));
        assert!(!occupancy.is_occupied(placement.snake.tail()));
        assert!(placement.snake.tail().in_bounds(30, 20));
    }

    #[test]
    fn test_saturated_board_forces_placement() {
        let mut occupancy = OccupancyIndex::new();
        for y in 0..6 {
            for x in 0..6 {
                occupancy.insert(Cell::new(x, y));
            }
        }
        let mut rng = DeterministicRng::new(9);
        let placement = find_spawn(&occupancy, 1, 6, 6, &mut rng);
        assert!(placement.forced);
        assert_eq!(placement.snake.len(), SPAWN_LENGTH);
        assert_eq!(placement.snake.head(), spawn_corner(1, 6, 6).0);
    }

    #[test]
    fn test_random_free_cell_full_board() {
        let mut occupancy = OccupancyIndex::new();
        for y in 0..3 {
            for x in 0..3 {
                if (x, y) != (2, 1) {
                    occupancy.insert(Cell::new(x, y));
                }
            }
        }
        let mut rng = DeterministicRng::new(3);
        assert_eq!(random_free_cell(&occupancy, 3, 3, &mut rng), Some(Cell::new(2, 1)));

        occupancy.insert(Cell::new(2, 1));
        assert_eq!(random_free_cell(&occupancy, 3, 3, &mut rng), None);
    }
}
