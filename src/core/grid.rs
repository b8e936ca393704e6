//! Grid Primitives
//!
//! Integer cells, cardinal directions and the occupancy index used before
//! every spawn decision.

use std::collections::HashSet;
use serde::{Serialize, Deserialize};

// =============================================================================
// CELL
// =============================================================================

/// A single grid cell. Coordinates may be negative or past the board edge
/// transiently (a head that just left the board), which is how wall deaths
/// are detected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl Cell {
    /// Create a cell.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Neighbouring cell one step in `dir`.
    #[inline]
    pub fn offset(self, dir: Direction) -> Cell {
        let (dx, dy) = dir.delta();
        Cell::new(self.x + dx, self.y + dy)
    }

    /// Whether the cell lies inside `[0, cols) x [0, rows)`.
    #[inline]
    pub fn in_bounds(self, cols: i32, rows: i32) -> bool {
        self.x >= 0 && self.y >= 0 && self.x < cols && self.y < rows
    }

    /// Chebyshev distance.
    pub fn chebyshev(self, other: Cell) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Pack into a single integer key.
    #[inline]
    pub fn pack(self) -> u64 {
        ((self.x as u32 as u64) << 32) | (self.y as u32 as u64)
    }

    /// Inverse of [`Cell::pack`].
    #[inline]
    pub fn unpack(key: u64) -> Cell {
        Cell::new((key >> 32) as u32 as i32, key as u32 as i32)
    }
}

// =============================================================================
// DIRECTION
// =============================================================================

/// One of the four cardinal unit vectors. Diagonal or zero vectors cannot be
/// represented, so they can never be stored on a snake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// y - 1
    Up,
    /// y + 1
    Down,
    /// x - 1
    Left,
    /// x + 1
    Right,
}

impl Direction {
    /// All four directions in a fixed order.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Right, Direction::Down, Direction::Left];

    /// Unit vector.
    #[inline]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// The exact inverse direction.
    #[inline]
    pub const fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Build from a raw vector. Anything but a cardinal unit vector is rejected.
    pub fn from_delta(dx: i32, dy: i32) -> Option<Direction> {
        match (dx, dy) {
            (0, -1) => Some(Direction::Up),
            (0, 1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            (1, 0) => Some(Direction::Right),
            _ => None,
        }
    }
}

// =============================================================================
// OCCUPANCY INDEX
// =============================================================================

/// Set of occupied cells, keyed by [`Cell::pack`].
///
/// Rebuilt from the authoritative state before a batch of spawn decisions and
/// updated incrementally as cells are placed within the batch.
#[derive(Clone, Debug, Default)]
pub struct OccupancyIndex {
    cells: HashSet<u64>,
}

impl OccupancyIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a cell occupied. Returns false if it already was.
    pub fn insert(&mut self, cell: Cell) -> bool {
        self.cells.insert(cell.pack())
    }

    /// Mark every cell in the iterator occupied.
    pub fn extend<'a>(&mut self, cells: impl IntoIterator<Item = &'a Cell>) {
        for cell in cells {
            self.cells.insert(cell.pack());
        }
    }

    /// Release a cell.
    pub fn remove(&mut self, cell: Cell) -> bool {
        self.cells.remove(&cell.pack())
    }

    /// Occupancy predicate.
    #[inline]
    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.cells.contains(&cell.pack())
    }

    /// Free and on the board.
    #[inline]
    pub fn is_free(&self, cell: Cell, cols: i32, rows: i32) -> bool {
        cell.in_bounds(cols, rows) && !self.is_occupied(cell)
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when nothing is occupied.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_roundtrip_negative() {
        for cell in [Cell::new(0, 0), Cell::new(-1, 5), Cell::new(29, -1), Cell::new(-7, -9)] {
            assert_eq!(Cell::unpack(cell.pack()), cell);
        }
    }

    #[test]
    fn test_opposites() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            let (dx, dy) = dir.delta();
            let (ox, oy) = dir.opposite().delta();
            assert_eq!((dx + ox, dy + oy), (0, 0));
        }
    }

    #[test]
    fn test_from_delta_rejects_diagonal_and_zero() {
        assert_eq!(Direction::from_delta(1, 0), Some(Direction::Right));
        assert_eq!(Direction::from_delta(1, 1), None);
        assert_eq!(Direction::from_delta(0, 0), None);
        assert_eq!(Direction::from_delta(0, 2), None);
    }

    #[test]
    fn test_in_bounds() {
        assert!(Cell::new(0, 0).in_bounds(30, 20));
        assert!(Cell::new(29, 19).in_bounds(30, 20));
        assert!(!Cell::new(-1, 0).in_bounds(30, 20));
        assert!(!Cell::new(30, 0).in_bounds(30, 20));
        assert!(!Cell::new(0, 20).in_bounds(30, 20));
    }

    #[test]
    fn test_occupancy_index() {
        let mut index = OccupancyIndex::new();
        assert!(index.insert(Cell::new(3, 4)));
        assert!(!index.insert(Cell::new(3, 4)));
        assert!(index.is_occupied(Cell::new(3, 4)));
        assert!(!index.is_free(Cell::new(3, 4), 10, 10));
        assert!(!index.is_free(Cell::new(-1, 4), 10, 10));
        assert!(index.is_free(Cell::new(4, 3), 10, 10));

        index.remove(Cell::new(3, 4));
        assert!(index.is_empty());
    }
}
