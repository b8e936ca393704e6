//! Snapshot Content Hashing
//!
//! SHA-256 over a fixed field order. The host stamps every snapshot with the
//! hash of its content; the client recomputes it on decode and drops the
//! snapshot on mismatch.

use sha2::{Sha256, Digest};
use super::grid::Cell;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for snapshot content.
///
/// Order of updates is part of the wire contract.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Hasher for snapshot content.
    pub fn for_snapshot() -> Self {
        Self::new(b"SNAKE_ARENA_SNAPSHOT_V1")
    }

    /// Update with raw bytes, length-prefixed.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.update_u32(bytes.len() as u32);
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i32 value (little-endian).
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with a grid cell.
    #[inline]
    pub fn update_cell(&mut self, cell: Cell) {
        self.update_i32(cell.x);
        self.update_i32(cell.y);
    }

    /// Update with a cell list, length-prefixed.
    pub fn update_cells(&mut self, cells: &[Cell]) {
        self.update_u32(cells.len() as u32);
        for cell in cells {
            self.update_cell(*cell);
        }
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_determinism() {
        let mut a = StateHasher::for_snapshot();
        let mut b = StateHasher::for_snapshot();
        for h in [&mut a, &mut b] {
            h.update_u64(7);
            h.update_cells(&[Cell::new(1, 2), Cell::new(1, 3)]);
        }
        assert_eq!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_length_prefix_separates_lists() {
        // [a][b] must not collide with [a, b][]
        let mut split = StateHasher::for_snapshot();
        split.update_cells(&[Cell::new(1, 1)]);
        split.update_cells(&[Cell::new(2, 2)]);

        let mut joined = StateHasher::for_snapshot();
        joined.update_cells(&[Cell::new(1, 1), Cell::new(2, 2)]);
        joined.update_cells(&[]);

        assert_ne!(split.finalize(), joined.finalize());
    }
}
