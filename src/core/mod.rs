//! Core deterministic primitives.
//!
//! Grid geometry, the seeded generator, content hashing and the injectable
//! clock. Nothing in here performs I/O.

pub mod grid;
pub mod rng;
pub mod hash;
pub mod clock;

// Re-export core types
pub use grid::{Cell, Direction, OccupancyIndex};
pub use rng::DeterministicRng;
pub use hash::{StateHash, StateHasher};
pub use clock::{Clock, ManualClock, SystemClock};
