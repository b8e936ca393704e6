//! Deterministic Random Number Generator
//!
//! 32-bit linear congruential generator. Given the same seed, produces the
//! identical sequence on every platform. The host picks a seed per match and
//! ships it in the match-start message so runs can be reproduced for
//! debugging; clients never need to mirror it.

use serde::{Serialize, Deserialize};

/// LCG multiplier (Numerical Recipes).
pub const LCG_MULTIPLIER: u32 = 1_664_525;

/// LCG increment (Numerical Recipes).
pub const LCG_INCREMENT: u32 = 1_013_904_223;

/// Deterministic PRNG: `state = state * a + c (mod 2^32)`.
///
/// `int_in_range` reduces by modulo, so ranges that do not divide 2^32 carry a
/// small bias. Accepted for spawn placement.
///
/// # Example
///
/// ```
/// use snake_arena::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(1);
/// assert_eq!(rng.next_u32(), 1_015_568_748);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: u32,
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a seed.
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Core generator step.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        self.state
    }

    /// Random integer in `[min, max_inclusive]`.
    ///
    /// Returns `min` when the range is empty or inverted.
    #[inline]
    pub fn int_in_range(&mut self, min: i32, max_inclusive: i32) -> i32 {
        if max_inclusive <= min {
            return min;
        }
        let span = (max_inclusive as i64 - min as i64 + 1) as u64;
        let roll = self.next_u32() as u64 % span;
        (min as i64 + roll as i64) as i32
    }

    /// Random index in `[0, len)`.
    #[inline]
    pub fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        (self.next_u32() as u64 % len as u64) as usize
    }

    /// Select a random element. `None` only for an empty slice.
    pub fn pick_from<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            let idx = self.index(items.len());
            items.get(idx)
        }
    }

    /// Shuffle a slice in place using Fisher-Yates.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.index(i + 1);
            slice.swap(i, j);
        }
    }

    /// Current state (for checkpointing/debugging).
    pub fn state(&self) -> u32 {
        self.state
    }

    /// Restore from saved state.
    pub fn set_state(&mut self, state: u32) {
        self.state = state;
    }
}

/// Mix a per-match seed from wall-clock time.
///
/// Folds the 64-bit millisecond timestamp and a caller-supplied salt (e.g. a
/// session counter) through one LCG round so consecutive matches started in
/// the same millisecond still differ.
pub fn seed_from_wall_clock(salt: u32) -> u32 {
    let millis = chrono::Utc::now().timestamp_millis() as u64;
    mix_seed(millis, salt)
}

/// Deterministic part of [`seed_from_wall_clock`].
pub fn mix_seed(millis: u64, salt: u32) -> u32 {
    let folded = (millis as u32) ^ ((millis >> 32) as u32) ^ salt.rotate_left(16);
    let mut rng = DeterministicRng::new(folded);
    rng.next_u32()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rng_known_values() {
        // These values must never change.
        let mut rng = DeterministicRng::new(0);
        assert_eq!(rng.next_u32(), 1_013_904_223);
        assert_eq!(rng.next_u32(), 1_196_435_762);
        assert_eq!(rng.next_u32(), 3_519_870_697);
    }

    #[test]
    fn test_rng_determinism() {
        let mut rng1 = DeterministicRng::new(42);
        let mut rng2 = DeterministicRng::new(42);

        for _ in 0..1000 {
            assert_eq!(rng1.int_in_range(-5, 17), rng2.int_in_range(-5, 17));
            assert_eq!(
                rng1.pick_from(&["a", "b", "c"]),
                rng2.pick_from(&["a", "b", "c"])
            );
        }
    }

    #[test]
    fn test_rng_different_seeds() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(54321);
        assert_ne!(rng1.next_u32(), rng2.next_u32());
    }

    #[test]
    fn test_int_in_range_edges() {
        let mut rng = DeterministicRng::new(5678);
        assert_eq!(rng.int_in_range(5, 5), 5);
        assert_eq!(rng.int_in_range(9, 3), 9);

        for _ in 0..1000 {
            let val = rng.int_in_range(-10, 10);
            assert!((-10..=10).contains(&val));
        }

        // Full i32 span must not overflow
        let _ = rng.int_in_range(i32::MIN, i32::MAX);
    }

    #[test]
    fn test_pick_from_empty() {
        let mut rng = DeterministicRng::new(1);
        let empty: [u8; 0] = [];
        assert!(rng.pick_from(&empty).is_none());
        assert_eq!(rng.pick_from(&[7]), Some(&7));
    }

    #[test]
    fn test_shuffle_determinism() {
        let mut rng1 = DeterministicRng::new(1111);
        let mut rng2 = DeterministicRng::new(1111);

        let mut arr1 = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let mut arr2 = arr1;

        rng1.shuffle(&mut arr1);
        rng2.shuffle(&mut arr2);

        assert_eq!(arr1, arr2);
    }

    #[test]
    fn test_state_checkpoint() {
        let mut rng = DeterministicRng::new(5555);
        for _ in 0..50 {
            rng.next_u32();
        }

        let saved = rng.state();
        let next_values: Vec<u32> = (0..10).map(|_| rng.next_u32()).collect();

        rng.set_state(saved);
        for expected in next_values {
            assert_eq!(rng.next_u32(), expected);
        }
    }

    #[test]
    fn test_mix_seed_salt_changes_seed() {
        assert_eq!(mix_seed(1_700_000_000_000, 1), mix_seed(1_700_000_000_000, 1));
        assert_ne!(mix_seed(1_700_000_000_000, 1), mix_seed(1_700_000_000_000, 2));
    }

    proptest! {
        #[test]
        fn prop_same_seed_same_sequence(seed in any::<u32>(), min in -1000i32..1000, span in 0i32..1000) {
            let mut a = DeterministicRng::new(seed);
            let mut b = DeterministicRng::new(seed);
            for _ in 0..32 {
                let x = a.int_in_range(min, min + span);
                prop_assert_eq!(x, b.int_in_range(min, min + span));
                prop_assert!(x >= min && x <= min + span);
            }
        }
    }
}
