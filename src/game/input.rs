//! Input Capture and Normalization
//!
//! Turns raw client input (key names or direction tags) into cardinal
//! directions and records per-player direction requests for replay.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::grid::Direction;
use crate::game::state::PlayerId;

// =============================================================================
// KEY MAPPING
// =============================================================================

/// Map a key name to a direction.
///
/// Arrow keys and WASD (either case). Anything else is ignored.
pub fn direction_from_key(key: &str) -> Option<Direction> {
    match key {
        "ArrowUp" | "w" | "W" => Some(Direction::Up),
        "ArrowDown" | "s" | "S" => Some(Direction::Down),
        "ArrowLeft" | "a" | "A" => Some(Direction::Left),
        "ArrowRight" | "d" | "D" => Some(Direction::Right),
        _ => None,
    }
}

/// Direction requests gathered for one tick, keyed by player.
///
/// Later requests from the same player within a tick replace earlier ones.
pub type TickInputs = BTreeMap<PlayerId, Direction>;

// =============================================================================
// INPUT RECORDING
// =============================================================================

/// A direction request at a specific tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDelta {
    /// Tick the request applies to
    pub tick: u32,
    /// Requested direction
    pub direction: Direction,
}

/// Per-player input log for replay.
///
/// Only ticks with a request are stored. A respawn resets the heading, so a
/// repeated direction is kept too.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerInputBuffer {
    /// Player ID
    pub player_id: PlayerId,

    /// Recorded changes, ascending by tick
    deltas: Vec<InputDelta>,
}

impl PlayerInputBuffer {
    /// Create an empty buffer.
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            deltas: Vec::new(),
        }
    }

    /// Record a request. Same-tick requests replace each other.
    pub fn record(&mut self, tick: u32, direction: Direction) {
        if let Some(last) = self.deltas.last_mut() {
            if last.tick == tick {
                last.direction = direction;
                return;
            }
        }
        self.deltas.push(InputDelta { tick, direction });
    }

    /// Request recorded for exactly `tick`.
    pub fn get_input_at(&self, tick: u32) -> Option<Direction> {
        self.deltas
            .binary_search_by_key(&tick, |d| d.tick)
            .ok()
            .map(|idx| self.deltas[idx].direction)
    }

    /// Recorded changes.
    pub fn deltas(&self) -> &[InputDelta] {
        &self.deltas
    }

    /// Number of recorded changes.
    pub fn delta_count(&self) -> usize {
        self.deltas.len()
    }
}

/// Input logs for every player of a match.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InputLog {
    buffers: BTreeMap<PlayerId, PlayerInputBuffer>,
}

impl InputLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every request of one tick.
    pub fn record_tick(&mut self, tick: u32, inputs: &TickInputs) {
        for (id, dir) in inputs {
            self.buffers
                .entry(*id)
                .or_insert_with(|| PlayerInputBuffer::new(*id))
                .record(tick, *dir);
        }
    }

    /// Requests recorded for `tick`, keyed by player.
    pub fn inputs_at(&self, tick: u32) -> TickInputs {
        self.buffers
            .iter()
            .filter_map(|(id, buf)| buf.get_input_at(tick).map(|d| (*id, d)))
            .collect()
    }

    /// Buffer for one player.
    pub fn player(&self, id: &PlayerId) -> Option<&PlayerInputBuffer> {
        self.buffers.get(id)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(direction_from_key("ArrowUp"), Some(Direction::Up));
        assert_eq!(direction_from_key("w"), Some(Direction::Up));
        assert_eq!(direction_from_key("S"), Some(Direction::Down));
        assert_eq!(direction_from_key("a"), Some(Direction::Left));
        assert_eq!(direction_from_key("ArrowRight"), Some(Direction::Right));
        assert_eq!(direction_from_key("Space"), None);
        assert_eq!(direction_from_key(""), None);
    }

    #[test]
    fn test_input_buffer_same_tick_replaces() {
        let mut buf = PlayerInputBuffer::new(PlayerId::new([1; 16]));
        buf.record(1, Direction::Up);
        buf.record(2, Direction::Up);
        buf.record(4, Direction::Left);
        buf.record(4, Direction::Down);

        assert_eq!(buf.delta_count(), 3);
        assert_eq!(buf.get_input_at(1), Some(Direction::Up));
        assert_eq!(buf.get_input_at(2), Some(Direction::Up));
        assert_eq!(buf.get_input_at(3), None);
        assert_eq!(buf.get_input_at(4), Some(Direction::Down));
    }

    #[test]
    fn test_input_log_roundtrip_by_tick() {
        let a = PlayerId::new([1; 16]);
        let b = PlayerId::new([2; 16]);
        let mut log = InputLog::new();

        let mut tick5 = TickInputs::new();
        tick5.insert(a, Direction::Up);
        tick5.insert(b, Direction::Left);
        log.record_tick(5, &tick5);

        let mut tick9 = TickInputs::new();
        tick9.insert(b, Direction::Down);
        log.record_tick(9, &tick9);

        assert_eq!(log.inputs_at(5), tick5);
        assert_eq!(log.inputs_at(9), tick9);
        assert!(log.inputs_at(7).is_empty());
        assert_eq!(log.player(&b).map(|p| p.delta_count()), Some(2));
    }
}
