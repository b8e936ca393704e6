//! Game Events
//!
//! Events generated during simulation for logging and replay checks.

use serde::{Serialize, Deserialize};

use crate::core::grid::Cell;
use crate::game::state::{EndReason, PlayerId, PowerUpKind};

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Deaths first
    Death = 0,
    /// Then pickups
    Pickup = 1,
    /// Then respawns
    Respawn = 2,
    /// Lowest priority
    Other = 255,
}

/// What killed a snake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    /// Head left the board
    Wall,
    /// Head entered its own body
    SelfCollision,
    /// Head entered another snake's body
    Body,
    /// Two or more heads met on one cell
    HeadToHead,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Snake died
    PlayerDied {
        victim_id: PlayerId,
        cause: DeathCause,
        killer_id: Option<PlayerId>,
    },

    /// Food eaten
    FoodEaten {
        player_id: PlayerId,
        cell: Cell,
        new_score: u32,
    },

    /// Power-up collected
    PowerUpCollected {
        player_id: PlayerId,
        kind: PowerUpKind,
        cell: Cell,
    },

    /// Snake placed on the board again
    PlayerRespawned {
        player_id: PlayerId,
        head: Cell,
        forced: bool,
    },

    /// Match ended
    MatchEnded {
        winner_id: Option<PlayerId>,
        reason: EndReason,
        duration_ticks: u32,
    },
}

/// A game event with timing and priority.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Processing priority
    pub priority: EventPriority,

    /// Player involved (for tie-breaking)
    pub player_id: Option<PlayerId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, priority: EventPriority, data: GameEventData) -> Self {
        let player_id = match &data {
            GameEventData::PlayerDied { victim_id, .. } => Some(*victim_id),
            GameEventData::FoodEaten { player_id, .. } => Some(*player_id),
            GameEventData::PowerUpCollected { player_id, .. } => Some(*player_id),
            GameEventData::PlayerRespawned { player_id, .. } => Some(*player_id),
            GameEventData::MatchEnded { winner_id, .. } => *winner_id,
        };

        Self {
            tick,
            priority,
            player_id,
            data,
        }
    }

    /// Create player died event.
    pub fn player_died(
        tick: u32,
        victim_id: PlayerId,
        cause: DeathCause,
        killer_id: Option<PlayerId>,
    ) -> Self {
        Self::new(
            tick,
            EventPriority::Death,
            GameEventData::PlayerDied {
                victim_id,
                cause,
                killer_id,
            },
        )
    }

    /// Create food eaten event.
    pub fn food_eaten(tick: u32, player_id: PlayerId, cell: Cell, new_score: u32) -> Self {
        Self::new(
            tick,
            EventPriority::Pickup,
            GameEventData::FoodEaten {
                player_id,
                cell,
                new_score,
            },
        )
    }

    /// Create power-up collected event.
    pub fn power_up_collected(tick: u32, player_id: PlayerId, kind: PowerUpKind, cell: Cell) -> Self {
        Self::new(
            tick,
            EventPriority::Pickup,
            GameEventData::PowerUpCollected { player_id, kind, cell },
        )
    }

    /// Create respawn event.
    pub fn player_respawned(tick: u32, player_id: PlayerId, head: Cell, forced: bool) -> Self {
        Self::new(
            tick,
            EventPriority::Respawn,
            GameEventData::PlayerRespawned { player_id, head, forced },
        )
    }

    /// Create match ended event.
    pub fn match_ended(tick: u32, start_tick: u32, winner_id: Option<PlayerId>, reason: EndReason) -> Self {
        Self::new(
            tick,
            EventPriority::Other,
            GameEventData::MatchEnded {
                winner_id,
                reason,
                duration_ticks: tick.saturating_sub(start_tick),
            },
        )
    }

    /// Processing order: tick, then priority, then player id.
    pub fn sort_key(&self) -> (u32, EventPriority, Option<PlayerId>) {
        (self.tick, self.priority, self.player_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ordering() {
        let id1 = PlayerId::new([1; 16]);
        let id2 = PlayerId::new([2; 16]);

        let event1 = GameEvent::player_died(10, id1, DeathCause::Wall, None);
        let event2 = GameEvent::food_eaten(10, id1, Cell::new(1, 1), 10);
        let event3 = GameEvent::player_died(10, id2, DeathCause::Body, Some(id1));

        // Same tick, but death < pickup
        assert!(event1.sort_key() < event2.sort_key());

        // Same tick and priority, but id1 < id2
        assert!(event1.sort_key() < event3.sort_key());
    }

    #[test]
    fn test_equality_includes_payload() {
        let id = PlayerId::new([1; 16]);
        let wall = GameEvent::player_died(10, id, DeathCause::Wall, None);
        let body = GameEvent::player_died(10, id, DeathCause::Body, None);
        assert_eq!(wall.sort_key(), body.sort_key());
        assert_ne!(wall, body);
        assert_eq!(wall, wall.clone());

        let here = GameEvent::food_eaten(10, id, Cell::new(1, 1), 10);
        let there = GameEvent::food_eaten(10, id, Cell::new(2, 1), 10);
        assert_ne!(here, there);
    }

    #[test]
    fn test_match_ended_duration() {
        let event = GameEvent::match_ended(130, 10, None, EndReason::TimeUp);
        match event.data {
            GameEventData::MatchEnded { duration_ticks, .. } => assert_eq!(duration_ticks, 120),
            other => panic!("unexpected {:?}", other),
        }
    }
}
