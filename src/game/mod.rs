//! Game Logic Module
//!
//! All game simulation code. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `snake`: Snake body and movement
//! - `input`: Key mapping and per-tick input recording
//! - `state`: Match state, player runtime, pickups
//! - `tick`: Authoritative simulation loop
//! - `collision`: Wall, self, body and head-to-head resolution
//! - `pickup`: Food and power-up consumption
//! - `spawn`: Spawn corners and free-cell search
//! - `events`: Game events for logging and replay

pub mod snake;
pub mod input;
pub mod state;
pub mod tick;
pub mod collision;
pub mod pickup;
pub mod spawn;
pub mod events;

// Re-export key types
pub use snake::Snake;
pub use input::{direction_from_key, InputLog, PlayerInputBuffer, TickInputs};
pub use state::{MatchPhase, MatchResult, MatchState, PlayerId, PlayerRuntime, PowerUp, PowerUpKind, Ranking, World};
pub use tick::{start_match, tick, MatchConfig, TickResult};
pub use collision::HeadToHeadPolicy;
pub use events::{DeathCause, GameEvent, GameEventData};
