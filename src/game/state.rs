//! Game State Definitions
//!
//! All state types for match simulation.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::grid::{Cell, Direction, OccupancyIndex};
use crate::core::hash::{StateHash, StateHasher};
use crate::core::rng::DeterministicRng;
use crate::game::events::GameEvent;
use crate::game::snake::Snake;

/// Speed factor of an unaffected player, in permille of one cell per tick.
pub const BASE_SPEED_PERMILLE: u32 = 1000;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID as bytes).
///
/// Implements Ord for deterministic BTreeMap ordering and slot assignment.
/// Travels over the wire as the hyphenated UUID string; byte order and
/// string order agree.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random identifier.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Short hex prefix for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerId({})", self.short())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uuid_string())
    }
}

impl TryFrom<String> for PlayerId {
    type Error = uuid::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        uuid::Uuid::parse_str(&value).map(|u| Self(*u.as_bytes()))
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.to_uuid_string()
    }
}

// =============================================================================
// POWER-UPS
// =============================================================================

/// Power-up type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum PowerUpKind {
    /// Picker moves faster
    Speed = 0,
    /// Every other living player moves slower
    Slow = 1,
    /// Picker survives body contact
    Ghost = 2,
    /// Picker loses tail segments
    Shrink = 3,
}

impl PowerUpKind {
    /// Every kind, in spawn-table order.
    pub const ALL: [PowerUpKind; 4] = [
        PowerUpKind::Speed,
        PowerUpKind::Slow,
        PowerUpKind::Ghost,
        PowerUpKind::Shrink,
    ];
}

/// A power-up lying on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerUp {
    /// Type tag
    pub kind: PowerUpKind,
    /// Location
    pub cell: Cell,
}

// =============================================================================
// WORLD
// =============================================================================

/// Shared pickups on the board.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    /// Food cells
    pub foods: Vec<Cell>,
    /// Power-up cells
    pub power_ups: Vec<PowerUp>,
}

impl World {
    /// Remove the food at `cell`, if any.
    pub fn take_food(&mut self, cell: Cell) -> bool {
        match self.foods.iter().position(|f| *f == cell) {
            Some(idx) => {
                self.foods.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Remove the power-up at `cell`, if any.
    pub fn take_power_up(&mut self, cell: Cell) -> Option<PowerUpKind> {
        let idx = self.power_ups.iter().position(|p| p.cell == cell)?;
        Some(self.power_ups.remove(idx).kind)
    }

    /// Drop every pickup.
    pub fn clear(&mut self) {
        self.foods.clear();
        self.power_ups.clear();
    }
}

// =============================================================================
// PLAYER RUNTIME
// =============================================================================

/// Per-player simulation state, owned by the host's engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerRuntime {
    /// Unique player ID
    pub id: PlayerId,

    /// Display name
    pub name: String,

    /// Slot index (spawn corner and color)
    pub slot: u8,

    /// Order in which the player entered the match; ranking tie-break
    pub join_order: u32,

    /// Current body; `None` while dead
    pub snake: Option<Snake>,

    /// Segments before this tick's movement (interpolation source)
    pub prev_segments: Vec<Cell>,

    /// Latest requested direction, consumed once per tick
    pub desired_direction: Option<Direction>,

    /// Tick until which SPEED is active (exclusive)
    pub speed_until: u32,

    /// Tick until which SLOW is active (exclusive)
    pub slow_until: u32,

    /// Tick until which GHOST is active (exclusive)
    pub ghost_until: u32,

    /// Movement progress in permille of a cell
    pub move_credit: u32,

    /// Is player alive?
    pub alive: bool,

    /// Tick at which a dead player is respawned
    pub respawn_at: Option<u32>,

    /// Accumulated score
    pub score: u32,

    /// Foods eaten this match
    pub foods_eaten: u32,

    /// Deaths this match
    pub deaths: u32,
}

impl PlayerRuntime {
    /// Create a dead player waiting for its first spawn.
    pub fn new(id: PlayerId, name: impl Into<String>, slot: u8, join_order: u32) -> Self {
        Self {
            id,
            name: name.into(),
            slot,
            join_order,
            snake: None,
            prev_segments: Vec::new(),
            desired_direction: None,
            speed_until: 0,
            slow_until: 0,
            ghost_until: 0,
            move_credit: 0,
            alive: false,
            respawn_at: None,
            score: 0,
            foods_eaten: 0,
            deaths: 0,
        }
    }

    /// Give the player a fresh body and clear every effect.
    pub fn revive(&mut self, snake: Snake) {
        self.prev_segments = snake.segments().to_vec();
        self.snake = Some(snake);
        self.alive = true;
        self.respawn_at = None;
        self.desired_direction = None;
        self.clear_effects();
    }

    /// Clear the body and arm the respawn timer.
    pub fn kill(&mut self, respawn_at: Option<u32>, reset_score: bool) {
        self.snake = None;
        self.prev_segments.clear();
        self.alive = false;
        self.respawn_at = respawn_at;
        self.desired_direction = None;
        self.deaths += 1;
        self.clear_effects();
        if reset_score {
            self.score = 0;
        }
    }

    /// Reset everything for a new match.
    pub fn reset_for_match(&mut self) {
        self.snake = None;
        self.prev_segments.clear();
        self.alive = false;
        self.respawn_at = None;
        self.desired_direction = None;
        self.score = 0;
        self.foods_eaten = 0;
        self.deaths = 0;
        self.clear_effects();
    }

    fn clear_effects(&mut self) {
        self.speed_until = 0;
        self.slow_until = 0;
        self.ghost_until = 0;
        self.move_credit = 0;
    }

    /// SPEED active at `tick`?
    #[inline]
    pub fn has_speed(&self, tick: u32) -> bool {
        self.speed_until > tick
    }

    /// SLOW active at `tick`?
    #[inline]
    pub fn has_slow(&self, tick: u32) -> bool {
        self.slow_until > tick
    }

    /// GHOST active at `tick`?
    #[inline]
    pub fn has_ghost(&self, tick: u32) -> bool {
        self.ghost_until > tick
    }

    /// Movement rate in permille of a cell per tick.
    pub fn speed_permille(&self, tick: u32, speed_permille: u32, slow_permille: u32) -> u32 {
        let mut rate = BASE_SPEED_PERMILLE;
        if self.has_speed(tick) {
            rate = rate * speed_permille / BASE_SPEED_PERMILLE;
        }
        if self.has_slow(tick) {
            rate = rate * slow_permille / BASE_SPEED_PERMILLE;
        }
        rate
    }

    /// Current segment count (0 while dead).
    pub fn length(&self) -> usize {
        self.snake.as_ref().map_or(0, |s| s.len())
    }

    /// Current segments (empty while dead).
    pub fn segments(&self) -> &[Cell] {
        self.snake.as_ref().map_or(&[], |s| s.segments())
    }
}

// =============================================================================
// MATCH PHASE
// =============================================================================

/// Match lifecycle, shared by the session state machine and snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// No session
    #[default]
    Idle,
    /// Gathering players
    Lobby,
    /// Countdown before start
    Countdown,
    /// Active gameplay
    Running,
    /// Match over, results shown
    Ended,
}

// =============================================================================
// RESULTS
// =============================================================================

/// Why a match ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// At most one player left alive
    LastStanding,
    /// Match clock reached the end tick
    TimeUp,
    /// Everybody left
    Abandoned,
}

/// One line of the final standings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    /// Player
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// 1-based place
    pub place: u8,
    /// Final score
    pub score: u32,
    /// Alive when the match ended
    pub alive: bool,
}

/// Final outcome of a match. Produced exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Tick the match ended on
    pub end_tick: u32,
    /// Why it ended
    pub reason: EndReason,
    /// First place, if anyone played
    pub winner: Option<PlayerId>,
    /// Standings by descending score, join order breaking ties
    pub rankings: Vec<Ranking>,
}

impl MatchResult {
    /// Winner's display name (empty when nobody played).
    pub fn winner_name(&self) -> String {
        self.rankings.first().map(|r| r.name.clone()).unwrap_or_default()
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete authoritative state of a match.
///
/// Uses BTreeMap for deterministic iteration order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchState {
    /// Current tick
    pub tick: u32,

    /// Tick the match started on
    pub start_tick: u32,

    /// Tick the match clock runs out on
    pub end_tick: u32,

    /// Current phase (Lobby before start, Running, Ended)
    pub phase: MatchPhase,

    /// RNG seed (for reproduction)
    pub rng_seed: u32,

    /// Deterministic RNG state
    pub rng: DeterministicRng,

    /// All players (BTreeMap for deterministic iteration)
    pub players: BTreeMap<PlayerId, PlayerRuntime>,

    /// Shared pickups
    pub world: World,

    /// Player count when the match started
    pub started_with: usize,

    /// Final outcome once ended
    pub result: Option<MatchResult>,

    /// Next join order number
    next_join_order: u32,

    /// Events generated this tick (cleared each tick)
    #[serde(skip)]
    pending_events: Vec<GameEvent>,
}

impl MatchState {
    /// Create a new match state.
    pub fn new(rng_seed: u32) -> Self {
        Self {
            tick: 0,
            start_tick: 0,
            end_tick: 0,
            phase: MatchPhase::Lobby,
            rng_seed,
            rng: DeterministicRng::new(rng_seed),
            players: BTreeMap::new(),
            world: World::default(),
            started_with: 0,
            result: None,
            next_join_order: 0,
            pending_events: Vec::new(),
        }
    }

    /// Add a player (dead until spawned). Re-adding an existing id only
    /// refreshes its name and slot.
    pub fn add_player(&mut self, id: PlayerId, name: impl Into<String>, slot: u8) {
        let name = name.into();
        if let Some(player) = self.players.get_mut(&id) {
            player.name = name;
            player.slot = slot;
            return;
        }
        let order = self.next_join_order;
        self.next_join_order += 1;
        self.players.insert(id, PlayerRuntime::new(id, name, slot, order));
    }

    /// Remove a player entirely.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<PlayerRuntime> {
        self.players.remove(id)
    }

    /// Get a player by ID.
    pub fn get_player(&self, id: &PlayerId) -> Option<&PlayerRuntime> {
        self.players.get(id)
    }

    /// Get a player mutably by ID.
    pub fn get_player_mut(&mut self, id: &PlayerId) -> Option<&mut PlayerRuntime> {
        self.players.get_mut(id)
    }

    /// Count of alive players.
    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.alive).count()
    }

    /// Occupancy of every snake body, food and power-up.
    pub fn occupancy(&self) -> OccupancyIndex {
        let mut index = OccupancyIndex::new();
        for player in self.players.values() {
            index.extend(player.segments());
        }
        index.extend(&self.world.foods);
        index.extend(self.world.power_ups.iter().map(|p| &p.cell));
        index
    }

    /// Final standings: descending score, join order breaking ties.
    pub fn rankings(&self) -> Vec<Ranking> {
        let mut players: Vec<&PlayerRuntime> = self.players.values().collect();
        players.sort_by(|a, b| b.score.cmp(&a.score).then(a.join_order.cmp(&b.join_order)));
        players
            .into_iter()
            .enumerate()
            .map(|(i, p)| Ranking {
                id: p.id,
                name: p.name.clone(),
                place: (i + 1) as u8,
                score: p.score,
                alive: p.alive,
            })
            .collect()
    }

    /// Hash of the full simulation state, for replay comparison.
    pub fn compute_hash(&self) -> StateHash {
        let mut hasher = StateHasher::new(b"SNAKE_ARENA_MATCH_V1");
        hasher.update_u32(self.tick);
        hasher.update_u32(self.end_tick);
        hasher.update_u8(self.phase as u8);
        hasher.update_u32(self.rng.state());

        hasher.update_u32(self.players.len() as u32);
        for player in self.players.values() {
            hasher.update_bytes(player.id.as_bytes());
            hasher.update_u32(player.score);
            hasher.update_bool(player.alive);
            hasher.update_cells(player.segments());
            hasher.update_u32(player.speed_until);
            hasher.update_u32(player.slow_until);
            hasher.update_u32(player.ghost_until);
            hasher.update_u32(player.move_credit);
            hasher.update_u32(player.respawn_at.unwrap_or(u32::MAX));
        }

        hasher.update_cells(&self.world.foods);
        hasher.update_u32(self.world.power_ups.len() as u32);
        for power_up in &self.world.power_ups {
            hasher.update_u8(power_up.kind as u8);
            hasher.update_cell(power_up.cell);
        }

        hasher.finalize()
    }

    /// Check if match has ended.
    pub fn is_ended(&self) -> bool {
        matches!(self.phase, MatchPhase::Ended)
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        let mut events = std::mem::take(&mut self.pending_events);
        events.sort_by_key(GameEvent::sort_key);
        events
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================
