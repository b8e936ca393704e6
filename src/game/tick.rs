//! Authoritative Simulation Tick
//!
//! The core game loop. Must be 100% deterministic: same seed, same roster and
//! same inputs always produce the same state.

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::game::collision::{resolve_substep, HeadToHeadPolicy};
use crate::game::events::GameEvent;
use crate::game::input::{InputLog, TickInputs};
use crate::game::pickup::{replenish, resolve_pickups};
use crate::game::spawn::find_spawn;
use crate::game::state::{EndReason, MatchPhase, MatchResult, MatchState, PlayerId, BASE_SPEED_PERMILLE};

/// Movement credit needed for one cell.
pub const MOVE_UNIT: u32 = BASE_SPEED_PERMILLE;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick, ordered
    pub events: Vec<GameEvent>,
    /// Final outcome; present only on the tick the match ended
    pub result: Option<MatchResult>,
}

impl TickResult {
    /// Whether the match ended on this tick.
    pub fn match_ended(&self) -> bool {
        self.result.is_some()
    }
}

/// Configuration for match simulation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Board width in cells
    pub cols: i32,
    /// Board height in cells
    pub rows: i32,
    /// Nominal tick length
    pub tick_ms: u32,
    /// Food kept on the board
    pub food_count: usize,
    /// Power-ups kept on the board
    pub power_up_count: usize,
    /// Score per food
    pub food_score: u32,
    /// SHRINK never goes below this
    pub min_length: usize,
    /// Segments removed by SHRINK
    pub shrink_amount: usize,
    /// SPEED rate factor, permille
    pub speed_multiplier_permille: u32,
    /// SLOW rate factor, permille
    pub slow_multiplier_permille: u32,
    /// Effect duration
    pub effect_duration_ms: u32,
    /// Delay before a dead snake comes back
    pub respawn_delay_ms: u32,
    /// Match clock
    pub match_duration_ms: u32,
    /// Head-to-head resolution
    pub head_to_head: HeadToHeadPolicy,
    /// Zero the score of a dying player
    pub reset_score_on_death: bool,
    /// Movement sub-steps per tick
    pub max_substeps: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            cols: 30,
            rows: 20,
            tick_ms: 100,
            food_count: 3,
            power_up_count: 2,
            food_score: 10,
            min_length: crate::game::snake::DEFAULT_MIN_LEN,
            shrink_amount: 3,
            speed_multiplier_permille: 2000,
            slow_multiplier_permille: 500,
            effect_duration_ms: 5000,
            respawn_delay_ms: 2000,
            match_duration_ms: 120_000,
            head_to_head: HeadToHeadPolicy::LongerSurvives,
            reset_score_on_death: false,
            max_substeps: 3,
        }
    }
}

impl MatchConfig {
    fn ms_to_ticks(&self, ms: u32) -> u32 {
        ms.div_ceil(self.tick_ms.max(1))
    }

    /// Effect lifetime in ticks, rounded up.
    pub fn effect_ticks(&self) -> u32 {
        self.ms_to_ticks(self.effect_duration_ms)
    }

    /// Respawn delay in ticks, rounded up.
    pub fn respawn_ticks(&self) -> u32 {
        self.ms_to_ticks(self.respawn_delay_ms)
    }

    /// Match length in ticks, rounded up.
    pub fn match_ticks(&self) -> u32 {
        self.ms_to_ticks(self.match_duration_ms)
    }
}

/// Start a match on `state`.
///
/// Reseeds the RNG, clears the board and every score, spawns each player in id
/// order and fills the board with pickups. Spawn events are delivered with the
/// next tick's result.
pub fn start_match(state: &mut MatchState, config: &MatchConfig, seed: u32, start_tick: u32) {
    state.rng_seed = seed;
    state.rng = crate::core::rng::DeterministicRng::new(seed);
    state.tick = start_tick;
    state.start_tick = start_tick;
    state.end_tick = start_tick + config.match_ticks();
    state.phase = MatchPhase::Running;
    state.result = None;
    state.world.clear();
    state.take_events();

    for player in state.players.values_mut() {
        player.reset_for_match();
        player.respawn_at = Some(start_tick);
    }
    state.started_with = state.players.len();

    process_respawns(state, config);
    replenish(state, config);

    info!(
        seed,
        start_tick,
        end_tick = state.end_tick,
        players = state.started_with,
        "Match started"
    );
}

/// Run one simulation tick.
///
/// # Arguments
///
/// * `state` - The match state (will be mutated)
/// * `inputs` - Direction requests for this tick (BTreeMap for deterministic order!)
/// * `config` - Match configuration
///
/// # Determinism
///
/// - Uses BTreeMap for iteration order
/// - Integer-only movement credits
/// - Uses deterministic RNG (state.rng)
/// - No system calls, no floating point
pub fn tick(state: &mut MatchState, inputs: &TickInputs, config: &MatchConfig) -> TickResult {
    let mut result = TickResult::default();

    match state.phase {
        MatchPhase::Running => {}
        _ => return result,
    }

    // 0. Advance tick counter
    state.tick += 1;

    // 1. Bring back players whose respawn timer expired
    process_respawns(state, config);

    // 2. Apply buffered direction requests
    apply_inputs(state, inputs);

    // 3. Keep pre-move segments for interpolation
    for player in state.players.values_mut() {
        player.prev_segments = player.segments().to_vec();
    }

    // 4. Movement sub-steps
    accrue_movement(state, config);
    for _ in 0..config.max_substeps.max(1) {
        let movers: Vec<PlayerId> = state
            .players
            .values()
            .filter(|p| p.alive && p.move_credit >= MOVE_UNIT)
            .map(|p| p.id)
            .collect();
        if movers.is_empty() {
            break;
        }
        run_substep(state, &movers, config);
    }
    for player in state.players.values_mut() {
        player.move_credit = player.move_credit.min(MOVE_UNIT - 1);
    }

    // 5. Check end conditions
    if let Some(reason) = end_reason(state) {
        result.result = Some(end_match(state, reason));
    }

    result.events = state.take_events();
    result
}

/// Buffer each request on its snake. Requests for unknown or dead players are dropped.
fn apply_inputs(state: &mut MatchState, inputs: &TickInputs) {
    for (player_id, dir) in inputs {
        if let Some(player) = state.players.get_mut(player_id) {
            if player.alive {
                player.desired_direction = Some(*dir);
            }
        }
    }

    for player in state.players.values_mut() {
        if let (Some(dir), Some(snake)) = (player.desired_direction.take(), player.snake.as_mut()) {
            snake.set_direction(dir);
        }
    }
}

/// Add this tick's speed to every living player's movement credit.
fn accrue_movement(state: &mut MatchState, config: &MatchConfig) {
    let tick = state.tick;
    for player in state.players.values_mut().filter(|p| p.alive) {
        let rate = player.speed_permille(
            tick,
            config.speed_multiplier_permille,
            config.slow_multiplier_permille,
        );
        player.move_credit = player.move_credit.saturating_add(rate);
    }
}

/// Move `movers` one cell, resolve their collisions, then their pickups.
fn run_substep(state: &mut MatchState, movers: &[PlayerId], config: &MatchConfig) {
    for id in movers {
        if let Some(player) = state.players.get_mut(id) {
            player.move_credit -= MOVE_UNIT;
            if let Some(snake) = player.snake.as_mut() {
                snake.step();
            }
        }
    }

    let deaths = resolve_substep(state, movers, config);
    let respawn_at = state.tick + config.respawn_ticks();
    for death in &deaths {
        if let Some(player) = state.players.get_mut(&death.victim) {
            player.kill(Some(respawn_at), config.reset_score_on_death);
            debug!(
                player = %death.victim.short(),
                cause = ?death.cause,
                respawn_at,
                "Player died"
            );
        }
        state.push_event(GameEvent::player_died(state.tick, death.victim, death.cause, death.killer));
    }

    let survivors: Vec<PlayerId> = movers
        .iter()
        .filter(|id| !deaths.iter().any(|d| d.victim == **id))
        .copied()
        .collect();
    resolve_pickups(state, &survivors, config);
}

/// Respawn every dead player whose timer has expired, in id order.
fn process_respawns(state: &mut MatchState, config: &MatchConfig) {
    let due: Vec<PlayerId> = state
        .players
        .values()
        .filter(|p| !p.alive && p.respawn_at.is_some_and(|t| t <= state.tick))
        .map(|p| p.id)
        .collect();
    if due.is_empty() {
        return;
    }

    let mut occupancy = state.occupancy();
    for id in due {
        let Some(slot) = state.players.get(&id).map(|p| p.slot) else { continue };
        let placement = find_spawn(&occupancy, slot, config.cols, config.rows, &mut state.rng);
        occupancy.extend(placement.snake.segments());
        let head = placement.snake.head();
        if let Some(player) = state.players.get_mut(&id) {
            player.revive(placement.snake);
        }
        debug!(player = %id.short(), x = head.x, y = head.y, forced = placement.forced, "Player spawned");
        state.push_event(GameEvent::player_respawned(state.tick, id, head, placement.forced));
    }
}

/// Decide whether the match is over.
fn end_reason(state: &MatchState) -> Option<EndReason> {
    if state.players.is_empty() {
        return Some(EndReason::Abandoned);
    }
    let alive = state.alive_count();
    let last_standing = if state.started_with >= 2 { alive <= 1 } else { alive == 0 };
    if last_standing {
        return Some(EndReason::LastStanding);
    }
    if state.tick >= state.end_tick {
        return Some(EndReason::TimeUp);
    }
    None
}

/// End the match and compute the final standings.
fn end_match(state: &mut MatchState, reason: EndReason) -> MatchResult {
    state.phase = MatchPhase::Ended;

    let rankings = state.rankings();
    let result = MatchResult {
        end_tick: state.tick,
        reason,
        winner: rankings.first().map(|r| r.id),
        rankings,
    };
    state.result = Some(result.clone());

    info!(
        tick = state.tick,
        ?reason,
        winner = %result.winner.map(|w| w.short()).unwrap_or_default(),
        "Match ended"
    );
    state.push_event(GameEvent::match_ended(state.tick, state.start_tick, result.winner, reason));
    result
}

/// Replay a match from recorded inputs.
///
/// `roster` lists `(id, name, slot)`. Inputs are looked up by the tick they
/// were applied on, counted from `start_tick`. Returns the final state and
/// every event.
pub fn replay_match(
    config: &MatchConfig,
    seed: u32,
    start_tick: u32,
    roster: &[(PlayerId, String, u8)],
    log: &InputLog,
    tick_count: u32,
) -> (MatchState, Vec<GameEvent>) {
    let mut state = MatchState::new(seed);
    for (id, name, slot) in roster {
        state.add_player(*id, name.clone(), *slot);
    }
    start_match(&mut state, config, seed, start_tick);

    let mut all_events = Vec::new();
    for _ in 0..tick_count {
        let inputs = log.inputs_at(state.tick + 1);
        let result = tick(&mut state, &inputs, config);
        let ended = result.match_ended();
        all_events.extend(result.events);
        if ended {
            break;
        }
    }

    (state, all_events)
}
