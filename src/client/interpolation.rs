//! Snapshot Interpolation
//!
//! Turns the stream of accepted snapshots into a smooth [`RenderState`].
//!
//! ```text
//! host ticks:     k-1          k            k+1 (not yet received)
//!                  │            │
//!                  ▼            ▼
//!             ┌─────────┐  ┌─────────┐
//!             │  S(k-1) │  │  S(k)   │
//!             └─────────┘  └─────────┘
//!                  └─────┬──────┘
//!                        ▼
//!          render time = host now - delay
//! ```
//!
//! Remote snakes are drawn further behind the host clock than the local
//! snake, so they always have a newer snapshot to blend toward while the
//! local snake stays responsive. Reading is pull-based: `render` never waits
//! and returns an empty state until the first snapshot arrives.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::client::buffer::{Bracket, SnapshotBuffer};
use crate::client::host_clock::{snapshot_host_time, HostClock};
use crate::client::render::{RenderPoint, RenderPowerUp, RenderSnake, RenderState};
use crate::core::grid::Cell;
use crate::game::state::PlayerId;
use crate::network::protocol::ScoreLine;
use crate::network::snapshot::{PlayerSnapshot, Snapshot};

/// Interpolation tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    /// How far behind the host clock other players are drawn
    pub remote_delay_ms: f64,
    /// How far behind the host clock the local player is drawn
    pub local_delay_ms: f64,
    /// Snapshots kept
    pub buffer_capacity: usize,
    /// Host clock offset smoothing
    pub time_correction_rate: f64,
    /// A head moving further than this per tick is snapped, not blended
    pub max_cells_per_tick: i32,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            remote_delay_ms: 150.0,
            local_delay_ms: 50.0,
            buffer_capacity: 32,
            time_correction_rate: 0.1,
            max_cells_per_tick: 3,
        }
    }
}

/// Snapshot buffer plus host clock, producing render states.
#[derive(Debug, Clone)]
pub struct Interpolator {
    config: InterpolationConfig,
    local_id: Option<PlayerId>,
    clock: HostClock,
    buffer: SnapshotBuffer,
}

impl Interpolator {
    /// New interpolator; `local_id` is the snake drawn with the local delay.
    pub fn new(config: InterpolationConfig, local_id: Option<PlayerId>) -> Self {
        Self {
            clock: HostClock::new(config.time_correction_rate),
            buffer: SnapshotBuffer::new(config.buffer_capacity),
            config,
            local_id,
        }
    }

    /// Change which snake counts as local.
    pub fn set_local(&mut self, local_id: Option<PlayerId>) {
        self.local_id = local_id;
    }

    /// Buffer an accepted snapshot that arrived at local time `now_ms`.
    pub fn push(&mut self, snapshot: Snapshot, now_ms: u64) -> bool {
        let host_ms = snapshot_host_time(&snapshot);
        let tick = snapshot.tick;
        if !self.buffer.push(snapshot) {
            debug!(tick, "Snapshot not newer than buffer, ignored");
            return false;
        }
        self.clock.observe(host_ms, now_ms);
        true
    }

    /// Newest buffered snapshot.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.buffer.latest()
    }

    /// Buffered snapshot count.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop all snapshots and the clock estimate.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.clock.reset();
    }

    /// Render state at local time `now_ms`.
    pub fn render(&self, now_ms: u64) -> RenderState {
        let Some(host_now) = self.clock.to_host(now_ms) else {
            return RenderState::default();
        };
        let Some(remote) = self.buffer.bracket(host_now - self.config.remote_delay_ms) else {
            return RenderState::default();
        };
        let local = self.buffer.bracket(host_now - self.config.local_delay_ms);

        let mut snakes = Vec::new();
        for player in &remote.to.players {
            let is_local = self.local_id == Some(player.id);
            let bracket = match (is_local, local) {
                (true, Some(b)) => b,
                _ => remote,
            };
            if let Some(snake) = self.render_snake(&bracket, &player.id, is_local) {
                snakes.push(snake);
            }
        }
        // local snake may already exist in a newer snapshot than the remote view
        if let (Some(id), Some(b)) = (self.local_id, local) {
            if !snakes.iter().any(|s| s.id == id) {
                if let Some(snake) = self.render_snake(&b, &id, true) {
                    snakes.push(snake);
                }
            }
        }

        let to = remote.to;
        RenderState {
            tick: to.tick,
            phase: to.phase,
            snakes,
            foods: to.foods.iter().map(|c| RenderPoint::from(*c)).collect(),
            power_ups: to
                .power_ups
                .iter()
                .map(|pu| RenderPowerUp { kind: pu.kind, x: pu.cell.x as f32, y: pu.cell.y as f32 })
                .collect(),
            scores: to
                .players
                .iter()
                .map(|p| ScoreLine { name: p.name.clone(), score: p.score, alive: p.alive })
                .collect(),
        }
    }

    fn render_snake(&self, bracket: &Bracket<'_>, id: &PlayerId, local: bool) -> Option<RenderSnake> {
        let target = bracket.to.player(id)?;
        if !target.alive || target.segments.is_empty() {
            return None;
        }

        let (source, span) = source_segments(bracket, target);
        let snap = match (source.first(), target.segments.first()) {
            (Some(from), Some(to)) => from.chebyshev(*to) > self.config.max_cells_per_tick * span as i32,
            _ => true,
        };

        let segments = if snap {
            target.segments.iter().map(|c| RenderPoint::from(*c)).collect()
        } else {
            blend(source, &target.segments, bracket.t)
        };

        let tick = bracket.to.tick;
        Some(RenderSnake {
            id: target.id,
            slot: target.slot,
            name: target.name.clone(),
            local,
            segments,
            ghost: target.ghost_until > tick,
            speed: target.speed_until > tick,
            slow: target.slow_until > tick,
        })
    }
}

/// Where a snake is blended from, and across how many ticks.
fn source_segments<'a>(bracket: &Bracket<'a>, target: &'a PlayerSnapshot) -> (&'a [Cell], u32) {
    match bracket.from {
        Some(from) if bracket.to.tick != from.tick + 1 => {
            let span = bracket.to.tick.saturating_sub(from.tick).max(1);
            match from.player(&target.id) {
                Some(prev) if prev.alive && !prev.segments.is_empty() => (prev.segments.as_slice(), span),
                _ => (target.prev_segments.as_slice(), 1),
            }
        }
        _ => (target.prev_segments.as_slice(), 1),
    }
}

/// Blend segment lists index by index. A shorter source is padded with its
/// tail; the result has the target's length.
fn blend(source: &[Cell], target: &[Cell], t: f32) -> Vec<RenderPoint> {
    target
        .iter()
        .enumerate()
        .map(|(i, to)| {
            let from = source.get(i).or_else(|| source.last()).copied().unwrap_or(*to);
            RenderPoint::lerp(from, *to, t)
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
