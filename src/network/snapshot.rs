//! Snapshot Codec
//!
//! A snapshot is the complete projection of the host's match state at one
//! tick. It is the only in-match state that crosses the network, always sent
//! whole. Clients accept snapshots strictly in tick order.

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::debug;

use crate::core::grid::Cell;
use crate::core::hash::{StateHash, StateHasher};
use crate::game::state::{MatchPhase, MatchState, PlayerId, PowerUp};
use crate::network::protocol::ProtocolError;

/// Snapshot rejection reasons.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    /// Older than the last accepted snapshot.
    #[error("stale snapshot: tick {tick} <= last accepted {last}")]
    Stale {
        /// Rejected tick
        tick: u32,
        /// Last accepted tick
        last: u32,
    },

    /// Same tick as the last accepted snapshot.
    #[error("duplicate snapshot for tick {0}")]
    Duplicate(u32),

    /// Content does not match the embedded hash.
    #[error("snapshot hash mismatch at tick {0}")]
    HashMismatch(u32),

    /// Could not decode the payload.
    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

/// One player's projection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    /// Player id
    pub id: PlayerId,
    /// Slot (spawn corner and color)
    pub slot: u8,
    /// Display name
    pub name: String,
    /// Score
    pub score: u32,
    /// Alive flag
    pub alive: bool,
    /// Post-move segments, head first
    pub segments: Vec<Cell>,
    /// Pre-move segments (interpolation source)
    pub prev_segments: Vec<Cell>,
    /// SPEED expiry tick
    pub speed_until: u32,
    /// SLOW expiry tick
    pub slow_until: u32,
    /// GHOST expiry tick
    pub ghost_until: u32,
}

/// Complete world state at one tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Strictly increasing tick
    pub tick: u32,
    /// Match lifecycle tag
    pub phase: MatchPhase,
    /// Recommended interpolation duration (one tick)
    pub interp_ms: u32,
    /// Tick the match clock runs out on
    pub end_tick: u32,
    /// Every player, in id order
    pub players: Vec<PlayerSnapshot>,
    /// Food cells
    pub foods: Vec<Cell>,
    /// Power-ups
    pub power_ups: Vec<PowerUp>,
    /// SHA-256 of everything above
    pub state_hash: StateHash,
}

impl Snapshot {
    /// Project the match state. `interp_ms` is normally the tick length.
    pub fn encode(state: &MatchState, interp_ms: u32) -> Self {
        let players = state
            .players
            .values()
            .map(|p| PlayerSnapshot {
                id: p.id,
                slot: p.slot,
                name: p.name.clone(),
                score: p.score,
                alive: p.alive,
                segments: p.segments().to_vec(),
                prev_segments: p.prev_segments.clone(),
                speed_until: p.speed_until,
                slow_until: p.slow_until,
                ghost_until: p.ghost_until,
            })
            .collect();

        let mut snapshot = Self {
            tick: state.tick,
            phase: state.phase,
            interp_ms,
            end_tick: state.end_tick,
            players,
            foods: state.world.foods.clone(),
            power_ups: state.world.power_ups.clone(),
            state_hash: [0; 32],
        };
        snapshot.state_hash = snapshot.content_hash();
        snapshot
    }

    /// Hash of the snapshot content, excluding `state_hash` itself.
    pub fn content_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_snapshot();
        hasher.update_u32(self.tick);
        hasher.update_u8(self.phase as u8);
        hasher.update_u32(self.interp_ms);
        hasher.update_u32(self.end_tick);

        hasher.update_u32(self.players.len() as u32);
        for p in &self.players {
            hasher.update_bytes(p.id.as_bytes());
            hasher.update_u8(p.slot);
            hasher.update_bytes(p.name.as_bytes());
            hasher.update_u32(p.score);
            hasher.update_bool(p.alive);
            hasher.update_cells(&p.segments);
            hasher.update_cells(&p.prev_segments);
            hasher.update_u32(p.speed_until);
            hasher.update_u32(p.slow_until);
            hasher.update_u32(p.ghost_until);
        }

        hasher.update_cells(&self.foods);
        hasher.update_u32(self.power_ups.len() as u32);
        for pu in &self.power_ups {
            hasher.update_u8(pu.kind as u8);
            hasher.update_cell(pu.cell);
        }

        hasher.finalize()
    }

    /// Whether the embedded hash matches the content.
    pub fn verify(&self) -> bool {
        self.content_hash() == self.state_hash
    }

    /// Look up one player.
    pub fn player(&self, id: &PlayerId) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| p.id == *id)
    }

    /// Serialize to binary (bincode).
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from binary (bincode).
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        Ok(bincode::deserialize(data)?)
    }
}

/// Client-side snapshot gate.
///
/// Accepts a snapshot only when its tick is strictly greater than the last
/// accepted one and its hash checks out. Rejected snapshots are never applied.
#[derive(Debug, Default)]
pub struct SnapshotDecoder {
    last_tick: Option<u32>,
    accepted: u64,
    rejected: u64,
}

impl SnapshotDecoder {
    /// Fresh decoder that accepts any first tick.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and accept a snapshot.
    pub fn accept(&mut self, snapshot: Snapshot) -> Result<Snapshot, SnapshotError> {
        if let Some(last) = self.last_tick {
            if snapshot.tick == last {
                self.rejected += 1;
                return Err(SnapshotError::Duplicate(snapshot.tick));
            }
            if snapshot.tick < last {
                self.rejected += 1;
                return Err(SnapshotError::Stale { tick: snapshot.tick, last });
            }
        }
        if !snapshot.verify() {
            self.rejected += 1;
            return Err(SnapshotError::HashMismatch(snapshot.tick));
        }

        self.last_tick = Some(snapshot.tick);
        self.accepted += 1;
        debug!(tick = snapshot.tick, "Snapshot accepted");
        Ok(snapshot)
    }

    /// Decode a bincode payload and accept it.
    pub fn accept_bytes(&mut self, data: &[u8]) -> Result<Snapshot, SnapshotError> {
        let snapshot = Snapshot::from_bytes(data).map_err(|e| {
            self.rejected += 1;
            SnapshotError::Malformed(e.to_string())
        })?;
        self.accept(snapshot)
    }

    /// Last accepted tick.
    pub fn last_tick(&self) -> Option<u32> {
        self.last_tick
    }

    /// Accepted count.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Rejected count.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Forget the last tick (new match or leave).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// =============================================================================
// TESTS
// =============================================================================
