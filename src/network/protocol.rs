//! Protocol Messages
//!
//! Wire format for every message exchanged inside a session. Messages are
//! one closed enum tagged by a `type` field and serialized as JSON. Each
//! message that has two names on the wire accepts both.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::grid::Direction;
use crate::game::input::direction_from_key;
use crate::game::state::{MatchResult, PlayerId};
use crate::network::snapshot::Snapshot;

/// Codec failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON encode/decode failed.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary encode/decode failed.
    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),
}

// =============================================================================
// MESSAGE
// =============================================================================

/// Every message in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Announce display name.
    Hello(HelloPayload),

    /// Toggle ready state.
    Ready(ReadyPayload),

    /// Authoritative membership sync (host to others).
    #[serde(alias = "lobby_state")]
    Roster(RosterPayload),

    /// Countdown progress (host to others). `seconds == 0` cancels.
    Countdown(CountdownPayload),

    /// Match begins (host to others).
    #[serde(alias = "start_game")]
    Start(StartPayload),

    /// Directional intent (client to host).
    Input(InputPayload),

    /// Per-tick world state (host to others).
    #[serde(alias = "snapshot")]
    State(Snapshot),

    /// Match result (host to others).
    #[serde(alias = "winner")]
    End(EndPayload),

    /// Return an ended match to the lobby.
    Rematch,

    /// Explicit departure.
    Leave,

    /// Request rejected.
    Error(ErrorPayload),
}

impl Message {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Wire tag, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Hello(_) => "hello",
            Message::Ready(_) => "ready",
            Message::Roster(_) => "roster",
            Message::Countdown(_) => "countdown",
            Message::Start(_) => "start",
            Message::Input(_) => "input",
            Message::State(_) => "state",
            Message::End(_) => "end",
            Message::Rematch => "rematch",
            Message::Leave => "leave",
            Message::Error(_) => "error",
        }
    }

    /// Messages a non-host peer may send to the host.
    pub fn allowed_from_client(&self) -> bool {
        matches!(
            self,
            Message::Hello(_) | Message::Ready(_) | Message::Input(_) | Message::Rematch | Message::Leave
        )
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Display name announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Display name
    pub name: String,
}

/// Ready toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyPayload {
    /// New ready state
    pub ready: bool,
}

/// One roster line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterPlayer {
    /// Player id
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Ready flag
    pub ready: bool,
    /// Score
    pub score: u32,
    /// Slot index
    pub slot: u8,
    /// Session host
    pub is_host: bool,
}

/// Membership sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterPayload {
    /// Players in slot order
    pub players: Vec<RosterPlayer>,
}

/// Countdown progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownPayload {
    /// Host tick the countdown started on
    pub start_tick: u32,
    /// Seconds remaining; zero means cancelled
    pub seconds: u32,
}

/// Match start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    /// First match tick
    pub start_tick: u32,
    /// Tick the match clock runs out on
    pub end_tick: u32,
    /// RNG seed of this match
    pub seed: u32,
    /// Participants
    pub players: Vec<RosterPlayer>,
}

/// Directional intent, either as a direction tag or a key name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InputPayload {
    /// Direction tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<Direction>,
    /// Key name ("ArrowUp", "w", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Last snapshot tick the sender had seen
    #[serde(default)]
    pub tick: u32,
}

impl InputPayload {
    /// Input carrying a direction.
    pub fn from_direction(dir: Direction, tick: u32) -> Self {
        Self { dir: Some(dir), key: None, tick }
    }

    /// Resolve to a direction. The tag wins over the key.
    pub fn direction(&self) -> Option<Direction> {
        self.dir.or_else(|| self.key.as_deref().and_then(direction_from_key))
    }
}

/// One line of a score table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreLine {
    /// Display name
    pub name: String,
    /// Score
    pub score: u32,
    /// Alive flag
    pub alive: bool,
}

/// Match result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndPayload {
    /// Winner's display name
    pub winner_name: String,
    /// Final standings
    pub scores: Vec<ScoreLine>,
}

impl From<&MatchResult> for EndPayload {
    fn from(result: &MatchResult) -> Self {
        Self {
            winner_name: result.winner_name(),
            scores: result
                .rankings
                .iter()
                .map(|r| ScoreLine { name: r.name.clone(), score: r.score, alive: r.alive })
                .collect(),
        }
    }
}

/// Rejection reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No free slot
    LobbyFull,
    /// Joins are closed once the lobby is left
    MatchInProgress,
    /// Only the host may send this
    NotHost,
}

/// Error report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Code
    pub code: ErrorCode,
    /// Human readable text
    pub message: String,
}

// =============================================================================
// TESTS
// =============================================================================
