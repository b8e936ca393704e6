//! Render State
//!
//! What the renderer consumes. Coordinates are in grid units: fractional
//! while a snake is between cells, integral on tick boundaries.

use serde::Serialize;

use crate::core::grid::Cell;
use crate::game::state::{MatchPhase, PlayerId, PowerUpKind};
use crate::network::protocol::ScoreLine;

/// A point in fractional grid units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RenderPoint {
    /// Column
    pub x: f32,
    /// Row
    pub y: f32,
}

impl RenderPoint {
    /// Linear blend from `a` to `b`.
    pub fn lerp(a: Cell, b: Cell, t: f32) -> Self {
        Self {
            x: a.x as f32 + (b.x - a.x) as f32 * t,
            y: a.y as f32 + (b.y - a.y) as f32 * t,
        }
    }
}

impl From<Cell> for RenderPoint {
    fn from(cell: Cell) -> Self {
        Self { x: cell.x as f32, y: cell.y as f32 }
    }
}

/// One snake, ready to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSnake {
    /// Owner
    pub id: PlayerId,
    /// Slot; picks the color
    pub slot: u8,
    /// Display name
    pub name: String,
    /// Controlled by this peer
    pub local: bool,
    /// Head first
    pub segments: Vec<RenderPoint>,
    /// GHOST active
    pub ghost: bool,
    /// SPEED active
    pub speed: bool,
    /// SLOW active
    pub slow: bool,
}

/// A power-up, ready to draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderPowerUp {
    /// Kind
    #[serde(rename = "type")]
    pub kind: PowerUpKind,
    /// Column
    pub x: f32,
    /// Row
    pub y: f32,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderState {
    /// Tick of the newest snapshot in use
    pub tick: u32,
    /// Lifecycle tag of that snapshot
    pub phase: MatchPhase,
    /// Living snakes
    pub snakes: Vec<RenderSnake>,
    /// Food
    pub foods: Vec<RenderPoint>,
    /// Power-ups
    pub power_ups: Vec<RenderPowerUp>,
    /// Score table in slot order
    pub scores: Vec<ScoreLine>,
}

impl RenderState {
    /// Snake owned by `id`.
    pub fn snake(&self, id: &PlayerId) -> Option<&RenderSnake> {
        self.snakes.iter().find(|s| s.id == *id)
    }

    /// Nothing to draw yet.
    pub fn is_empty(&self) -> bool {
        self.snakes.is_empty() && self.foods.is_empty() && self.power_ups.is_empty()
    }
}
