//! Client Snapshot Layer
//!
//! Consumes accepted snapshots and produces render states. Never mutates
//! simulation state; the host's snapshots are the only source of truth.
//!
//! - `host_clock`: host timeline estimate
//! - `buffer`: tick-ordered snapshot store
//! - `interpolation`: render-state production
//! - `render`: types handed to the renderer

pub mod host_clock;
pub mod buffer;
pub mod interpolation;
pub mod render;

pub use host_clock::HostClock;
pub use buffer::{Bracket, SnapshotBuffer};
pub use interpolation::{InterpolationConfig, Interpolator};
pub use render::{RenderPoint, RenderPowerUp, RenderSnake, RenderState};
