//! # Snake Arena
//!
//! Host-authoritative multiplayer snake on a grid, plus the client layer that
//! turns the host's snapshots into smooth render states.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SNAKE ARENA                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── grid.rs     - Cells, directions, occupancy index        │
//! │  ├── rng.rs      - Seeded 32-bit LCG                         │
//! │  ├── hash.rs     - Snapshot content hashing                  │
//! │  └── clock.rs    - Injectable time source                    │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── snake.rs    - Snake body and movement                   │
//! │  ├── input.rs    - Key mapping and input recording           │
//! │  ├── state.rs    - Match and player state                    │
//! │  ├── tick.rs     - Authoritative simulation loop             │
//! │  ├── collision.rs- Wall, body and head-to-head deaths        │
//! │  ├── pickup.rs   - Food and power-ups                        │
//! │  └── spawn.rs    - Spawn placement                           │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── protocol.rs - Message types                             │
//! │  ├── snapshot.rs - Snapshot encode/accept                    │
//! │  ├── session.rs  - Host/client session state machine         │
//! │  └── transport.rs- Transport events, loopback hub            │
//! │                                                              │
//! │  client/         - Snapshot buffering and interpolation      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are deterministic:
//! - Integer grid and integer movement credits, no floating point
//! - No HashMap iteration (BTreeMap for players, sorted ids everywhere)
//! - No system time dependencies
//! - All randomness from the seeded LCG
//!
//! Given identical inputs and seed, the host produces identical snapshots.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod client;
pub mod config;

// Re-export commonly used types
pub use crate::core::grid::{Cell, Direction};
pub use crate::core::rng::DeterministicRng;
pub use config::{AppConfig, ConfigError};
pub use game::state::{MatchPhase, MatchState, PlayerId};
pub use game::tick::{tick, MatchConfig};
pub use network::session::{Role, Session, SessionConfig};
pub use network::snapshot::Snapshot;
pub use client::interpolation::{InterpolationConfig, Interpolator};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
