//! Application Configuration
//!
//! One JSON document carrying the match rules, session settings and client
//! interpolation tuning. Every section and every field is optional; missing
//! values fall back to their defaults.
//!
//! ```json
//! {
//!   "game": { "cols": 40, "rows": 30, "tick_ms": 100 },
//!   "session": { "countdown_secs": 5 },
//!   "interpolation": { "remote_delay_ms": 200.0 }
//! }
//! ```

use std::path::Path;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::client::interpolation::InterpolationConfig;
use crate::game::tick::MatchConfig;
use crate::network::session::SessionConfig;

/// Configuration load errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a valid config document.
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Everything the binary can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Match rules
    pub game: MatchConfig,
    /// Lobby and broadcast settings
    pub session: SessionConfig,
    /// Client rendering delays
    pub interpolation: InterpolationConfig,
}

impl AppConfig {
    /// Read a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a config document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}
