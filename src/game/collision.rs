//! Collision Detection
//!
//! Deterministic collision resolution for the snakes that moved in one
//! sub-step. Every check reads the post-move state of all snakes, so deaths
//! within a sub-step are simultaneous: a snake killed here still blocks the
//! others until the deaths are applied.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::grid::Cell;
use crate::game::events::DeathCause;
use crate::game::state::{MatchState, PlayerId, PlayerRuntime};
use crate::game::tick::MatchConfig;

/// How heads that enter the same cell on the same sub-step are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadToHeadPolicy {
    /// A uniquely longest snake survives; anyone matched or beaten in length dies.
    #[default]
    LongerSurvives,
    /// Every colliding snake dies.
    AllDie,
}

/// A death decided during collision resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Death {
    /// Dying player
    pub victim: PlayerId,
    /// What killed it
    pub cause: DeathCause,
    /// Owner of the body or head that was hit, if any
    pub killer: Option<PlayerId>,
}

/// Resolve collisions for the players that moved this sub-step.
///
/// `movers` must be sorted and contain only living players. Returns at most
/// one death per victim, in id order.
pub fn resolve_substep(state: &MatchState, movers: &[PlayerId], config: &MatchConfig) -> Vec<Death> {
    let mut deaths: BTreeMap<PlayerId, Death> = BTreeMap::new();

    for id in movers {
        let Some(player) = state.players.get(id) else { continue };
        if let Some(death) = check_mover(state, player, movers, config) {
            deaths.insert(*id, death);
        }
    }

    for death in resolve_head_to_head(state, movers, config.head_to_head) {
        deaths.entry(death.victim).or_insert(death);
    }

    deaths.into_values().collect()
}

/// Wall, self and body checks for one mover.
fn check_mover(
    state: &MatchState,
    player: &PlayerRuntime,
    movers: &[PlayerId],
    config: &MatchConfig,
) -> Option<Death> {
    let snake = player.snake.as_ref()?;
    let head = snake.head();

    // Walls are lethal even with GHOST
    if !head.in_bounds(config.cols, config.rows) {
        return Some(Death { victim: player.id, cause: DeathCause::Wall, killer: None });
    }

    if player.has_ghost(state.tick) {
        return None;
    }

    if snake.body_contains(head) {
        return Some(Death { victim: player.id, cause: DeathCause::SelfCollision, killer: None });
    }

    for other in state.players.values() {
        if other.id == player.id || !other.alive {
            continue;
        }
        let Some(other_snake) = other.snake.as_ref() else { continue };
        // A moved head is resolved head-to-head, not as a body hit
        let hit = if movers.binary_search(&other.id).is_ok() {
            other_snake.body_contains(head)
        } else {
            other_snake.contains(head)
        };
        if hit {
            return Some(Death { victim: player.id, cause: DeathCause::Body, killer: Some(other.id) });
        }
    }

    None
}

/// Group movers by head cell and apply the head-to-head policy.
fn resolve_head_to_head(state: &MatchState, movers: &[PlayerId], policy: HeadToHeadPolicy) -> Vec<Death> {
    let mut groups: BTreeMap<Cell, Vec<&PlayerRuntime>> = BTreeMap::new();
    for id in movers {
        let Some(player) = state.players.get(id) else { continue };
        if let Some(snake) = player.snake.as_ref() {
            groups.entry(snake.head()).or_default().push(player);
        }
    }

    let mut deaths = Vec::new();
    for group in groups.values().filter(|g| g.len() > 1) {
        for member in group {
            if member.has_ghost(state.tick) {
                continue;
            }
            let rival = group
                .iter()
                .filter(|o| o.id != member.id)
                .filter(|o| match policy {
                    HeadToHeadPolicy::AllDie => true,
                    HeadToHeadPolicy::LongerSurvives => o.length() >= member.length(),
                })
                .map(|o| o.id)
                .next();
            if let Some(killer) = rival {
                deaths.push(Death { victim: member.id, cause: DeathCause::HeadToHead, killer: Some(killer) });
            }
        }
    }
    deaths
}

// =============================================================================
// TESTS
// =============================================================================
