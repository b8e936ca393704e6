//! Pickups
//!
//! Food and power-up consumption, effect activation and board
//! replenishment. Both pickup kinds are kept at a fixed count on the board.

use tracing::debug;

use crate::core::grid::OccupancyIndex;
use crate::game::events::GameEvent;
use crate::game::spawn::random_free_cell;
use crate::game::state::{MatchState, PlayerId, PowerUp, PowerUpKind};
use crate::game::tick::MatchConfig;

/// Resolve pickups at the head cell of every surviving mover, in id order.
///
/// A head cell holds at most one pickup, so a power-up and a food are never
/// consumed together.
pub fn resolve_pickups(state: &mut MatchState, movers: &[PlayerId], config: &MatchConfig) {
    let mut consumed = false;

    for id in movers {
        let Some(head) = state
            .players
            .get(id)
            .filter(|p| p.alive)
            .and_then(|p| p.snake.as_ref())
            .map(|s| s.head())
        else {
            continue;
        };

        if let Some(kind) = state.world.take_power_up(head) {
            activate_power_up(state, *id, kind, config);
            state.push_event(GameEvent::power_up_collected(state.tick, *id, kind, head));
            consumed = true;
        } else if state.world.take_food(head) {
            let new_score = match state.players.get_mut(id) {
                Some(player) => {
                    if let Some(snake) = player.snake.as_mut() {
                        snake.grow();
                    }
                    player.score += config.food_score;
                    player.foods_eaten += 1;
                    player.score
                }
                None => continue,
            };
            debug!(player = %id.short(), score = new_score, "Food eaten");
            state.push_event(GameEvent::food_eaten(state.tick, *id, head, new_score));
            consumed = true;
        }
    }

    if consumed {
        replenish(state, config);
    }
}

/// Apply a power-up's effect for `picker`.
///
/// Expiry is `tick + ceil(duration / tick_ms)`; picking the same kind again
/// replaces the expiry rather than extending it.
pub fn activate_power_up(state: &mut MatchState, picker: PlayerId, kind: PowerUpKind, config: &MatchConfig) {
    let until = state.tick + config.effect_ticks();
    match kind {
        PowerUpKind::Speed => {
            if let Some(p) = state.players.get_mut(&picker) {
                p.speed_until = until;
            }
        }
        PowerUpKind::Slow => {
            for p in state.players.values_mut() {
                if p.id != picker && p.alive {
                    p.slow_until = until;
                }
            }
        }
        PowerUpKind::Ghost => {
            if let Some(p) = state.players.get_mut(&picker) {
                p.ghost_until = until;
            }
        }
        PowerUpKind::Shrink => {
            if let Some(snake) = state.players.get_mut(&picker).and_then(|p| p.snake.as_mut()) {
                snake.shrink(config.shrink_amount, config.min_length);
            }
        }
    }
    debug!(player = %picker.short(), ?kind, until, "Power-up activated");
}

/// Top up food and power-ups to their configured counts.
///
/// Occupancy is rebuilt once and updated as each pickup is placed. A full
/// board leaves the count short; it is retried on the next replenish.
pub fn replenish(state: &mut MatchState, config: &MatchConfig) {
    let mut occupancy: OccupancyIndex = state.occupancy();

    while state.world.foods.len() < config.food_count {
        let Some(cell) = random_free_cell(&occupancy, config.cols, config.rows, &mut state.rng) else {
            break;
        };
        occupancy.insert(cell);
        state.world.foods.push(cell);
    }

    while state.world.power_ups.len() < config.power_up_count {
        let Some(cell) = random_free_cell(&occupancy, config.cols, config.rows, &mut state.rng) else {
            break;
        };
        let kind = *state.rng.pick_from(&PowerUpKind::ALL).unwrap_or(&PowerUpKind::Speed);
        occupancy.insert(cell);
        state.world.power_ups.push(PowerUp { kind, cell });
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::{Cell, Direction};
    use crate::game::snake::Snake;

    fn setup() -> (MatchState, PlayerId, PlayerId, MatchConfig) {
        let config = MatchConfig::default();
        let mut state = MatchState::new(7);
        let a = PlayerId::new([1; 16]);
        let b = PlayerId::new([2; 16]);
        state.add_player(a, "a", 0);
        state.add_player(b, "b", 1);
        state.get_player_mut(&a).unwrap().revive(Snake::straight(Cell::new(5, 5), Direction::Right, 2));
        state.get_player_mut(&b).unwrap().revive(Snake::straight(Cell::new(15, 15), Direction::Left, 2));
        state.tick = 10;
        (state, a, b, config)
    }

    #[test]
    fn test_food_grows_and_scores() {
        let (mut state, a, _, config) = setup();
        state.world.foods.push(Cell::new(5, 5));

        resolve_pickups(&mut state, &[a], &config);

        let p = &state.players[&a];
        assert_eq!(p.score, 10);
        assert_eq!(p.length(), 3);
        assert_eq!(state.world.foods.len(), config.food_count);
        assert!(!state.world.foods.contains(&Cell::new(5, 5)));
        assert_eq!(state.world.power_ups.len(), config.power_up_count);
    }

    #[test]
    fn test_effect_expiry_rounds_up() {
        let (mut state, a, _, _) = setup();
        let config = MatchConfig { tick_ms: 300, effect_duration_ms: 1000, ..MatchConfig::default() };
        activate_power_up(&mut state, a, PowerUpKind::Speed, &config);
        // ceil(1000 / 300) = 4
        assert_eq!(state.players[&a].speed_until, 14);
    }

    #[test]
    fn test_reactivation_refreshes_not_stacks() {
        let (mut state, a, _, config) = setup();
        activate_power_up(&mut state, a, PowerUpKind::Ghost, &config);
        let first = state.players[&a].ghost_until;
        state.tick += 5;
        activate_power_up(&mut state, a, PowerUpKind::Ghost, &config);
        assert_eq!(state.players[&a].ghost_until, first + 5);
    }

    #[test]
    fn test_slow_hits_everyone_but_picker() {
        let (mut state, a, b, config) = setup();
        activate_power_up(&mut state, a, PowerUpKind::Slow, &config);
        assert_eq!(state.players[&a].slow_until, 0);
        assert!(state.players[&b].has_slow(state.tick));
    }

    #[test]
    fn test_shrink_truncates_picker() {
        let (mut state, a, _, config) = setup();
        state.get_player_mut(&a).unwrap().revive(Snake::straight(Cell::new(10, 5), Direction::Right, 7));
        activate_power_up(&mut state, a, PowerUpKind::Shrink, &config);
        assert_eq!(state.players[&a].length(), 4);
        activate_power_up(&mut state, a, PowerUpKind::Shrink, &config);
        assert_eq!(state.players[&a].length(), config.min_length);
    }

    #[test]
    fn test_power_up_consumed_and_replaced() {
        let (mut state, a, _, config) = setup();
        state.world.power_ups.push(PowerUp { kind: PowerUpKind::Speed, cell: Cell::new(5, 5) });

        resolve_pickups(&mut state, &[a], &config);

        assert!(state.players[&a].has_speed(state.tick));
        assert_eq!(state.world.power_ups.len(), config.power_up_count);
        let events = state.take_events();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_replenish_never_overlaps() {
        let (mut state, _, _, config) = setup();
        replenish(&mut state, &config);
        let occupied: Vec<Cell> = state
            .players
            .values()
            .flat_map(|p| p.segments().to_vec())
            .collect();
        for food in &state.world.foods {
            assert!(!occupied.contains(food));
        }
        for pu in &state.world.power_ups {
            assert!(!occupied.contains(&pu.cell));
            assert!(!state.world.foods.contains(&pu.cell));
        }
    }
}
