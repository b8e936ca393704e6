//! Snake Entity
//!
//! Pure data and pure transitions, no I/O.

use serde::{Serialize, Deserialize};

use crate::core::grid::{Cell, Direction};

/// Default minimum snake length.
pub const DEFAULT_MIN_LEN: usize = 2;

/// An ordered list of cells, head first.
///
/// Direction changes are buffered in `next_direction` and committed by
/// [`Snake::step`], so two turns inside one tick can never fold the snake back
/// onto itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snake {
    segments: Vec<Cell>,
    direction: Direction,
    next_direction: Direction,
}

impl Snake {
    /// Create a snake from head-first segments.
    ///
    /// Returns `None` for an empty segment list.
    pub fn new(segments: Vec<Cell>, direction: Direction) -> Option<Self> {
        if segments.is_empty() {
            return None;
        }
        Some(Self {
            segments,
            direction,
            next_direction: direction,
        })
    }

    /// A straight snake of `len` cells whose head is at `head`, trailing
    /// behind it opposite to `direction`.
    pub fn straight(head: Cell, direction: Direction, len: usize) -> Self {
        let back = direction.opposite();
        let mut segments = Vec::with_capacity(len.max(1));
        let mut cell = head;
        segments.push(cell);
        for _ in 1..len {
            cell = cell.offset(back);
            segments.push(cell);
        }
        Self {
            segments,
            direction,
            next_direction: direction,
        }
    }

    /// Head cell.
    #[inline]
    pub fn head(&self) -> Cell {
        self.segments[0]
    }

    /// Tail cell.
    #[inline]
    pub fn tail(&self) -> Cell {
        self.segments[self.segments.len() - 1]
    }

    /// All segments, head first.
    #[inline]
    pub fn segments(&self) -> &[Cell] {
        &self.segments
    }

    /// Segment count.
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Never true for a constructed snake.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Direction used by the last step.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Direction the next step will use.
    #[inline]
    pub fn next_direction(&self) -> Direction {
        self.next_direction
    }

    /// Buffer a turn. The exact reverse of the current direction is ignored.
    ///
    /// Returns whether the request was accepted.
    pub fn set_direction(&mut self, dir: Direction) -> bool {
        if dir == self.direction.opposite() {
            return false;
        }
        self.next_direction = dir;
        true
    }

    /// Commit the buffered direction and advance one cell, keeping length.
    ///
    /// Returns the new head.
    pub fn step(&mut self) -> Cell {
        self.direction = self.next_direction;
        let new_head = self.head().offset(self.direction);
        self.segments.insert(0, new_head);
        self.segments.pop();
        new_head
    }

    /// Duplicate the tail cell. The copy separates on the next step.
    pub fn grow(&mut self) {
        let tail = self.tail();
        self.segments.push(tail);
    }

    /// Drop `amount` cells from the tail, never going below `min_len`.
    pub fn shrink(&mut self, amount: usize, min_len: usize) {
        let target = self.segments.len().saturating_sub(amount).max(min_len.max(1));
        if target < self.segments.len() {
            self.segments.truncate(target);
        }
    }

    /// Whether `cell` is covered by any non-head segment.
    pub fn body_contains(&self, cell: Cell) -> bool {
        self.segments[1..].contains(&cell)
    }

    /// Whether `cell` is covered by any segment.
    pub fn contains(&self, cell: Cell) -> bool {
        self.segments.contains(&cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snake_right() -> Snake {
        Snake::straight(Cell::new(5, 5), Direction::Right, 3)
    }

    #[test]
    fn test_straight_layout() {
        let snake = snake_right();
        assert_eq!(
            snake.segments(),
            &[Cell::new(5, 5), Cell::new(4, 5), Cell::new(3, 5)]
        );
        assert_eq!(snake.direction(), Direction::Right);
    }

    #[test]
    fn test_step_keeps_length() {
        let mut snake = snake_right();
        let head = snake.step();
        assert_eq!(head, Cell::new(6, 5));
        assert_eq!(snake.len(), 3);
        assert_eq!(snake.tail(), Cell::new(4, 5));
    }

    #[test]
    fn test_reverse_rejected() {
        let mut snake = snake_right();
        snake.step();
        assert!(!snake.set_direction(Direction::Left));
        assert_eq!(snake.direction(), Direction::Right);
        assert_eq!(snake.next_direction(), Direction::Right);
    }

    #[test]
    fn test_turn_is_buffered_until_step() {
        let mut snake = snake_right();
        assert!(snake.set_direction(Direction::Up));
        assert_eq!(snake.direction(), Direction::Right);

        // Still judged against the committed direction: Left is a reverse.
        assert!(!snake.set_direction(Direction::Left));

        snake.step();
        assert_eq!(snake.direction(), Direction::Up);
        assert_eq!(snake.head(), Cell::new(5, 4));
    }

    #[test]
    fn test_grow_duplicates_tail() {
        let mut snake = snake_right();
        snake.grow();
        assert_eq!(snake.len(), 4);
        assert_eq!(snake.segments()[2], snake.segments()[3]);

        snake.step();
        assert_eq!(snake.len(), 4);
        assert_eq!(snake.tail(), Cell::new(3, 5));
    }

    #[test]
    fn test_shrink_respects_min_len() {
        let mut snake = Snake::straight(Cell::new(10, 5), Direction::Right, 6);
        snake.shrink(3, 2);
        assert_eq!(snake.len(), 3);
        snake.shrink(3, 2);
        assert_eq!(snake.len(), 2);
        snake.shrink(10, 2);
        assert_eq!(snake.len(), 2);
    }

    #[test]
    fn test_body_contains_excludes_head() {
        let snake = snake_right();
        assert!(!snake.body_contains(Cell::new(5, 5)));
        assert!(snake.body_contains(Cell::new(4, 5)));
        assert!(snake.contains(Cell::new(5, 5)));
    }

    proptest! {
        #[test]
        fn prop_reverse_never_applies(turns in proptest::collection::vec(0usize..4, 1..64)) {
            let mut snake = Snake::straight(Cell::new(50, 50), Direction::Right, 4);
            for t in turns {
                let before = snake.direction();
                let requested = Direction::ALL[t];
                snake.set_direction(requested);
                if requested == before.opposite() {
                    prop_assert_ne!(snake.next_direction(), requested);
                }
                snake.step();
                prop_assert_ne!(snake.direction(), before.opposite());
            }
        }

        #[test]
        fn prop_length_non_decreasing_without_shrink(ops in proptest::collection::vec(any::<bool>(), 1..64)) {
            let mut snake = Snake::straight(Cell::new(50, 50), Direction::Down, 2);
            let mut last = snake.len();
            for grow in ops {
                if grow {
                    snake.grow();
                }
                snake.step();
                prop_assert!(snake.len() >= last);
                last = snake.len();
            }
        }
    }
}
