use std::ops::Add;

use serde::{Deserialize, Serialize};

pub mod actions;
pub mod environment;
pub mod error;
pub mod flood;
pub mod loader;
pub mod map;
pub mod maze;
pub mod movement;
pub mod search;
pub mod session;

pub use error::{SnapshotError, SolverError};
pub use movement::Direction;
pub use session::SolverSession;

/// A room coordinate on one floor (column `x`, row `y`).
///
/// Row 0 is the top row of the floor. Coordinates are signed so that deltas
/// and out-of-range neighbors can be represented without wrapping.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Position { x, y }
    }
}

impl Add<Direction> for Position {
    type Output = Position;

    fn add(self, direction: Direction) -> Position {
        let (dx, dy) = direction.delta();
        Position {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// The two key colors. A door of a color only opens for a key of that color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyColor {
    A,
    B,
}

impl KeyColor {
    pub const ALL: [KeyColor; 2] = [KeyColor::A, KeyColor::B];

    /// Name of the consumable under which carried keys of this color are counted.
    pub fn item_name(self) -> &'static str {
        match self {
            KeyColor::A => "key_a",
            KeyColor::B => "key_b",
        }
    }

    fn slot(self) -> usize {
        match self {
            KeyColor::A => 0,
            KeyColor::B => 1,
        }
    }
}

/// A count of keys per color.
///
/// Used for keys the agent carries and for the keys a route requires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyTally {
    counts: [u32; 2],
}

impl KeyTally {
    /// A tally holding `a` keys of color A and `b` of color B.
    pub fn new(a: u32, b: u32) -> Self {
        KeyTally { counts: [a, b] }
    }

    /// Number of keys of `color`.
    pub fn get(&self, color: KeyColor) -> u32 {
        self.counts[color.slot()]
    }

    /// Adds `quantity` keys of `color`.
    pub fn add(&mut self, color: KeyColor, quantity: u32) {
        self.counts[color.slot()] += quantity;
    }

    /// Removes one key of `color`. Returns `false` when none is left.
    pub fn take(&mut self, color: KeyColor) -> bool {
        let count = &mut self.counts[color.slot()];
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&count| count == 0)
    }

    /// Keys of every color together.
    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Iterates over the colors with a non-zero count.
    pub fn iter(&self) -> impl Iterator<Item = (KeyColor, u32)> + '_ {
        KeyColor::ALL
            .into_iter()
            .map(|color| (color, self.get(color)))
            .filter(|&(_, count)| count > 0)
    }
}

/// The decision handed back to the controller for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Wait,
    Move { dx: i32, dy: i32 },
}

impl From<Direction> for Action {
    fn from(direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Action::Move { dx, dy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_take_stops_at_zero() {
        let mut tally = KeyTally::new(1, 0);
        assert!(tally.take(KeyColor::A));
        assert!(!tally.take(KeyColor::A));
        assert!(!tally.take(KeyColor::B));
        assert!(tally.is_empty());
    }

    #[test]
    fn tally_iterates_only_non_zero_colors() {
        let mut tally = KeyTally::default();
        tally.add(KeyColor::B, 2);
        assert_eq!(tally.iter().collect::<Vec<_>>(), vec![(KeyColor::B, 2)]);
        assert_eq!(tally.total(), 2);
    }

    #[test]
    fn colors_count_separately() {
        let mut tally = KeyTally::new(1, 0);
        tally.add(KeyColor::B, 3);
        assert_eq!(tally.get(KeyColor::A), 1);
        assert_eq!(tally.get(KeyColor::B), 3);
        assert!(tally.take(KeyColor::B));
        assert_eq!(tally, KeyTally::new(1, 2));
    }

    #[test]
    fn direction_converts_to_unit_move() {
        assert_eq!(Action::from(Direction::Up), Action::Move { dx: 0, dy: -1 });
        assert_eq!(Position::new(2, 2) + Direction::Right, Position::new(3, 2));
    }
}
