use serde::{Deserialize, Serialize};

use crate::{
    KeyColor, Position,
    map::{CellCoord, Grid},
    maze::CellCode,
};

/// One of the four unit steps between adjacent rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Evaluation order used by every search. Changing it changes which path wins.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Returns `(dx, dy)`; up is toward row 0.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Accepts only unit vectors.
    pub fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx, dy) {
            (0, -1) => Some(Direction::Up),
            (0, 1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            (1, 0) => Some(Direction::Right),
            _ => None,
        }
    }

    /// The direction leading from `from` to the adjacent room `to`.
    pub fn between(from: Position, to: Position) -> Option<Self> {
        Self::from_delta(to.x - from.x, to.y - from.y)
    }
}

/// Outcome of trying to step from one room to a neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    Blocked,
    Free,
    RequiresKey(KeyColor),
}

/// Number of rooms along one side of a floor whose cell grid is `grid`.
pub fn room_span(grid: &Grid<CellCode>) -> usize {
    grid.width().saturating_sub(1) / 2
}

/// Whether `position` is a room of the floor.
pub fn in_bounds(grid: &Grid<CellCode>, position: Position) -> bool {
    let span = room_span(grid) as i32;
    (0..span).contains(&position.x) && (0..span).contains(&position.y)
}

/// Address of the seam cell crossed when stepping from `position` in `direction`.
///
/// Horizontal steps cross column `2x` (left) or `2x + 2` (right) on row `2y + 1`;
/// vertical steps mirror that on the other axis. Returns `None` when the seam
/// would have a negative coordinate.
pub fn seam_between(position: Position, direction: Direction) -> Option<CellCoord> {
    let (dx, dy) = direction.delta();
    let (x, y) = if dx != 0 {
        (2 * position.x + if dx == 1 { 2 } else { 0 }, 2 * position.y + 1)
    } else {
        (2 * position.x + 1, 2 * position.y + if dy == 1 { 2 } else { 0 })
    };
    Some(CellCoord::new(
        usize::try_from(x).ok()?,
        usize::try_from(y).ok()?,
    ))
}

/// Code stored in the room cell at `position`, `None` outside the floor.
pub fn room_value(grid: &Grid<CellCode>, position: Position) -> Option<CellCode> {
    if !in_bounds(grid, position) {
        return None;
    }
    CellCoord::of_room(position).and_then(|cell| grid.get(cell).copied())
}

/// Classifies the step from `position` in `direction`.
///
/// Steps leaving the floor are blocked. Otherwise the seam decides: a clear
/// seam is free, a door needs a key of its color, anything else is a wall.
pub fn classify_move(grid: &Grid<CellCode>, position: Position, direction: Direction) -> MoveResult {
    if !in_bounds(grid, position) || !in_bounds(grid, position + direction) {
        return MoveResult::Blocked;
    }
    let Some(seam) = seam_between(position, direction) else {
        return MoveResult::Blocked;
    };
    match grid.get(seam) {
        Some(CellCode::Clear) => MoveResult::Free,
        Some(CellCode::DoorA) => MoveResult::RequiresKey(KeyColor::A),
        Some(CellCode::DoorB) => MoveResult::RequiresKey(KeyColor::B),
        _ => MoveResult::Blocked,
    }
}
