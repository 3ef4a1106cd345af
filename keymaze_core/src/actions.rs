use std::collections::HashSet;

use crate::{
    map::{CellCoord, Grid},
    maze::CellCode,
    movement::{Direction, MoveResult, classify_move, seam_between},
    search::Waypoint,
};

/// Turns a path into the steps the agent has to take.
///
/// `grid` must be the floor as the game sees it, with doors still in place.
/// Crossing a locked door takes two steps: the first one unlocks it and the
/// second walks through. A door is only doubled the first time it is crossed.
pub fn path_to_actions(grid: &Grid<CellCode>, waypoints: &[Waypoint]) -> Vec<Direction> {
    let mut steps = Vec::with_capacity(waypoints.len());
    let mut opened: HashSet<CellCoord> = HashSet::new();

    for pair in waypoints.windows(2) {
        let (Waypoint::Room(from), Waypoint::Room(to)) = (pair[0], pair[1]) else {
            continue;
        };
        let Some(direction) = Direction::between(from, to) else {
            tracing::warn!(
                from_x = from.x,
                from_y = from.y,
                to_x = to.x,
                to_y = to.y,
                "Path rooms are not adjacent, dropping step"
            );
            continue;
        };

        steps.push(direction);
        if let MoveResult::RequiresKey(_) = classify_move(grid, from, direction) {
            if let Some(seam) = seam_between(from, direction) {
                if opened.insert(seam) {
                    steps.push(direction);
                }
            }
        }
    }

    steps
}
