use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{
    KeyColor, KeyTally, Position,
    error::SolverError,
    map::CellCoord,
    maze::{CellCode, FloorState},
    movement::{Direction, MoveResult, classify_move, seam_between},
};

/// Bounds on how much work one search may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    /// Room expansions summed over every nested key trial.
    pub max_expansions: usize,
    /// Maximum number of nested key pickups.
    pub max_depth: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            max_expansions: 200_000,
            max_depth: 32,
        }
    }
}

/// One element of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Waypoint {
    Room(Position),
    /// The key at the previous room was picked up and a door unlocked with it;
    /// the path resumes from that same room.
    KeyPickup,
}

impl Waypoint {
    /// The room of a `Room` waypoint, `None` for the marker.
    pub fn room(self) -> Option<Position> {
        match self {
            Waypoint::Room(position) => Some(position),
            Waypoint::KeyPickup => None,
        }
    }
}

/// A successful search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub waypoints: Vec<Waypoint>,
    /// Carried keys left on the winning branch.
    pub carried: KeyTally,
    /// Rooms expanded over the whole search.
    pub expansions: usize,
}

impl Route {
    /// Rooms visited in order, transition markers left out.
    pub fn rooms(&self) -> impl Iterator<Item = Position> + '_ {
        self.waypoints.iter().filter_map(|waypoint| waypoint.room())
    }

    /// Number of keys picked up along the route.
    pub fn key_pickups(&self) -> usize {
        self.waypoints
            .iter()
            .filter(|waypoint| **waypoint == Waypoint::KeyPickup)
            .count()
    }
}

/// A reversible change made to the floor while trying a key.
#[derive(Debug, Clone, Copy)]
enum Mutation {
    Cell { at: CellCoord, previous: CellCode },
    KeyAvailable { index: usize, previous: bool },
    DoorLocked { index: usize, previous: bool },
}

/// The expansion budget ran out.
struct Exhausted;

struct Found {
    waypoints: Vec<Waypoint>,
    carried: KeyTally,
}

/// Breadth-first search that picks up keys and tries them on every matching
/// locked door, backtracking when a door leads nowhere.
///
/// The search works in place on the floor it is given. Every speculative
/// change is recorded in a journal and unwound to a checkpoint when its key
/// trial fails, so a failed trial leaves the floor exactly as it found it.
/// Doors opened with carried keys outside any trial stay open.
pub struct PathSearch<'a> {
    floor: &'a mut FloorState,
    limits: SearchLimits,
    journal: Vec<Mutation>,
    expansions: usize,
    inconclusive: bool,
}

impl<'a> PathSearch<'a> {
    pub fn new(floor: &'a mut FloorState, limits: SearchLimits) -> Self {
        PathSearch {
            floor,
            limits,
            journal: Vec::new(),
            expansions: 0,
            inconclusive: false,
        }
    }

    /// Finds the first path from `source` to `destination`.
    #[tracing::instrument(level = "debug", skip(self, carried, source, destination), fields(carried = carried.total(), source_x = source.x, source_y = source.y, dest_x = destination.x, dest_y = destination.y))]
    pub fn find(
        &mut self,
        carried: KeyTally,
        source: Position,
        destination: Position,
    ) -> Result<Route, SolverError> {
        self.expansions = 0;
        self.inconclusive = false;

        match self.explore(carried, source, destination, 0) {
            Ok(Some(found)) => {
                debug!(
                    expansions = self.expansions,
                    waypoints = found.waypoints.len(),
                    "Path found"
                );
                Ok(Route {
                    waypoints: found.waypoints,
                    carried: found.carried,
                    expansions: self.expansions,
                })
            }
            Ok(None) if self.inconclusive => {
                warn!(expansions = self.expansions, "Depth limit hit, search inconclusive");
                Err(self.exceeded())
            }
            Ok(None) => {
                debug!(expansions = self.expansions, "No path found");
                Err(SolverError::NoPathFound)
            }
            Err(Exhausted) => {
                warn!(expansions = self.expansions, "Expansion budget spent, search inconclusive");
                Err(self.exceeded())
            }
        }
    }

    fn exceeded(&self) -> SolverError {
        SolverError::SearchDepthExceeded {
            expansions: self.expansions,
            max_expansions: self.limits.max_expansions,
            max_depth: self.limits.max_depth,
        }
    }

    fn explore(
        &mut self,
        mut carried: KeyTally,
        source: Position,
        destination: Position,
        depth: usize,
    ) -> Result<Option<Found>, Exhausted> {
        let mut frontier = VecDeque::from([source]);
        let mut seen: HashSet<Position> = HashSet::from([source]);
        let mut came_from: HashMap<Position, Position> = HashMap::new();

        while let Some(current) = frontier.pop_front() {
            if current == destination {
                return Ok(Some(Found {
                    waypoints: trace_back(&came_from, current),
                    carried,
                }));
            }

            self.expansions += 1;
            if self.expansions > self.limits.max_expansions {
                return Err(Exhausted);
            }

            if let Some(color) = self.floor.room_value(current).and_then(CellCode::key_color) {
                if let Some(rest) = self.try_key(current, color, carried, destination, depth)? {
                    let mut waypoints = trace_back(&came_from, current);
                    waypoints.push(Waypoint::KeyPickup);
                    waypoints.extend(rest.waypoints);
                    return Ok(Some(Found {
                        waypoints,
                        carried: rest.carried,
                    }));
                }
            }

            for direction in Direction::ALL {
                let next = current + direction;
                if seen.contains(&next) {
                    continue;
                }
                match classify_move(&self.floor.grid, current, direction) {
                    MoveResult::Blocked => continue,
                    MoveResult::Free => {}
                    MoveResult::RequiresKey(color) => {
                        if !carried.take(color) {
                            continue;
                        }
                        if let Some(seam) = seam_between(current, direction) {
                            trace!(x = current.x, y = current.y, ?direction, ?color, "Crossing door with carried key");
                            self.set_cell(seam, CellCode::Clear);
                        }
                    }
                }
                seen.insert(next);
                came_from.insert(next, current);
                frontier.push_back(next);
            }
        }

        Ok(None)
    }

    /// Picks up the key at `at` and tries it on each locked door of its color.
    fn try_key(
        &mut self,
        at: Position,
        color: KeyColor,
        carried: KeyTally,
        destination: Position,
        depth: usize,
    ) -> Result<Option<Found>, Exhausted> {
        let Some(key_index) = self
            .floor
            .keys
            .iter()
            .position(|key| key.available && key.color == color && key.position == at)
        else {
            trace!(x = at.x, y = at.y, "Key cell without a matching key item");
            return Ok(None);
        };
        let Some(key_cell) = CellCoord::of_room(at) else {
            return Ok(None);
        };

        for door_index in 0..self.floor.doors.len() {
            let door = &self.floor.doors[door_index];
            if !door.locked || door.color != color {
                continue;
            }
            let seam = door.seam;
            if !self.floor.grid.contains(seam) {
                warn!(x = seam.x, y = seam.y, "Door outside the floor grid, skipping");
                continue;
            }
            if depth >= self.limits.max_depth {
                self.inconclusive = true;
                return Ok(None);
            }

            trace!(key_x = at.x, key_y = at.y, door_x = seam.x, door_y = seam.y, depth, "Trying key on door");
            let checkpoint = self.journal.len();
            self.set_key_available(key_index, false);
            self.set_door_locked(door_index, false);
            self.set_cell(key_cell, CellCode::Clear);
            self.set_cell(seam, CellCode::Clear);

            match self.explore(carried, at, destination, depth + 1) {
                Ok(Some(found)) => return Ok(Some(found)),
                Ok(None) => self.rollback(checkpoint),
                Err(exhausted) => {
                    self.rollback(checkpoint);
                    return Err(exhausted);
                }
            }
        }

        Ok(None)
    }

    fn set_cell(&mut self, at: CellCoord, code: CellCode) {
        let previous = std::mem::replace(&mut self.floor.grid[at], code);
        self.journal.push(Mutation::Cell { at, previous });
    }

    fn set_key_available(&mut self, index: usize, available: bool) {
        let previous = std::mem::replace(&mut self.floor.keys[index].available, available);
        self.journal.push(Mutation::KeyAvailable { index, previous });
    }

    fn set_door_locked(&mut self, index: usize, locked: bool) {
        let previous = std::mem::replace(&mut self.floor.doors[index].locked, locked);
        self.journal.push(Mutation::DoorLocked { index, previous });
    }

    /// Undoes every mutation recorded after `checkpoint`, newest first.
    fn rollback(&mut self, checkpoint: usize) {
        for mutation in self.journal.drain(checkpoint..).rev() {
            match mutation {
                Mutation::Cell { at, previous } => self.floor.grid[at] = previous,
                Mutation::KeyAvailable { index, previous } => {
                    self.floor.keys[index].available = previous
                }
                Mutation::DoorLocked { index, previous } => {
                    self.floor.doors[index].locked = previous
                }
            }
        }
    }
}

fn trace_back(came_from: &HashMap<Position, Position>, mut current: Position) -> Vec<Waypoint> {
    let mut rooms = vec![current];
    while let Some(&previous) = came_from.get(&current) {
        rooms.push(previous);
        current = previous;
    }
    rooms.reverse();
    rooms.into_iter().map(Waypoint::Room).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_floor;

    // Snake corridor with a shortcut between the last two rows.
    const SNAKE: &str = "
        #########
        #S......#
        #######.#
        #.......#
        #.#######
        #.......#
        #.#####.#
        #E......#
        #########
    ";

    // Exit behind door A; key A down a side branch.
    const SIDE_KEY: &str = "
        #######
        #S..AE#
        #.#####
        #.#.#.#
        #.#####
        #a#.#.#
        #######
    ";

    // The first A door opens onto a dead end, the second onto the exit.
    const TWO_DOORS: &str = "
        #######
        #S.aA.#
        ###A###
        #.#..E#
        #######
        #.#.#.#
        #######
    ";

    // Key A and a door to nowhere; the exit is walled in.
    const WALLED_EXIT: &str = "
        #######
        #S.aA.#
        #######
        #.#.#.#
        #######
        #.#.#E#
        #######
    ";

    const CARRIED: &str = "
        #####
        #SAE#
        #####
        #.#.#
        #####
    ";

    fn search(
        text: &str,
        carried: KeyTally,
        limits: SearchLimits,
    ) -> (Result<Route, SolverError>, FloorState) {
        let mut floor = parse_floor(text).unwrap();
        let source = floor.start().unwrap();
        let exit = floor.exit().unwrap();
        let result = PathSearch::new(&mut floor, limits).find(carried, source, exit);
        (result, floor)
    }

    fn rooms(route: &Route) -> Vec<(i32, i32)> {
        route.rooms().map(|p| (p.x, p.y)).collect()
    }

    #[test]
    fn takes_the_shortest_corridor_without_keys() {
        let (route, _) = search(SNAKE, KeyTally::default(), SearchLimits::default());
        let route = route.unwrap();
        assert_eq!(route.key_pickups(), 0);
        assert_eq!(
            rooms(&route),
            vec![
                (0, 0),
                (1, 0),
                (2, 0),
                (3, 0),
                (3, 1),
                (2, 1),
                (1, 1),
                (0, 1),
                (0, 2),
                (0, 3)
            ]
        );
    }

    #[test]
    fn fetches_key_before_crossing_door() {
        let (route, floor) = search(SIDE_KEY, KeyTally::default(), SearchLimits::default());
        let route = route.unwrap();
        let p = |x, y| Waypoint::Room(Position::new(x, y));
        assert_eq!(
            route.waypoints,
            vec![
                p(0, 0),
                p(0, 1),
                p(0, 2),
                Waypoint::KeyPickup,
                p(0, 2),
                p(0, 1),
                p(0, 0),
                p(1, 0),
                p(2, 0)
            ]
        );
        assert_eq!(route.key_pickups(), 1);
        assert!(!floor.keys[0].available);
        assert!(!floor.doors[0].locked);
    }

    #[test]
    fn failed_door_trial_is_rolled_back() {
        let (route, floor) = search(TWO_DOORS, KeyTally::default(), SearchLimits::default());
        let route = route.unwrap();
        assert_eq!(rooms(&route), vec![(0, 0), (1, 0), (1, 0), (1, 1), (2, 1)]);

        assert!(floor.doors[0].locked);
        assert_eq!(floor.grid[CellCoord::new(4, 1)], CellCode::DoorA);
        assert!(!floor.doors[1].locked);
        assert_eq!(floor.grid[CellCoord::new(3, 2)], CellCode::Clear);
        assert_eq!(floor.grid[CellCoord::new(3, 1)], CellCode::Clear);
    }

    #[test]
    fn rejected_trials_leave_floor_untouched() {
        let original = parse_floor(WALLED_EXIT).unwrap();
        let (result, floor) = search(WALLED_EXIT, KeyTally::default(), SearchLimits::default());
        assert_eq!(result, Err(SolverError::NoPathFound));
        assert_eq!(floor, original);
    }

    #[test]
    fn carried_key_opens_door_once() {
        let (route, floor) = search(CARRIED, KeyTally::new(1, 0), SearchLimits::default());
        let route = route.unwrap();
        assert_eq!(rooms(&route), vec![(0, 0), (1, 0)]);
        assert_eq!(route.carried.get(KeyColor::A), 0);
        assert_eq!(floor.grid[CellCoord::new(2, 1)], CellCode::Clear);

        let (result, _) = search(CARRIED, KeyTally::new(0, 1), SearchLimits::default());
        assert_eq!(result, Err(SolverError::NoPathFound));
    }

    #[test]
    fn expansion_budget_reports_inconclusive() {
        let limits = SearchLimits {
            max_expansions: 2,
            ..SearchLimits::default()
        };
        let (result, _) = search(SNAKE, KeyTally::default(), limits);
        assert!(matches!(
            result,
            Err(SolverError::SearchDepthExceeded {
                max_expansions: 2,
                ..
            })
        ));
    }

    #[test]
    fn depth_limit_abandons_key_trials() {
        let limits = SearchLimits {
            max_depth: 0,
            ..SearchLimits::default()
        };
        let original = parse_floor(SIDE_KEY).unwrap();
        let (result, floor) = search(SIDE_KEY, KeyTally::default(), limits);
        assert!(matches!(result, Err(SolverError::SearchDepthExceeded { max_depth: 0, .. })));
        assert_eq!(floor, original);
    }
}
