use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::{
    KeyColor, KeyTally, Position,
    error::SolverError,
    maze::{FloorState, KeyItem, MazeSnapshot},
    movement::{Direction, MoveResult, classify_move},
};

/// How door seams are treated while flooding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoorPolicy {
    /// Doors are crossed and counted as a required key.
    #[default]
    Counting,
    /// Doors stop the flood.
    Blocking,
}

/// Best route found so far to one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellInfo {
    pub distance: u32,
    pub required: KeyTally,
    /// Neighbor one step closer to the flood source. `None` at the source.
    pub previous: Option<Position>,
}

/// A key room reached through a free move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeySighting {
    pub color: KeyColor,
    pub position: Position,
}

/// What the agent should do next according to the flood map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advice {
    AtExit,
    /// No key is needed between the agent and the exit.
    Proceed(Direction),
    /// These keys have to be fetched first.
    FetchKeys(Vec<KeyItem>),
    Unreachable,
}

/// Distance and key requirements from every reachable room to one source.
#[derive(Debug, Clone)]
pub struct FloodFill {
    source: Position,
    cells: HashMap<Position, CellInfo>,
    sightings: BTreeSet<KeySighting>,
}

impl FloodFill {
    /// Floods `floor` outward from `source`.
    ///
    /// A cell's entry is replaced only by a strictly shorter route, so the
    /// required keys are those of the first shortest route discovered.
    pub fn run(floor: &FloorState, source: Position, policy: DoorPolicy) -> Self {
        let mut cells = HashMap::new();
        let mut sightings = BTreeSet::new();
        let mut queue = VecDeque::new();

        let origin = CellInfo {
            distance: 0,
            required: KeyTally::default(),
            previous: None,
        };
        cells.insert(source, origin.clone());
        queue.push_back((source, origin));

        while let Some((current, info)) = queue.pop_front() {
            for direction in Direction::ALL {
                let next = current + direction;
                let mut required = info.required;
                match classify_move(&floor.grid, current, direction) {
                    MoveResult::Blocked => continue,
                    MoveResult::RequiresKey(color) => {
                        if policy == DoorPolicy::Blocking {
                            continue;
                        }
                        required.add(color, 1);
                    }
                    MoveResult::Free => {
                        if let Some(color) = floor.room_value(next).and_then(|code| code.key_color()) {
                            sightings.insert(KeySighting {
                                color,
                                position: next,
                            });
                        }
                    }
                }

                let candidate = CellInfo {
                    distance: info.distance + 1,
                    required,
                    previous: Some(current),
                };
                let better = cells
                    .get(&next)
                    .is_none_or(|known: &CellInfo| candidate.distance < known.distance);
                if better {
                    cells.insert(next, candidate.clone());
                    queue.push_back((next, candidate));
                }
            }
        }

        tracing::debug!(
            source_x = source.x,
            source_y = source.y,
            reached = cells.len(),
            keys = sightings.len(),
            "Flood fill done"
        );
        FloodFill {
            source,
            cells,
            sightings,
        }
    }

    /// Floods from the exit of the snapshot's current floor.
    pub fn toward_exit(snapshot: &MazeSnapshot, policy: DoorPolicy) -> Result<Self, SolverError> {
        let exit = snapshot.validate()?;
        Ok(Self::run(snapshot.floor()?, exit, policy))
    }

    /// The room the flood started from.
    pub fn source(&self) -> Position {
        self.source
    }

    /// Best known route from `position`, `None` if the flood never got there.
    pub fn get(&self, position: Position) -> Option<&CellInfo> {
        self.cells.get(&position)
    }

    /// Number of rooms reached, the source included.
    pub fn reached(&self) -> usize {
        self.cells.len()
    }

    /// Key rooms seen on the way, sorted by color then position.
    pub fn key_sightings(&self) -> impl Iterator<Item = &KeySighting> {
        self.sightings.iter()
    }

    /// Rooms from `from` back to the flood source, both included.
    pub fn trace(&self, from: Position) -> Option<Vec<Position>> {
        let mut info = self.cells.get(&from)?;
        let mut path = vec![from];
        while let Some(previous) = info.previous {
            path.push(previous);
            info = self.cells.get(&previous)?;
        }
        Some(path)
    }

    /// Picks, per required color, the first available keys of that color up
    /// to the required quantity.
    pub fn keys_to_fetch(required: &KeyTally, items: &[KeyItem]) -> Vec<KeyItem> {
        let mut requests = Vec::new();
        for (color, quantity) in required.iter() {
            requests.extend(
                items
                    .iter()
                    .filter(|item| item.available && item.color == color)
                    .take(quantity as usize)
                    .cloned(),
            );
        }
        requests
    }

    /// Recommends the agent's next move from a flood of its current floor.
    pub fn advise(snapshot: &MazeSnapshot) -> Result<Advice, SolverError> {
        let flood = Self::toward_exit(snapshot, DoorPolicy::Counting)?;
        let agent = snapshot.agent.position;
        if agent == flood.source {
            return Ok(Advice::AtExit);
        }
        let Some(info) = flood.get(agent) else {
            return Ok(Advice::Unreachable);
        };
        let mut missing = info.required;
        for (color, carried) in snapshot.agent.carried_keys().iter() {
            for _ in 0..carried {
                missing.take(color);
            }
        }
        if missing.is_empty() {
            return Ok(info
                .previous
                .and_then(|next| Direction::between(agent, next))
                .map_or(Advice::Unreachable, Advice::Proceed));
        }
        Ok(Advice::FetchKeys(Self::keys_to_fetch(
            &missing,
            &snapshot.floor()?.keys,
        )))
    }
}
