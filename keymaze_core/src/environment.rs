use crate::{
    Action, KeyColor, Position,
    loader::{MapError, parse_maze},
    map::CellCoord,
    maze::{CellCode, MazeSnapshot},
    movement::{Direction, MoveResult, classify_move, seam_between},
};

/// Represents the outcome of applying one action to the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Waited,
    Moved(Position),
    /// A carried key was spent on the door ahead; the agent did not move.
    Unlocked(KeyColor),
    PickedUp(KeyColor),
    /// The exit was reached and the agent now stands on the next floor.
    FloorChanged(usize),
    Won,
    Failure(String),
}

/// A minimal world that applies actions with the game's rules.
///
/// Moving through a clear seam moves the agent. Moving into a door while
/// carrying its key spends the key and opens the door in place. Entering a
/// key room picks the key up, entering the exit leads to the next floor or
/// wins the maze.
#[derive(Debug, Clone)]
pub struct Environment {
    snapshot: MazeSnapshot,
    turns: usize,
}

impl Environment {
    pub fn new(snapshot: MazeSnapshot) -> Self {
        Environment { snapshot, turns: 0 }
    }

    /// Loads an environment from the text map format.
    pub fn from_map(text: &str) -> Result<Self, MapError> {
        Ok(Self::new(parse_maze(text)?))
    }

    pub fn snapshot(&self) -> &MazeSnapshot {
        &self.snapshot
    }

    pub fn turns(&self) -> usize {
        self.turns
    }

    pub fn is_won(&self) -> bool {
        self.snapshot.is_won
    }

    /// Applies a single action for the agent.
    pub fn apply(&mut self, action: Action) -> ActionResult {
        if self.snapshot.is_won {
            return ActionResult::Failure("Maze is already solved.".to_string());
        }
        self.turns += 1;

        let (dx, dy) = match action {
            Action::Wait => return ActionResult::Waited,
            Action::Move { dx, dy } => (dx, dy),
        };
        let Some(direction) = Direction::from_delta(dx, dy) else {
            return ActionResult::Failure(format!("Move ({dx}, {dy}) is not a unit step."));
        };
        self.step(direction)
    }

    fn step(&mut self, direction: Direction) -> ActionResult {
        let floor_index = self.snapshot.current_floor;
        let floor_count = self.snapshot.floors.len();
        let Some(floor) = self.snapshot.floors.get_mut(floor_index) else {
            return ActionResult::Failure(format!(
                "Floor {floor_index} does not exist ({floor_count} floors)."
            ));
        };
        let agent = &mut self.snapshot.agent;
        let current = agent.position;

        match classify_move(&floor.grid, current, direction) {
            MoveResult::Blocked => ActionResult::Failure("Cannot move into a wall.".to_string()),
            MoveResult::RequiresKey(color) => {
                let Some(seam) = seam_between(current, direction) else {
                    return ActionResult::Failure("Door seam outside the floor.".to_string());
                };
                if !agent.spend_key(color) {
                    return ActionResult::Failure(format!(
                        "Agent lacks the required key: {color:?}."
                    ));
                }
                floor.grid[seam] = CellCode::Clear;
                if let Some(door) = floor.doors.iter_mut().find(|door| door.seam == seam) {
                    door.locked = false;
                }
                tracing::debug!(x = seam.x, y = seam.y, ?color, "Door unlocked");
                ActionResult::Unlocked(color)
            }
            MoveResult::Free => {
                let next = current + direction;
                agent.position = next;
                match floor.room_value(next) {
                    Some(CellCode::End) => self.leave_floor(),
                    Some(code) => match code.key_color() {
                        Some(color) => {
                            if let Some(key) = floor
                                .keys
                                .iter_mut()
                                .find(|key| key.available && key.position == next)
                            {
                                key.available = false;
                            }
                            if let Some(cell) = CellCoord::of_room(next) {
                                floor.grid[cell] = CellCode::Clear;
                            }
                            agent.add_key(color);
                            tracing::debug!(x = next.x, y = next.y, ?color, "Key picked up");
                            ActionResult::PickedUp(color)
                        }
                        None => ActionResult::Moved(next),
                    },
                    None => ActionResult::Moved(next),
                }
            }
        }
    }

    fn leave_floor(&mut self) -> ActionResult {
        let next_floor = self.snapshot.current_floor + 1;
        let Some(floor) = self.snapshot.floors.get(next_floor) else {
            tracing::info!(turns = self.turns, "Maze solved");
            self.snapshot.is_won = true;
            return ActionResult::Won;
        };

        let start = floor.start().unwrap_or_else(|| {
            tracing::warn!(floor = next_floor, "Floor has no start cell, entering at (0, 0)");
            Position::default()
        });
        self.snapshot.current_floor = next_floor;
        self.snapshot.agent.position = start;
        tracing::debug!(floor = next_floor, "Entered next floor");
        ActionResult::FloorChanged(next_floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIDE_KEY: &str = "
        #######
        #S..AE#
        #.#####
        #.#.#.#
        #.#####
        #a#.#.#
        #######
    ";

    fn go(direction: Direction) -> Action {
        direction.into()
    }

    #[test]
    fn key_door_and_exit_follow_the_rules() {
        let mut env = Environment::from_map(SIDE_KEY).unwrap();
        use Direction::*;

        assert_eq!(env.apply(go(Right)), ActionResult::Moved(Position::new(1, 0)));
        assert_eq!(
            env.apply(go(Right)),
            ActionResult::Failure("Agent lacks the required key: A.".to_string())
        );
        assert_eq!(env.apply(go(Left)), ActionResult::Moved(Position::new(0, 0)));
        assert_eq!(env.apply(go(Down)), ActionResult::Moved(Position::new(0, 1)));
        assert_eq!(env.apply(go(Down)), ActionResult::PickedUp(KeyColor::A));
        assert!(!env.snapshot().floors[0].keys[0].available);
        assert_eq!(env.snapshot().floors[0].room_value(Position::new(0, 2)), Some(CellCode::Clear));

        for direction in [Up, Up, Right] {
            env.apply(go(direction));
        }
        assert_eq!(env.apply(go(Right)), ActionResult::Unlocked(KeyColor::A));
        assert_eq!(env.snapshot().agent.position, Position::new(1, 0));
        assert!(!env.snapshot().floors[0].doors[0].locked);
        assert_eq!(env.snapshot().agent.carried_keys().total(), 0);

        assert_eq!(env.apply(go(Right)), ActionResult::Won);
        assert!(env.is_won());
        assert!(matches!(env.apply(Action::Wait), ActionResult::Failure(_)));
    }

    #[test]
    fn exit_leads_to_next_floor_start() {
        let mut env = Environment::from_map(
            "
            #####
            #S.E#
            #####
            #.#.#
            #####

            #####
            #..E#
            #.###
            #S#.#
            #####
            ",
        )
        .unwrap();
        assert_eq!(env.apply(go(Direction::Right)), ActionResult::FloorChanged(1));
        assert_eq!(env.snapshot().current_floor, 1);
        assert_eq!(env.snapshot().agent.position, Position::new(0, 1));
        assert!(!env.is_won());
    }

    #[test]
    fn walls_and_odd_moves_fail() {
        let mut env = Environment::from_map(SIDE_KEY).unwrap();
        assert!(matches!(env.apply(go(Direction::Up)), ActionResult::Failure(_)));
        assert!(matches!(
            env.apply(Action::Move { dx: 1, dy: 1 }),
            ActionResult::Failure(_)
        ));
        assert_eq!(env.apply(Action::Wait), ActionResult::Waited);
        assert_eq!(env.snapshot().agent.position, Position::new(0, 0));
        assert_eq!(env.turns(), 3);
    }
}
