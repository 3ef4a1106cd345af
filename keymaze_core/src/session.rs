use tracing::{debug, warn};

use crate::{
    Action,
    actions::path_to_actions,
    error::SolverError,
    maze::MazeSnapshot,
    movement::Direction,
    search::{PathSearch, SearchLimits},
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum SessionState {
    #[default]
    Empty,
    Cached {
        floor: usize,
        steps: Vec<Direction>,
        cursor: usize,
    },
}

/// Hands out one step per call from a cached plan, recomputing the plan only
/// when it runs out, the floor changes or the cache is invalidated.
///
/// The session trusts that the snapshot follows the plan between calls. If
/// anything else moves the agent, call [`SolverSession::on_user_override`].
#[derive(Debug, Clone, Default)]
pub struct SolverSession {
    state: SessionState,
    limits: SearchLimits,
    recomputations: usize,
}

impl SolverSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: SearchLimits) -> Self {
        SolverSession {
            limits,
            ..Self::default()
        }
    }

    /// Returns the next action for `snapshot`.
    ///
    /// A snapshot that cannot be solved (no path, or the search ran into its
    /// limits) yields [`Action::Wait`]. Only malformed snapshots are errors.
    pub fn solve(&mut self, snapshot: &MazeSnapshot) -> Result<Action, SolverError> {
        if let SessionState::Cached {
            floor,
            steps,
            cursor,
        } = &mut self.state
        {
            if *floor == snapshot.current_floor && *cursor < steps.len() {
                let step = steps[*cursor];
                *cursor += 1;
                return Ok(step.into());
            }
            debug!(
                cached_floor = *floor,
                floor = snapshot.current_floor,
                "Plan used up or floor changed, recomputing"
            );
        }
        self.state = SessionState::Empty;

        self.recomputations += 1;
        let steps = match plan(snapshot, self.limits) {
            Ok(steps) => steps,
            Err(SolverError::NoPathFound) => {
                debug!(floor = snapshot.current_floor, "Exit unreachable, waiting");
                return Ok(Action::Wait);
            }
            Err(err @ SolverError::SearchDepthExceeded { .. }) => {
                warn!(floor = snapshot.current_floor, "{err}, waiting");
                return Ok(Action::Wait);
            }
            Err(err) => return Err(err),
        };

        let Some(&first) = steps.first() else {
            debug!(floor = snapshot.current_floor, "Nothing to do, waiting");
            return Ok(Action::Wait);
        };
        debug!(
            floor = snapshot.current_floor,
            steps = steps.len(),
            "New plan cached"
        );
        self.state = SessionState::Cached {
            floor: snapshot.current_floor,
            steps,
            cursor: 1,
        };
        Ok(first.into())
    }

    /// Drops the cached plan so the next call recomputes.
    pub fn invalidate_cache(&mut self) {
        if self.state != SessionState::Empty {
            debug!("Plan cache invalidated");
        }
        self.state = SessionState::Empty;
    }

    /// The agent was moved by something other than this session.
    pub fn on_user_override(&mut self) {
        self.invalidate_cache();
    }

    /// Per-tick hook for hosts that only know whether an override happened.
    pub fn poll(&mut self, overridden: bool) {
        if overridden {
            self.on_user_override();
        }
    }

    /// How many times a full plan has been computed.
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    /// Steps left in the cached plan.
    pub fn remaining_steps(&self) -> &[Direction] {
        match &self.state {
            SessionState::Empty => &[],
            SessionState::Cached { steps, cursor, .. } => &steps[(*cursor).min(steps.len())..],
        }
    }
}

/// Computes the whole step list from the agent to the exit of its floor.
///
/// The search runs on a copy of the floor; the steps are derived from the
/// untouched floor so that each door crossing costs its unlock step.
pub fn plan(snapshot: &MazeSnapshot, limits: SearchLimits) -> Result<Vec<Direction>, SolverError> {
    let exit = snapshot.validate()?;
    let floor = snapshot.floor()?;
    let mut scratch = floor.clone();
    let route = PathSearch::new(&mut scratch, limits).find(
        snapshot.agent.carried_keys(),
        snapshot.agent.position,
        exit,
    )?;
    debug!(
        rooms = route.rooms().count(),
        key_pickups = route.key_pickups(),
        expansions = route.expansions,
        "Route found"
    );
    Ok(path_to_actions(&floor.grid, &route.waypoints))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Position, SnapshotError, loader::parse_maze};

    const SIDE_KEY: &str = "
        #######
        #S..AE#
        #.#####
        #.#.#.#
        #.#####
        #a#.#.#
        #######
    ";

    fn down() -> Action {
        Direction::Down.into()
    }

    #[test]
    fn hands_out_cached_steps_one_by_one() {
        let maze = parse_maze(SIDE_KEY).unwrap();
        let mut session = SolverSession::new();
        assert_eq!(session.solve(&maze).unwrap(), down());
        assert_eq!(session.recomputations(), 1);
        assert_eq!(session.remaining_steps().len(), 6);

        assert_eq!(session.solve(&maze).unwrap(), down());
        assert_eq!(session.recomputations(), 1);
        assert_eq!(session.remaining_steps().len(), 5);
    }

    #[test]
    fn same_snapshot_gives_same_plan() {
        let maze = parse_maze(SIDE_KEY).unwrap();
        let limits = SearchLimits::default();
        assert_eq!(plan(&maze, limits).unwrap(), plan(&maze, limits).unwrap());
    }

    #[test]
    fn override_forces_recompute() {
        let maze = parse_maze(SIDE_KEY).unwrap();
        let mut session = SolverSession::new();
        session.solve(&maze).unwrap();
        session.poll(false);
        session.solve(&maze).unwrap();
        assert_eq!(session.recomputations(), 1);

        session.poll(true);
        assert!(session.remaining_steps().is_empty());
        session.solve(&maze).unwrap();
        assert_eq!(session.recomputations(), 2);
    }

    #[test]
    fn unreachable_exit_waits_without_caching() {
        let maze = parse_maze("#####\n#S#E#\n#####\n#.#.#\n#####").unwrap();
        let mut session = SolverSession::new();
        assert_eq!(session.solve(&maze).unwrap(), Action::Wait);
        assert!(session.remaining_steps().is_empty());
        assert_eq!(session.solve(&maze).unwrap(), Action::Wait);
        assert_eq!(session.recomputations(), 2);
    }

    #[test]
    fn agent_on_exit_waits() {
        let mut maze = parse_maze("#####\n#S.E#\n#####\n#.#.#\n#####").unwrap();
        maze.agent.position = Position::new(1, 0);
        let mut session = SolverSession::new();
        assert_eq!(session.solve(&maze).unwrap(), Action::Wait);
    }

    #[test]
    fn search_limits_turn_into_wait() {
        let maze = parse_maze(SIDE_KEY).unwrap();
        let mut session = SolverSession::with_limits(SearchLimits {
            max_expansions: 1,
            max_depth: 32,
        });
        assert_eq!(session.solve(&maze).unwrap(), Action::Wait);
    }

    #[test]
    fn malformed_snapshot_is_an_error() {
        let mut maze = parse_maze(SIDE_KEY).unwrap();
        maze.current_floor = 3;
        let mut session = SolverSession::new();
        assert_eq!(
            session.solve(&maze),
            Err(SolverError::MalformedSnapshot(SnapshotError::NoSuchFloor {
                index: 3,
                count: 1
            }))
        );
    }
}
