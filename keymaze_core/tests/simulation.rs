use keymaze_core::{
    Action, Direction, Position, SolverSession,
    environment::{ActionResult, Environment},
    search::SearchLimits,
    session::plan,
};

// Floor 0 needs key b to reach key a, and key a to reach the exit.
// Floor 1 has a single key right next to the start.
const TWO_FLOORS: &str = "
    #######
    #S.b#a#
    #.#.#B#
    #.#...#
    #.###A#
    #.#.#E#
    #######

    #####
    #S.a#
    #A###
    #E..#
    #####
";

fn run(env: &mut Environment, session: &mut SolverSession, max_ticks: usize) -> Vec<Action> {
    let mut taken = Vec::new();
    while !env.is_won() && taken.len() < max_ticks {
        let action = session.solve(env.snapshot()).unwrap();
        env.apply(action);
        taken.push(action);
    }
    taken
}

#[test]
fn solves_both_floors_end_to_end() {
    let mut env = Environment::from_map(TWO_FLOORS).unwrap();
    let mut session = SolverSession::new();

    let taken = run(&mut env, &mut session, 100);

    assert!(env.is_won());
    assert_eq!(taken.len(), 12);
    assert!(!taken.contains(&Action::Wait));
    assert_eq!(session.recomputations(), 2);
    assert_eq!(env.snapshot().current_floor, 1);
}

#[test]
fn nested_keys_are_fetched_in_order() {
    let env = Environment::from_map(TWO_FLOORS).unwrap();
    use Direction::*;
    assert_eq!(
        plan(env.snapshot(), SearchLimits::default()).unwrap(),
        vec![Right, Down, Right, Up, Up, Down, Down, Down]
    );
}

#[test]
fn every_fresh_session_makes_the_same_decisions() {
    let mut first = Environment::from_map(TWO_FLOORS).unwrap();
    let mut second = first.clone();
    let a = run(&mut first, &mut SolverSession::new(), 100);
    let b = run(&mut second, &mut SolverSession::new(), 100);
    assert_eq!(a, b);
}

#[test]
fn manual_moves_trigger_a_new_plan() {
    let mut env = Environment::from_map(TWO_FLOORS).unwrap();
    let mut session = SolverSession::new();

    let action = session.solve(env.snapshot()).unwrap();
    assert_eq!(action, Action::from(Direction::Right));
    env.apply(action);

    // The player steps back to the start.
    assert_eq!(
        env.apply(Direction::Left.into()),
        ActionResult::Moved(Position::new(0, 0))
    );
    session.on_user_override();

    // The key is already carried, so the new plan heads straight for door B.
    assert_eq!(session.solve(env.snapshot()).unwrap(), Action::from(Direction::Right));
    assert_eq!(session.recomputations(), 2);
    assert_eq!(
        session.remaining_steps(),
        &[
            Direction::Down,
            Direction::Right,
            Direction::Up,
            Direction::Up,
            Direction::Down,
            Direction::Down,
            Direction::Down
        ]
    );

    run(&mut env, &mut session, 100);
    assert!(env.is_won());
}

#[test]
fn walled_in_exit_keeps_the_agent_waiting() {
    let mut env = Environment::from_map(
        "
        #######
        #S.aA.#
        #######
        #.#.#.#
        #######
        #.#.#E#
        #######
        ",
    )
    .unwrap();
    let mut session = SolverSession::new();

    let taken = run(&mut env, &mut session, 3);
    assert_eq!(taken, vec![Action::Wait; 3]);
    assert_eq!(env.snapshot().agent.position, Position::new(0, 0));
    assert_eq!(session.recomputations(), 3);
}
