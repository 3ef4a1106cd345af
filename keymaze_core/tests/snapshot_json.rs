use keymaze_core::{
    Action, Direction, KeyColor, SnapshotError, SolverError, SolverSession,
    loader::parse_maze, maze::MazeSnapshot,
};

// Door A sits between the start and the exit; the agent already holds key A.
const CARRIED_KEY: &str = r#"{
    "floors": [{
        "grid": [
            [1, 1, 1, 1, 1],
            [1, 6, 2, 7, 1],
            [1, 1, 1, 1, 1],
            [1, 0, 1, 0, 1],
            [1, 1, 1, 1, 1]
        ],
        "doors": [{ "seam": { "x": 2, "y": 1 }, "color": "A", "locked": true }],
        "keys": []
    }],
    "current_floor": 0,
    "agent": {
        "position": { "x": 0, "y": 0 },
        "consumables": { "key_a": 1, "torch": 2 }
    }
}"#;

#[test]
fn carried_key_from_json_opens_the_door() {
    let snapshot: MazeSnapshot = serde_json::from_str(CARRIED_KEY).unwrap();
    assert!(!snapshot.is_won);
    assert_eq!(snapshot.agent.carried_keys().get(KeyColor::A), 1);

    let mut session = SolverSession::new();
    assert_eq!(session.solve(&snapshot).unwrap(), Action::Move { dx: 1, dy: 0 });
    assert_eq!(session.remaining_steps(), &[Direction::Right]);
}

#[test]
fn ragged_grid_is_rejected_while_parsing() {
    let text = CARRIED_KEY.replace("[1, 0, 1, 0, 1]", "[1, 0, 1]");
    assert!(serde_json::from_str::<MazeSnapshot>(&text).is_err());
}

#[test]
fn unknown_cell_code_is_rejected_while_parsing() {
    let text = CARRIED_KEY.replace("[1, 6, 2, 7, 1]", "[1, 6, 2, 9, 1]");
    assert!(serde_json::from_str::<MazeSnapshot>(&text).is_err());
}

#[test]
fn missing_exit_is_a_malformed_snapshot() {
    let text = CARRIED_KEY.replace("[1, 6, 2, 7, 1]", "[1, 6, 2, 0, 1]");
    let snapshot: MazeSnapshot = serde_json::from_str(&text).unwrap();
    assert_eq!(
        SolverSession::new().solve(&snapshot),
        Err(SolverError::MalformedSnapshot(SnapshotError::NoExit { floor: 0 }))
    );
}

#[test]
fn even_sized_grid_is_a_malformed_snapshot() {
    let snapshot: MazeSnapshot = serde_json::from_str(CARRIED_KEY).unwrap();
    let text = serde_json::to_string(&snapshot)
        .unwrap()
        .replace("[1,0,1,0,1],[1,1,1,1,1]", "[1,0,1,0,1]");
    let snapshot: MazeSnapshot = serde_json::from_str(&text).unwrap();
    assert!(matches!(
        SolverSession::new().solve(&snapshot),
        Err(SolverError::MalformedSnapshot(SnapshotError::BadGridShape {
            width: 5,
            height: 4,
            ..
        }))
    ));
}

#[test]
fn text_maps_serialize_to_integer_grids() {
    let maze = parse_maze("#####\n#S.E#\n#####\n#.#.#\n#####").unwrap();
    let value = serde_json::to_value(&maze).unwrap();
    assert_eq!(value["floors"][0]["grid"][1], serde_json::json!([1, 6, 0, 7, 1]));
    let back: MazeSnapshot = serde_json::from_value(value).unwrap();
    assert_eq!(back, maze);
}
