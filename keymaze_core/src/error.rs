use crate::Position;

/// Reasons a snapshot cannot be searched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("Floor index {index} is out of range ({count} floors)")]
    NoSuchFloor { index: usize, count: usize },
    #[error("Floor {floor} grid is {width}x{height}, expected a square grid of odd size >= 3")]
    BadGridShape {
        floor: usize,
        width: usize,
        height: usize,
    },
    #[error("Floor {floor} has no exit cell")]
    NoExit { floor: usize },
    #[error("Agent position ({}, {}) is outside the {size}x{size} room grid", position.x, position.y)]
    AgentOutOfBounds { position: Position, size: usize },
}

/// Errors produced while computing a decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SolverError {
    #[error("No path to the exit")]
    NoPathFound,
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(#[from] SnapshotError),
    #[error(
        "Search gave up after {expansions} expansions (limit {max_expansions}, depth limit {max_depth})"
    )]
    SearchDepthExceeded {
        expansions: usize,
        max_expansions: usize,
        max_depth: usize,
    },
}
