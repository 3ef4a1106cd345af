//! Plain-text maze format.
//!
//! One character per cell of the doubled grid:
//!
//! | char | cell                |
//! |------|---------------------|
//! | `#`  | wall                |
//! | `.`  | clear               |
//! | `A`  | door A (seams only) |
//! | `B`  | door B (seams only) |
//! | `a`  | key A (rooms only)  |
//! | `b`  | key B (rooms only)  |
//! | `S`  | start (rooms only)  |
//! | `E`  | exit (rooms only)   |
//!
//! Leading and trailing whitespace on each line is ignored. Floors are
//! separated by one or more blank lines.

use crate::{
    Position,
    map::{CellCoord, Grid, GridError},
    maze::{AgentState, CellCode, FloorState, MazeSnapshot},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("Map is empty")]
    Empty,
    #[error("Row {row} has {found} cells, expected {expected}")]
    InconsistentWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Floor is {width}x{height}, expected a square of odd size >= 3")]
    BadSize { width: usize, height: usize },
    #[error("Unknown map character '{found}' at ({x}, {y})")]
    UnknownCharacter { found: char, x: usize, y: usize },
    #[error("'{found}' at ({x}, {y}) must sit on a {expected} cell")]
    Misplaced {
        found: char,
        x: usize,
        y: usize,
        expected: &'static str,
    },
    #[error("No start position ('S') found on the first floor")]
    NoStart,
    #[error(transparent)]
    Grid(#[from] GridError),
}

fn code_for(found: char) -> Option<CellCode> {
    Some(match found {
        '#' => CellCode::Wall,
        '.' => CellCode::Clear,
        'A' => CellCode::DoorA,
        'B' => CellCode::DoorB,
        'a' => CellCode::KeyA,
        'b' => CellCode::KeyB,
        'S' => CellCode::Start,
        'E' => CellCode::End,
        _ => return None,
    })
}

/// The character a cell code is written as.
pub fn char_for(code: CellCode) -> char {
    match code {
        CellCode::Wall => '#',
        CellCode::Clear => '.',
        CellCode::DoorA => 'A',
        CellCode::DoorB => 'B',
        CellCode::KeyA => 'a',
        CellCode::KeyB => 'b',
        CellCode::Start => 'S',
        CellCode::End => 'E',
    }
}

/// Parses a single floor.
pub fn parse_floor(text: &str) -> Result<FloorState, MapError> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    parse_lines(&lines)
}

fn parse_lines(lines: &[&str]) -> Result<FloorState, MapError> {
    if lines.is_empty() {
        return Err(MapError::Empty);
    }

    let height = lines.len();
    let width = lines[0].chars().count();
    let mut rows = Vec::with_capacity(height);

    for (y, line) in lines.iter().enumerate() {
        let found = line.chars().count();
        if found != width {
            return Err(MapError::InconsistentWidth {
                row: y,
                expected: width,
                found,
            });
        }

        let mut row = Vec::with_capacity(width);
        for (x, ch) in line.chars().enumerate() {
            let code = code_for(ch).ok_or(MapError::UnknownCharacter { found: ch, x, y })?;
            let cell = CellCoord::new(x, y);
            let misplaced = |expected| MapError::Misplaced {
                found: ch,
                x,
                y,
                expected,
            };
            match code {
                CellCode::DoorA | CellCode::DoorB if !cell.is_seam() => {
                    return Err(misplaced("seam"));
                }
                CellCode::KeyA | CellCode::KeyB | CellCode::Start | CellCode::End
                    if !cell.is_room() =>
                {
                    return Err(misplaced("room"));
                }
                _ => {}
            }
            row.push(code);
        }
        rows.push(row);
    }

    if width != height || width < 3 || width % 2 == 0 {
        return Err(MapError::BadSize { width, height });
    }

    Ok(FloorState::from_grid(Grid::from_rows(rows)?))
}

/// Parses every floor of a maze and places the agent on the first floor's start.
pub fn parse_maze(text: &str) -> Result<MazeSnapshot, MapError> {
    let mut floors = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !block.is_empty() {
                floors.push(parse_lines(&block)?);
                block.clear();
            }
        } else {
            block.push(line);
        }
    }
    if !block.is_empty() {
        floors.push(parse_lines(&block)?);
    }

    let start: Position = floors
        .first()
        .ok_or(MapError::Empty)?
        .start()
        .ok_or(MapError::NoStart)?;

    Ok(MazeSnapshot {
        floors,
        current_floor: 0,
        agent: AgentState::at(start),
        is_won: false,
    })
}

/// Writes a floor back in the text format.
pub fn render_floor(floor: &FloorState) -> String {
    floor
        .grid
        .rows()
        .map(|row| row.iter().copied().map(char_for).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
