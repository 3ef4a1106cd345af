use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    KeyColor, KeyTally, Position,
    error::SnapshotError,
    map::{CellCoord, Grid},
    movement::{in_bounds, room_span},
};

/// Code stored in one cell of the doubled-resolution floor grid.
///
/// Serialized as the game's integer code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum CellCode {
    #[default]
    Clear,
    Wall,
    DoorA,
    DoorB,
    KeyA,
    KeyB,
    Start,
    End,
}

/// An integer that is not a known cell code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("No cell code for map value {0}")]
pub struct UnknownCellCode(pub i32);

impl TryFrom<i32> for CellCode {
    type Error = UnknownCellCode;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => CellCode::Clear,
            1 => CellCode::Wall,
            2 => CellCode::DoorA,
            3 => CellCode::DoorB,
            4 => CellCode::KeyA,
            5 => CellCode::KeyB,
            6 => CellCode::Start,
            7 => CellCode::End,
            other => return Err(UnknownCellCode(other)),
        })
    }
}

impl From<CellCode> for i32 {
    fn from(code: CellCode) -> Self {
        match code {
            CellCode::Clear => 0,
            CellCode::Wall => 1,
            CellCode::DoorA => 2,
            CellCode::DoorB => 3,
            CellCode::KeyA => 4,
            CellCode::KeyB => 5,
            CellCode::Start => 6,
            CellCode::End => 7,
        }
    }
}

impl CellCode {
    pub fn door_color(self) -> Option<KeyColor> {
        match self {
            CellCode::DoorA => Some(KeyColor::A),
            CellCode::DoorB => Some(KeyColor::B),
            _ => None,
        }
    }

    pub fn key_color(self) -> Option<KeyColor> {
        match self {
            CellCode::KeyA => Some(KeyColor::A),
            CellCode::KeyB => Some(KeyColor::B),
            _ => None,
        }
    }
}

/// A key lying on the floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyItem {
    pub color: KeyColor,
    pub position: Position,
    /// False once picked up.
    pub available: bool,
}

/// A colored door sitting on a seam cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Door {
    pub seam: CellCoord,
    pub color: KeyColor,
    pub locked: bool,
}

/// The agent's position and the keys it already carries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentState {
    pub position: Position,
    /// Consumable name to count, e.g. `"key_a" -> 1`.
    #[serde(default)]
    pub consumables: BTreeMap<String, u32>,
}

impl AgentState {
    /// An agent at `position` carrying nothing.
    pub fn at(position: Position) -> Self {
        AgentState {
            position,
            consumables: BTreeMap::new(),
        }
    }

    /// Keys held, read from the `key_a` / `key_b` consumables. Other
    /// consumables are ignored.
    pub fn carried_keys(&self) -> KeyTally {
        let mut tally = KeyTally::default();
        for color in KeyColor::ALL {
            if let Some(&count) = self.consumables.get(color.item_name()) {
                tally.add(color, count);
            }
        }
        tally
    }

    /// Adds one key of `color` to the consumables.
    pub fn add_key(&mut self, color: KeyColor) {
        *self
            .consumables
            .entry(color.item_name().to_string())
            .or_insert(0) += 1;
    }

    /// Uses up one carried key. Returns `false` if none of that color is held.
    pub fn spend_key(&mut self, color: KeyColor) -> bool {
        match self.consumables.get_mut(color.item_name()) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }
}

/// One floor of the maze: the cell grid plus its doors and keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorState {
    pub grid: Grid<CellCode>,
    pub doors: Vec<Door>,
    pub keys: Vec<KeyItem>,
}

impl FloorState {
    /// Builds a floor from its grid, listing every door as locked and every key
    /// as available, both in row-major order.
    pub fn from_grid(grid: Grid<CellCode>) -> Self {
        let mut doors = Vec::new();
        let mut keys = Vec::new();
        for (cell, code) in grid.enumerate() {
            if let Some(color) = code.door_color() {
                doors.push(Door {
                    seam: cell,
                    color,
                    locked: true,
                });
            } else if let (Some(color), Some(position)) = (code.key_color(), cell.room()) {
                keys.push(KeyItem {
                    color,
                    position,
                    available: true,
                });
            }
        }
        FloorState { grid, doors, keys }
    }

    /// Rooms along one side.
    pub fn size(&self) -> usize {
        room_span(&self.grid)
    }

    pub fn contains(&self, position: Position) -> bool {
        in_bounds(&self.grid, position)
    }

    pub fn room_value(&self, position: Position) -> Option<CellCode> {
        crate::movement::room_value(&self.grid, position)
    }

    /// First room carrying `code` in row-major order.
    pub fn find_room(&self, code: CellCode) -> Option<Position> {
        self.grid
            .enumerate()
            .filter(|(_, value)| **value == code)
            .find_map(|(cell, _)| cell.room())
    }

    /// The exit room. With several exits the first in row-major order wins.
    pub fn exit(&self) -> Option<Position> {
        let mut exits = self
            .grid
            .enumerate()
            .filter(|(cell, value)| **value == CellCode::End && cell.is_room())
            .filter_map(|(cell, _)| cell.room());
        let first = exits.next()?;
        if exits.next().is_some() {
            tracing::warn!(x = first.x, y = first.y, "Floor has several exits, using the first");
        }
        Some(first)
    }

    pub fn start(&self) -> Option<Position> {
        self.find_room(CellCode::Start)
    }

    /// Checks the grid is a square of odd size that holds at least one room.
    pub fn check_shape(&self, floor: usize) -> Result<(), SnapshotError> {
        let (width, height) = (self.grid.width(), self.grid.height());
        if width != height || width < 3 || width % 2 == 0 {
            return Err(SnapshotError::BadGridShape {
                floor,
                width,
                height,
            });
        }
        Ok(())
    }
}

/// Everything one solve call gets to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MazeSnapshot {
    pub floors: Vec<FloorState>,
    pub current_floor: usize,
    pub agent: AgentState,
    /// Reported by the game; the solver does not look at it.
    #[serde(default)]
    pub is_won: bool,
}

impl MazeSnapshot {
    /// The floor the agent is on.
    pub fn floor(&self) -> Result<&FloorState, SnapshotError> {
        self.floors
            .get(self.current_floor)
            .ok_or(SnapshotError::NoSuchFloor {
                index: self.current_floor,
                count: self.floors.len(),
            })
    }

    /// Validates the current floor and returns its exit.
    ///
    /// Fails instead of falling back to a default exit, so that authoring
    /// mistakes surface here rather than as an agent walking to the origin.
    pub fn validate(&self) -> Result<Position, SnapshotError> {
        let floor = self.floor()?;
        floor.check_shape(self.current_floor)?;
        if !floor.contains(self.agent.position) {
            return Err(SnapshotError::AgentOutOfBounds {
                position: self.agent.position,
                size: floor.size(),
            });
        }
        floor.exit().ok_or(SnapshotError::NoExit {
            floor: self.current_floor,
        })
    }
}
