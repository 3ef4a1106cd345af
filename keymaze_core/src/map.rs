use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::Position;

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Address of one cell in the doubled-resolution cell grid.
///
/// Room cells sit at odd/odd coordinates, seams (walls and doors) between
/// them at coordinates with at least one even component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: usize,
    pub y: usize,
}

impl CellCoord {
    pub const fn new(x: usize, y: usize) -> Self {
        CellCoord { x, y }
    }

    /// The cell holding the room at `position`, or `None` for negative coordinates.
    pub fn of_room(position: Position) -> Option<Self> {
        let x = usize::try_from(position.x).ok()?;
        let y = usize::try_from(position.y).ok()?;
        Some(CellCoord {
            x: x * 2 + 1,
            y: y * 2 + 1,
        })
    }

    /// The room this cell belongs to, if it is a room cell.
    pub fn room(self) -> Option<Position> {
        if self.is_room() {
            Some(Position::new((self.x / 2) as i32, (self.y / 2) as i32))
        } else {
            None
        }
    }

    pub fn is_room(self) -> bool {
        self.x % 2 == 1 && self.y % 2 == 1
    }

    /// A seam lies between exactly two rooms: one coordinate odd, the other even.
    pub fn is_seam(self) -> bool {
        (self.x % 2) != (self.y % 2)
    }
}

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order.
/// Serialized as a list of rows, so a deserialized grid is never ragged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<Vec<T>>",
    into = "Vec<Vec<T>>",
    bound(serialize = "T: Serialize + Clone", deserialize = "T: Deserialize<'de>")
)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Builds a grid from a list of rows, top row first.
    ///
    /// Every row must have the length of the first one.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, GridError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let mut cells = Vec::with_capacity(width * height);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != width {
                return Err(GridError::RaggedRow {
                    row,
                    expected: width,
                    found: values.len(),
                });
            }
            cells.extend(values);
        }
        Ok(Grid {
            width,
            height,
            cells,
        })
    }

    /// Returns the width of the grid.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height of the grid.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index_of(&self, at: CellCoord) -> Option<usize> {
        if self.contains(at) {
            Some(at.y * self.width + at.x)
        } else {
            None
        }
    }

    /// Checks if the given cell is within the grid boundaries.
    #[inline]
    pub fn contains(&self, at: CellCoord) -> bool {
        at.x < self.width && at.y < self.height
    }

    /// Gets a reference to the cell, or `None` if it is out of bounds.
    pub fn get(&self, at: CellCoord) -> Option<&T> {
        self.index_of(at).map(|index| &self.cells[index])
    }

    /// Iterates over the rows, top row first.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        self.cells.chunks(self.width.max(1))
    }

    /// Returns an iterator that yields `(CellCoord, &T)` in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (CellCoord, &T)> {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(index, cell)| (CellCoord::new(index % width, index / width), cell))
    }
}

impl<T> TryFrom<Vec<Vec<T>>> for Grid<T> {
    type Error = GridError;

    fn try_from(rows: Vec<Vec<T>>) -> Result<Self, Self::Error> {
        Grid::from_rows(rows)
    }
}

impl<T> From<Grid<T>> for Vec<Vec<T>> {
    fn from(grid: Grid<T>) -> Self {
        let width = grid.width.max(1);
        let mut rows = Vec::with_capacity(grid.height);
        let mut cells = grid.cells.into_iter();
        for _ in 0..grid.height {
            rows.push(cells.by_ref().take(width).collect());
        }
        rows
    }
}

impl<T> Index<CellCoord> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, at: CellCoord) -> &Self::Output {
        match self.index_of(at) {
            Some(index) => &self.cells[index],
            None => panic!(
                "Cell ({}, {}) out of bounds for grid size ({}, {})",
                at.x, at.y, self.width, self.height
            ),
        }
    }
}

impl<T> IndexMut<CellCoord> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, at: CellCoord) -> &mut Self::Output {
        let (width, height) = (self.width, self.height);
        match self.index_of(at) {
            Some(index) => &mut self.cells[index],
            None => panic!(
                "Cell ({}, {}) out of bounds for grid size ({}, {})",
                at.x, at.y, width, height
            ),
        }
    }
}
