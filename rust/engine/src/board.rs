use crate::errors::GameError;
use crate::mark::Mark;
use serde::{Deserialize, Serialize};

/// Number of cells on the board.
pub const CELL_COUNT: usize = 9;

/// The 3×3 playing surface, stored as a flat row-major array.
/// Cell indices run 0..=8: 0-1-2 is the top row, 6-7-8 the bottom.
/// Serializes as a 9-element JSON array of `"x"` / `"o"` / `null`.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [Option<Mark>; CELL_COUNT],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cells(&self) -> &[Option<Mark>; CELL_COUNT] {
        &self.cells
    }

    /// The mark occupying `index`, or `None` when the cell is empty or the
    /// index is off the board.
    pub fn cell(&self, index: usize) -> Option<Mark> {
        self.cells.get(index).copied().flatten()
    }

    /// Places `mark` on the cell at `index`.
    pub fn place(&mut self, index: usize, mark: Mark) -> Result<(), GameError> {
        let cell = self
            .cells
            .get_mut(index)
            .ok_or(GameError::OutOfRange { index })?;
        if cell.is_some() {
            return Err(GameError::CellOccupied { index });
        }
        *cell = Some(mark);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|cell| cell.is_some())
    }

    pub fn filled_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    /// Indices of all empty cells, in board order.
    pub fn empty_cells(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(index, cell)| cell.is_none().then_some(index))
            .collect()
    }

    /// Empties every cell.
    pub fn clear(&mut self) {
        self.cells = [None; CELL_COUNT];
    }
}
