use crate::board::Board;
use crate::mark::Mark;
use serde::{Deserialize, Serialize};

/// The 8 winning lines: 3 rows, 3 columns, 2 diagonals.
pub const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Result of evaluating a board position.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// No line is complete and at least one cell is still empty
    InProgress,
    /// The given mark occupies a complete line
    Win(Mark),
    /// All 9 cells are filled with no complete line
    Draw,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Outcome::InProgress)
    }
}

/// Evaluates a board against the fixed line table.
///
/// Checks the 8 lines in table order and reports the first one whose three
/// cells hold the same mark. A board with no complete line is a draw only
/// once every cell is filled.
///
/// # Examples
///
/// ```
/// use tictac_engine::board::Board;
/// use tictac_engine::mark::Mark;
/// use tictac_engine::rules::{evaluate, Outcome};
///
/// let mut board = Board::new();
/// for index in [0, 1, 2] {
///     board.place(index, Mark::X).unwrap();
/// }
/// assert_eq!(evaluate(&board), Outcome::Win(Mark::X));
/// ```
pub fn evaluate(board: &Board) -> Outcome {
    for line in &WIN_LINES {
        if let Some(mark) = board.cell(line[0]) {
            if board.cell(line[1]) == Some(mark) && board.cell(line[2]) == Some(mark) {
                return Outcome::Win(mark);
            }
        }
    }

    if board.is_full() {
        Outcome::Draw
    } else {
        Outcome::InProgress
    }
}
