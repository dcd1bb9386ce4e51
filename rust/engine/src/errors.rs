use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("cell index {index} is off the board")]
    OutOfRange { index: usize },
    #[error("cell {index} is already occupied")]
    CellOccupied { index: usize },
}
