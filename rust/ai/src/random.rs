//! Uniform-random bot.
//!
//! Picks any empty cell with equal probability. Each decision draws from
//! the calling thread's RNG, so concurrent rooms never contend on shared
//! generator state.

use crate::BotPlayer;
use rand::seq::IndexedRandom;
use tictac_engine::board::Board;

/// Bot that plays a uniformly random legal move.
#[derive(Debug, Clone, Default)]
pub struct RandomBot;

impl RandomBot {
    pub fn new() -> Self {
        Self
    }
}

impl BotPlayer for RandomBot {
    fn choose_cell(&self, board: &Board) -> Option<usize> {
        let empty = board.empty_cells();
        empty.choose(&mut rand::rng()).copied()
    }

    fn name(&self) -> &str {
        "RandomBot"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tictac_engine::board::CELL_COUNT;
    use tictac_engine::mark::Mark;

    #[test]
    fn chooses_an_empty_cell() {
        let mut board = Board::new();
        board.place(0, Mark::X).unwrap();
        board.place(4, Mark::O).unwrap();

        let bot = RandomBot::new();
        for _ in 0..100 {
            let cell = bot.choose_cell(&board).expect("board has empty cells");
            assert!(cell < CELL_COUNT);
            assert!(board.cell(cell).is_none(), "cell {cell} is occupied");
        }
    }

    #[test]
    fn returns_none_on_a_full_board() {
        let mut board = Board::new();
        for index in 0..CELL_COUNT {
            let mark = if index % 2 == 0 { Mark::X } else { Mark::O };
            board.place(index, mark).unwrap();
        }

        assert_eq!(RandomBot::new().choose_cell(&board), None);
    }

    #[test]
    fn single_empty_cell_is_always_picked() {
        let mut board = Board::new();
        for index in 0..CELL_COUNT - 1 {
            let mark = if index % 2 == 0 { Mark::X } else { Mark::O };
            board.place(index, mark).unwrap();
        }

        let bot = RandomBot::new();
        for _ in 0..10 {
            assert_eq!(bot.choose_cell(&board), Some(CELL_COUNT - 1));
        }
    }
}
