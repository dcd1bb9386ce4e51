//! # tictac-engine: Tic-Tac-Toe Rules Core
//!
//! Pure game rules for 3×3 tic-tac-toe: board representation, mark
//! bookkeeping, and terminal-state detection. No I/O, no randomness, no
//! clocks. Everything here is deterministic and synchronous, so the
//! session layer above it can be exercised without a network.
//!
//! ## Core Modules
//!
//! - [`mark`] - The X/O player symbols
//! - [`board`] - The 9-cell board and placement rules
//! - [`rules`] - Win/draw evaluation over the 8 fixed lines
//! - [`errors`] - Error types for illegal placements
//!
//! ## Quick Start
//!
//! ```rust
//! use tictac_engine::board::Board;
//! use tictac_engine::mark::Mark;
//! use tictac_engine::rules::{evaluate, Outcome};
//!
//! let mut board = Board::new();
//! board.place(0, Mark::X).unwrap();
//! board.place(4, Mark::O).unwrap();
//! assert_eq!(evaluate(&board), Outcome::InProgress);
//! ```

pub mod board;
pub mod errors;
pub mod mark;
pub mod rules;
