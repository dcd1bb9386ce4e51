use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two player symbols in tic-tac-toe.
/// Serialized as lowercase `"x"` / `"o"` on the wire.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    /// The X symbol; moves first in a fresh game
    X,
    /// The O symbol
    O,
}

impl Mark {
    /// The other player's mark.
    pub fn opponent(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

pub fn both_marks() -> [Mark; 2] {
    [Mark::X, Mark::O]
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::X => write!(f, "X"),
            Mark::O => write!(f, "O"),
        }
    }
}
