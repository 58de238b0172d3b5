//! Core domain types for tic-tac-toe.

use serde::{Deserialize, Serialize};

/// Mark a player places on the board.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
pub enum Symbol {
    /// Symbol X (moves first).
    X,
    /// Symbol O (moves second).
    O,
}

impl Symbol {
    /// Returns the symbol that moves after this one.
    pub fn next_turn(self) -> Self {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

/// A square on the tic-tac-toe board.
///
/// Serializes as `null` when empty and as the occupying symbol otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<Symbol>", into = "Option<Symbol>")]
pub enum Square {
    /// Empty square.
    Empty,
    /// Square occupied by a symbol.
    Occupied(Symbol),
}

impl From<Option<Symbol>> for Square {
    fn from(value: Option<Symbol>) -> Self {
        value.map_or(Square::Empty, Square::Occupied)
    }
}

impl From<Square> for Option<Symbol> {
    fn from(square: Square) -> Self {
        match square {
            Square::Empty => None,
            Square::Occupied(symbol) => Some(symbol),
        }
    }
}

/// Number of squares on the board.
pub const BOARD_SIZE: usize = 9;

/// 3x3 tic-tac-toe board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    /// Squares in row-major order (0-8).
    squares: [Square; BOARD_SIZE],
}

impl Board {
    /// Creates a new empty board.
    pub fn new() -> Self {
        Self {
            squares: [Square::Empty; BOARD_SIZE],
        }
    }

    /// Gets the square at the given position (0-8).
    pub fn get(&self, pos: usize) -> Option<Square> {
        self.squares.get(pos).copied()
    }

    /// Checks if a square is in range and empty.
    pub fn is_empty(&self, pos: usize) -> bool {
        matches!(self.get(pos), Some(Square::Empty))
    }

    /// Checks if every square is occupied.
    pub fn is_full(&self) -> bool {
        self.squares.iter().all(|s| *s != Square::Empty)
    }

    /// Returns all squares.
    pub fn squares(&self) -> &[Square; BOARD_SIZE] {
        &self.squares
    }

    /// Counts the squares held by `symbol`.
    pub fn count(&self, symbol: Symbol) -> usize {
        self.squares
            .iter()
            .filter(|s| **s == Square::Occupied(symbol))
            .count()
    }

    /// Writes a square. Callers check bounds and occupancy first.
    pub(super) fn place(&mut self, pos: usize, symbol: Symbol) {
        if let Some(square) = self.squares.get_mut(pos) {
            *square = Square::Occupied(symbol);
        }
    }

    /// Formats the board as a human-readable string.
    pub fn display(&self) -> String {
        let mut result = String::new();
        for row in 0..3 {
            for col in 0..3 {
                let pos = row * 3 + col;
                let symbol = match self.squares[pos] {
                    Square::Empty => (pos + 1).to_string(),
                    Square::Occupied(symbol) => symbol.to_string(),
                };
                result.push_str(&symbol);
                if col < 2 {
                    result.push('|');
                }
            }
            if row < 2 {
                result.push_str("\n-+-+-\n");
            }
        }
        result
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl From<[Square; BOARD_SIZE]> for Board {
    fn from(squares: [Square; BOARD_SIZE]) -> Self {
        Self { squares }
    }
}

/// Result of evaluating a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No line completed and squares remain.
    Pending,
    /// `symbol` holds all three squares of `line`.
    Won {
        /// The winning symbol.
        symbol: Symbol,
        /// Indices of the completed line.
        line: [usize; 3],
    },
    /// Board full with no completed line.
    Draw,
}
