//! Move validation and win/draw detection.
//!
//! These functions are pure: they read the board they are given and
//! return a new value, never touching room state.

use super::types::{Board, Outcome, Square, Symbol};
use crate::error::RoomError;
use tracing::instrument;

/// Winning lines, scanned in this order: rows, columns, diagonals.
pub const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Returns true when `index` is on the board and its square is empty.
pub fn is_valid_move(board: &Board, index: usize) -> bool {
    board.is_empty(index)
}

/// Returns a copy of `board` with `symbol` placed at `index`.
///
/// # Errors
///
/// Returns [`RoomError::InvalidMove`] if [`is_valid_move`] rejects the index.
#[instrument(skip(board))]
pub fn apply_move(board: &Board, index: usize, symbol: Symbol) -> Result<Board, RoomError> {
    if !is_valid_move(board, index) {
        return Err(RoomError::InvalidMove { index });
    }
    let mut next = *board;
    next.place(index, symbol);
    Ok(next)
}

/// Evaluates the board.
///
/// The first completed line in [`WINNING_LINES`] order wins, so a board
/// holding two completed lines always reports the same one.
#[instrument(skip(board))]
pub fn evaluate(board: &Board) -> Outcome {
    for line in WINNING_LINES {
        let [a, b, c] = line;
        if let Some(Square::Occupied(symbol)) = board.get(a)
            && board.get(b) == Some(Square::Occupied(symbol))
            && board.get(c) == Some(Square::Occupied(symbol))
        {
            return Outcome::Won { symbol, line };
        }
    }

    if board.is_full() {
        Outcome::Draw
    } else {
        Outcome::Pending
    }
}
