mod rules;
mod types;

pub use rules::{WINNING_LINES, apply_move, evaluate, is_valid_move};
pub use types::{BOARD_SIZE, Board, Outcome, Square, Symbol};
