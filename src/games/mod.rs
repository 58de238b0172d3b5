//! Game rule engines.

pub mod tictactoe;
