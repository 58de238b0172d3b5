//! Error types for room coordination, the wire boundary and configuration.

use derive_more::{Display, Error};
use tracing::instrument;

/// A rejected room action.
///
/// Every variant is scoped to the single interaction that caused it: the
/// room is left unchanged and only the requester is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum RoomError {
    /// A room with this code already exists.
    #[display("Room already exists")]
    RoomExists,
    /// No room with this code exists.
    #[display("Room not found")]
    RoomNotFound,
    /// Both seats are taken.
    #[display("Room is full")]
    RoomFull,
    /// The requester does not hold the symbol whose turn it is.
    #[display("Not your turn")]
    NotYourTurn,
    /// Cell index is off the board or already taken.
    #[display("Invalid move at cell {index}")]
    InvalidMove {
        /// Cell the requester tried to take.
        index: usize,
    },
    /// The room is not in the playing state.
    #[display("Game is not in progress")]
    GameNotInProgress,
    /// Reset was requested before the game ended.
    #[display("Game is not finished")]
    GameNotFinished,
    /// No free room code was found within the retry bound.
    #[display("Failed to create room")]
    RoomCreationFailed,
    /// The requester does not occupy a seat in the addressed room.
    #[display("You are not in this room")]
    NotInRoom,
}

/// Inbound message rejected at the boundary.
#[derive(Debug, Clone, Display, Error)]
#[display("Protocol error: {} at {}:{}", message, file, line)]
pub struct ProtocolError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ProtocolError {
    /// Creates a new protocol error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("Malformed message: {}", err))
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
