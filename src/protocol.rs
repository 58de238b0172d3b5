//! JSON wire messages exchanged over a connection.
//!
//! Every frame is an envelope `{ "type": ..., "payload": {...} }`. Inbound
//! frames are checked here, so the coordinator only ever sees well-formed
//! [`ClientMessage`] values.

use crate::error::ProtocolError;
use crate::games::tictactoe::{BOARD_SIZE, Symbol};
use crate::room::{RoomCode, RoomView};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

/// Raw inbound envelope, before the payload is typed.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Message kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// Kind-specific body.
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomCodePayload {
    room_code: RoomCode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MovePayload {
    room_code: RoomCode,
    cell_index: usize,
}

/// Action requested by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Open a new room and take seat X.
    CreateRoom,
    /// Take a free seat in an existing room.
    JoinRoom {
        /// Room to join.
        room_code: RoomCode,
    },
    /// Place the requester's symbol.
    MakeMove {
        /// Room the move is for.
        room_code: RoomCode,
        /// Target cell, 0-8.
        cell_index: usize,
    },
    /// Start a rematch after a finished game.
    ResetGame {
        /// Room to reset.
        room_code: RoomCode,
    },
    /// Give up the current seat.
    LeaveRoom,
}

impl ClientMessage {
    /// Decodes and validates a text frame.
    #[instrument(skip(text), fields(len = text.len()))]
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        Self::from_envelope(envelope)
    }

    /// Types the payload of an already-decoded envelope.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        let Envelope { kind, payload } = envelope;
        let message = match kind.as_str() {
            "createRoom" => Self::CreateRoom,
            "leaveRoom" => Self::LeaveRoom,
            "joinRoom" => {
                let RoomCodePayload { room_code } = typed(payload)?;
                Self::JoinRoom { room_code }
            }
            "resetGame" => {
                let RoomCodePayload { room_code } = typed(payload)?;
                Self::ResetGame { room_code }
            }
            "makeMove" => {
                let MovePayload {
                    room_code,
                    cell_index,
                } = typed(payload)?;
                if cell_index >= BOARD_SIZE {
                    return Err(ProtocolError::new(format!(
                        "cellIndex must be between 0 and {}",
                        BOARD_SIZE - 1
                    )));
                }
                Self::MakeMove {
                    room_code,
                    cell_index,
                }
            }
            other => {
                warn!(kind = other, "Unknown message type");
                return Err(ProtocolError::new(format!("Unknown message type: {}", other)));
            }
        };
        Ok(message)
    }
}

#[track_caller]
fn typed<T: DeserializeOwned>(payload: serde_json::Value) -> Result<T, ProtocolError> {
    serde_json::from_value(payload)
        .map_err(|e| ProtocolError::new(format!("Invalid payload: {}", e)))
}

/// Body of `roomCreated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreated {
    /// Code to share with the opponent.
    pub room_code: RoomCode,
    /// Symbol assigned to the creator.
    pub symbol: Symbol,
}

/// Body of `joinRoomResponse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomResponse {
    /// Whether a seat was taken.
    pub success: bool,
    /// Symbol assigned on success.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub symbol: Option<Symbol>,
    /// Reason on failure.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl JoinRoomResponse {
    /// Successful join.
    pub fn joined(symbol: Symbol) -> Self {
        Self {
            success: true,
            symbol: Some(symbol),
            error: None,
        }
    }

    /// Failed join.
    pub fn rejected(error: impl ToString) -> Self {
        Self {
            success: false,
            symbol: None,
            error: Some(error.to_string()),
        }
    }
}

/// Body of `playerDisconnected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDisconnected {
    /// Symbol whose seat was vacated.
    pub disconnected_player: Symbol,
}

/// Body of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Human-readable reason.
    pub message: String,
}

/// Message pushed to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::From)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Room opened for the requester.
    RoomCreated(RoomCreated),
    /// Outcome of a join request.
    JoinRoomResponse(JoinRoomResponse),
    /// Full room snapshot.
    GameStateUpdate(RoomView),
    /// An opponent left.
    PlayerDisconnected(PlayerDisconnected),
    /// A request was rejected.
    Error(ErrorMessage),
}

impl ServerMessage {
    /// Builds an `error` message.
    pub fn error(message: impl ToString) -> Self {
        Self::Error(ErrorMessage {
            message: message.to_string(),
        })
    }

    /// Encodes the message as a JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
