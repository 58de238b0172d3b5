//! Room and connection records.

use crate::error::ProtocolError;
use crate::games::tictactoe::{Board, Symbol};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_more::Display;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;
use uuid::Uuid;

/// Alphabet room codes are drawn from.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of a room code.
pub const ROOM_CODE_LEN: usize = 6;

/// Short code players share to meet in a room.
///
/// Always six characters of `[A-Z0-9]`. Input is trimmed and uppercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Draws a uniformly random code.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..ROOM_CODE_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..ROOM_CODE_ALPHABET.len());
                char::from(ROOM_CODE_ALPHABET[idx])
            })
            .collect();
        Self(code)
    }

    /// Parses and normalizes a code supplied by a client.
    #[instrument]
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let code = input.trim().to_ascii_uppercase();
        let well_formed = code.len() == ROOM_CODE_LEN
            && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b));
        if !well_formed {
            return Err(ProtocolError::new(format!(
                "Room code must be {} letters or digits",
                ROOM_CODE_LEN
            )));
        }
        Ok(Self(code))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    #[track_caller]
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

/// Opaque identity of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocates a fresh identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RoomStatus {
    /// Fewer than two occupants.
    Waiting,
    /// Both seats filled and the game is live.
    Playing,
    /// The game reached a win or draw.
    Finished,
}

/// Terminal result of a game.
///
/// Serializes as `"X"`, `"O"` or `"draw"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Winner {
    /// A symbol completed a line.
    #[display("{_0}")]
    Symbol(Symbol),
    /// Board filled with no line.
    #[display("draw")]
    Draw,
}

impl TryFrom<String> for Winner {
    type Error = ProtocolError;

    #[track_caller]
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "X" => Ok(Winner::Symbol(Symbol::X)),
            "O" => Ok(Winner::Symbol(Symbol::O)),
            "draw" => Ok(Winner::Draw),
            other => Err(ProtocolError::new(format!("Unknown winner {:?}", other))),
        }
    }
}

impl From<Winner> for String {
    fn from(winner: Winner) -> Self {
        winner.to_string()
    }
}

/// Authoritative state of one room.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Room {
    /// Code the room is stored under.
    code: RoomCode,
    /// Current board.
    board: Board,
    /// Symbol expected to move next.
    current_turn: Symbol,
    /// Lifecycle state.
    status: RoomStatus,
    /// Result once finished.
    winner: Option<Winner>,
    /// Completed line when a symbol won.
    winning_line: Option<[usize; 3]>,
    /// Seat assignments.
    occupants: BTreeMap<Symbol, ConnectionId>,
    /// When the room was created.
    created_at: DateTime<Utc>,
}

impl Room {
    /// Creates an empty room waiting for players.
    #[instrument]
    pub fn new(code: RoomCode) -> Self {
        Self {
            code,
            board: Board::new(),
            current_turn: Symbol::X,
            status: RoomStatus::Waiting,
            winner: None,
            winning_line: None,
            occupants: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Returns the connection seated as `symbol`.
    pub fn occupant(&self, symbol: Symbol) -> Option<ConnectionId> {
        self.occupants.get(&symbol).copied()
    }

    /// Returns the symbol held by `id`, if seated here.
    pub fn symbol_of(&self, id: ConnectionId) -> Option<Symbol> {
        self.occupants
            .iter()
            .find_map(|(symbol, occupant)| (*occupant == id).then_some(*symbol))
    }

    /// Number of filled seats.
    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    /// Connections currently seated, X first.
    pub fn occupant_ids(&self) -> Vec<ConnectionId> {
        self.occupants.values().copied().collect()
    }

    /// Seats `id` as `symbol`.
    pub(crate) fn seat(&mut self, symbol: Symbol, id: ConnectionId) {
        self.occupants.insert(symbol, id);
    }

    /// Frees the seat held by `symbol`.
    pub(crate) fn unseat(&mut self, symbol: Symbol) {
        self.occupants.remove(&symbol);
    }

    /// Clears the game back to an empty board with X to move.
    ///
    /// Seats are kept; `status` is set to the given value.
    pub(crate) fn clear_game(&mut self, status: RoomStatus) {
        self.apply(RoomUpdate {
            board: Some(Board::new()),
            current_turn: Some(Symbol::X),
            status: Some(status),
            winner: Some(None),
            winning_line: Some(None),
        });
    }

    /// Merges the set fields of `update` into this room.
    pub fn apply(&mut self, update: RoomUpdate) {
        let RoomUpdate {
            board,
            current_turn,
            status,
            winner,
            winning_line,
        } = update;
        if let Some(board) = board {
            self.board = board;
        }
        if let Some(turn) = current_turn {
            self.current_turn = turn;
        }
        if let Some(status) = status {
            self.status = status;
        }
        if let Some(winner) = winner {
            self.winner = winner;
        }
        if let Some(line) = winning_line {
            self.winning_line = line;
        }
    }

    /// Builds the client-facing view. Connection identities are not exposed.
    pub fn view(&self) -> RoomView {
        RoomView {
            board: self.board,
            current_turn: self.current_turn,
            status: self.status,
            winner: self.winner,
            winning_line: self.winning_line,
            players: Seats {
                x: self.occupants.contains_key(&Symbol::X),
                o: self.occupants.contains_key(&Symbol::O),
            },
        }
    }
}

/// Partial room update. `None` leaves a field untouched.
///
/// `winner` and `winning_line` are doubly optional so they can be cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomUpdate {
    /// New board.
    pub board: Option<Board>,
    /// New turn.
    pub current_turn: Option<Symbol>,
    /// New status.
    pub status: Option<RoomStatus>,
    /// New winner, or `Some(None)` to clear.
    pub winner: Option<Option<Winner>>,
    /// New winning line, or `Some(None)` to clear.
    pub winning_line: Option<Option<[usize; 3]>>,
}

/// Which seats are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seats {
    /// Seat X is filled.
    #[serde(rename = "X")]
    pub x: bool,
    /// Seat O is filled.
    #[serde(rename = "O")]
    pub o: bool,
}

/// Public snapshot of a room pushed to its occupants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    /// Board squares in row-major order.
    pub board: Board,
    /// Symbol to move next.
    pub current_turn: Symbol,
    /// Lifecycle state.
    pub status: RoomStatus,
    /// Result once finished.
    pub winner: Option<Winner>,
    /// Completed line when a symbol won.
    pub winning_line: Option<[usize; 3]>,
    /// Seat occupancy.
    pub players: Seats,
}

/// What the store knows about one connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
pub struct Player {
    /// Room the connection sits in.
    room: Option<RoomCode>,
    /// Symbol held in that room.
    symbol: Option<Symbol>,
}

impl Player {
    /// Records a seat.
    pub(crate) fn seat(&mut self, room: RoomCode, symbol: Symbol) {
        self.room = Some(room);
        self.symbol = Some(symbol);
    }

    /// Forgets the seat, returning what was held.
    pub(crate) fn unseat(&mut self) -> Option<(RoomCode, Symbol)> {
        match (self.room.take(), self.symbol.take()) {
            (Some(room), Some(symbol)) => Some((room, symbol)),
            _ => None,
        }
    }
}
