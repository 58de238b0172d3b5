//! Room lifecycle state machine.
//!
//! Rooms move `waiting -> playing -> finished`, back to `playing` on a
//! rematch, and to `waiting` whenever an occupant leaves. Each client action
//! is validated against the room under the store lock, the board engine
//! computes its effect, the store commits, and the broadcaster pushes the
//! new view.

use crate::error::RoomError;
use crate::games::tictactoe::{Outcome, Symbol, apply_move, evaluate, is_valid_move};
use crate::gateway::Broadcaster;
use crate::protocol::{ClientMessage, JoinRoomResponse, RoomCreated, ServerMessage};
use crate::room::{ConnectionId, Room, RoomCode, RoomStatus, RoomUpdate, Winner};
use crate::store::{Departure, RoomStore, Seated};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};

/// How many random codes to try before giving up on room creation.
pub const MAX_CODE_ATTEMPTS: usize = 10;

/// Drives rooms through their lifecycle in response to client actions.
#[derive(Debug)]
pub struct SessionCoordinator {
    store: Arc<RoomStore>,
    broadcaster: Broadcaster,
    rng: Mutex<StdRng>,
}

impl SessionCoordinator {
    /// Creates a coordinator with an entropy-seeded code generator.
    #[instrument(skip_all)]
    pub fn new(store: Arc<RoomStore>, broadcaster: Broadcaster) -> Self {
        Self::with_rng(store, broadcaster, StdRng::from_entropy())
    }

    /// Creates a coordinator drawing room codes from `rng`.
    pub fn with_rng(store: Arc<RoomStore>, broadcaster: Broadcaster, rng: StdRng) -> Self {
        info!("Creating session coordinator");
        Self {
            store,
            broadcaster,
            rng: Mutex::new(rng),
        }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<RoomStore> {
        &self.store
    }

    /// Records a newly opened connection.
    #[instrument(skip(self))]
    pub fn connect(&self, id: ConnectionId) {
        self.store.register_connection(id);
    }

    /// Tears down a closed connection, vacating its seat.
    #[instrument(skip(self))]
    pub fn disconnect(&self, id: ConnectionId) {
        if let Some(departure) = self.store.unregister_connection(id) {
            self.announce_departure(id, departure);
        }
        info!("Connection closed");
    }

    /// Applies a client action and replies to the requester.
    #[instrument(skip(self))]
    pub fn handle(&self, id: ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::CreateRoom => {
                if let Err(e) = self.create_room(id) {
                    self.broadcaster.send_to(id, ServerMessage::error(e));
                }
            }
            ClientMessage::JoinRoom { room_code } => {
                if let Err(e) = self.join_room(id, &room_code) {
                    self.broadcaster
                        .send_to(id, JoinRoomResponse::rejected(e).into());
                }
            }
            ClientMessage::MakeMove {
                room_code,
                cell_index,
            } => {
                if let Err(e) = self.make_move(id, &room_code, cell_index) {
                    self.broadcaster.send_to(id, ServerMessage::error(e));
                }
            }
            ClientMessage::ResetGame { room_code } => {
                if let Err(e) = self.reset_game(id, &room_code) {
                    self.broadcaster.send_to(id, ServerMessage::error(e));
                }
            }
            ClientMessage::LeaveRoom => {
                self.leave_room(id);
            }
        }
    }

    /// Opens a room with a fresh code and seats the requester as X.
    ///
    /// Replies `roomCreated` to the requester, then broadcasts the room. A
    /// requester seated elsewhere leaves that room in the same store step.
    #[instrument(skip(self))]
    pub fn create_room(&self, id: ConnectionId) -> Result<(RoomCode, Symbol), RoomError> {
        let (code, seated) = self.allocate_room(id)?;
        if let Some(departure) = seated.departure {
            self.announce_departure(id, departure);
        }
        self.broadcaster.send_to(
            id,
            RoomCreated {
                room_code: code.clone(),
                symbol: seated.symbol,
            }
            .into(),
        );
        self.broadcaster.broadcast_state(&self.store, &code);
        Ok((code, seated.symbol))
    }

    fn allocate_room(&self, creator: ConnectionId) -> Result<(RoomCode, Seated), RoomError> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = RoomCode::generate(&mut *rng);
            match self.store.open_room(code.clone(), creator) {
                Ok(seated) => return Ok((code, seated)),
                Err(RoomError::RoomExists) => {
                    debug!(attempt, %code, "Room code collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        warn!(attempts = MAX_CODE_ATTEMPTS, "No free room code found");
        Err(RoomError::RoomCreationFailed)
    }

    /// Seats the requester in `code`, replies `joinRoomResponse`, then
    /// broadcasts the room.
    ///
    /// A requester seated in another room gives up that seat in the same
    /// store step, and keeps it if the join is rejected.
    #[instrument(skip(self))]
    pub fn join_room(&self, id: ConnectionId, code: &RoomCode) -> Result<Symbol, RoomError> {
        let Seated { symbol, departure } = self.store.switch_room(id, code)?;
        if let Some(departure) = departure {
            self.announce_departure(id, departure);
        }
        self.broadcaster
            .send_to(id, JoinRoomResponse::joined(symbol).into());
        self.broadcaster.broadcast_state(&self.store, code);
        Ok(symbol)
    }

    /// Places the requester's symbol at `index`.
    ///
    /// Rejections leave the room untouched and are reported only to the
    /// requester by [`handle`](Self::handle).
    #[instrument(skip(self))]
    pub fn make_move(
        &self,
        id: ConnectionId,
        code: &RoomCode,
        index: usize,
    ) -> Result<Room, RoomError> {
        let (outcome, room) = self.store.modify_room(code, |room| {
            let symbol = room.symbol_of(id).ok_or(RoomError::NotInRoom)?;
            if *room.status() != RoomStatus::Playing {
                return Err(RoomError::GameNotInProgress);
            }
            if symbol != *room.current_turn() {
                return Err(RoomError::NotYourTurn);
            }
            if !is_valid_move(room.board(), index) {
                return Err(RoomError::InvalidMove { index });
            }

            let board = apply_move(room.board(), index, symbol)?;
            let outcome = evaluate(&board);
            let update = match outcome {
                Outcome::Pending => RoomUpdate {
                    board: Some(board),
                    current_turn: Some(symbol.next_turn()),
                    ..RoomUpdate::default()
                },
                Outcome::Won { symbol, line } => RoomUpdate {
                    board: Some(board),
                    status: Some(RoomStatus::Finished),
                    winner: Some(Some(Winner::Symbol(symbol))),
                    winning_line: Some(Some(line)),
                    ..RoomUpdate::default()
                },
                Outcome::Draw => RoomUpdate {
                    board: Some(board),
                    status: Some(RoomStatus::Finished),
                    winner: Some(Some(Winner::Draw)),
                    winning_line: Some(None),
                    ..RoomUpdate::default()
                },
            };
            room.apply(update);
            Ok(outcome)
        })
        .inspect_err(|e| warn!(error = %e, "Move rejected"))?;

        match outcome {
            Outcome::Pending => debug!(next = %room.current_turn(), "Move accepted"),
            _ => info!(winner = ?room.winner(), line = ?room.winning_line(), "Game finished"),
        }
        self.broadcaster.broadcast_state(&self.store, code);
        Ok(room)
    }

    /// Starts a rematch in a finished room.
    #[instrument(skip(self))]
    pub fn reset_game(&self, id: ConnectionId, code: &RoomCode) -> Result<Room, RoomError> {
        let ((), room) = self
            .store
            .modify_room(code, |room| {
                room.symbol_of(id).ok_or(RoomError::NotInRoom)?;
                if *room.status() != RoomStatus::Finished {
                    return Err(RoomError::GameNotFinished);
                }
                room.clear_game(RoomStatus::Playing);
                Ok(())
            })
            .inspect_err(|e| warn!(error = %e, "Reset rejected"))?;

        info!("Game reset");
        self.broadcaster.broadcast_state(&self.store, code);
        Ok(room)
    }

    /// Vacates the requester's seat. No effect if it holds none.
    #[instrument(skip(self))]
    pub fn leave_room(&self, id: ConnectionId) -> Option<Departure> {
        let departure = self.store.leave_room(id)?;
        self.announce_departure(id, departure.clone());
        Some(departure)
    }

    fn announce_departure(&self, id: ConnectionId, departure: Departure) {
        let Departure { code, symbol, .. } = departure;
        self.broadcaster
            .notify_disconnect(&self.store, &code, symbol, id);
        self.broadcaster.broadcast_state(&self.store, &code);
    }
}
