//! Authoritative in-memory room and connection maps.

use crate::error::RoomError;
use crate::games::tictactoe::Symbol;
use crate::room::{ConnectionId, Player, Room, RoomCode, RoomStatus, RoomUpdate};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use strum::IntoEnumIterator;
use tracing::{debug, info, instrument, warn};

/// A seat vacated by [`RoomStore::leave_room`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// Room that was left.
    pub code: RoomCode,
    /// Symbol that was freed.
    pub symbol: Symbol,
    /// Occupants still seated.
    pub remaining: Vec<ConnectionId>,
}

/// Room and connection counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Rooms in the map, dormant ones included.
    pub rooms: usize,
    /// Registered connections.
    pub connections: usize,
}

/// Seat taken by [`RoomStore::switch_room`] or [`RoomStore::open_room`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seated {
    /// Symbol assigned.
    pub symbol: Symbol,
    /// Seat given up in another room, if any.
    pub departure: Option<Departure>,
}

#[derive(Debug, Default)]
struct StoreState {
    rooms: HashMap<RoomCode, Room>,
    players: HashMap<ConnectionId, Player>,
}

impl StoreState {
    fn seat(&mut self, id: ConnectionId, code: &RoomCode) -> Result<Seated, RoomError> {
        let room = self.rooms.get(code).ok_or_else(|| {
            warn!(%id, %code, "Join for unknown room");
            RoomError::RoomNotFound
        })?;
        if let Some(symbol) = room.symbol_of(id) {
            debug!(%id, %code, %symbol, "Already seated");
            return Ok(Seated {
                symbol,
                departure: None,
            });
        }
        let symbol = Symbol::iter()
            .find(|s| room.occupant(*s).is_none())
            .ok_or_else(|| {
                warn!(%id, %code, "Room already has 2 players");
                RoomError::RoomFull
            })?;

        let departure = self.leave(id);

        let room = self.rooms.get_mut(code).ok_or(RoomError::RoomNotFound)?;
        room.seat(symbol, id);
        if room.occupant_count() == 2 {
            room.apply(RoomUpdate {
                status: Some(RoomStatus::Playing),
                ..RoomUpdate::default()
            });
            info!(%code, "Room full, game started");
        }
        self.players
            .entry(id)
            .or_default()
            .seat(code.clone(), symbol);

        info!(%id, %code, %symbol, "Player joined room");
        Ok(Seated { symbol, departure })
    }

    fn leave(&mut self, id: ConnectionId) -> Option<Departure> {
        let (code, symbol) = self.players.get_mut(&id)?.unseat()?;
        let Some(room) = self.rooms.get_mut(&code) else {
            warn!(%id, %code, "Player referenced a missing room");
            return None;
        };

        room.unseat(symbol);
        // Losing any occupant ends the game in progress.
        room.clear_game(RoomStatus::Waiting);

        info!(%id, %code, %symbol, remaining = room.occupant_count(), "Player left room");
        Some(Departure {
            code,
            symbol,
            remaining: room.occupant_ids(),
        })
    }
}

/// Single authority over rooms and connection records.
///
/// One lock guards both maps, so every operation here is atomic with
/// respect to every other. No operation awaits or performs I/O while
/// holding it.
#[derive(Debug, Default)]
pub struct RoomStore {
    state: Mutex<StoreState>,
}

impl RoomStore {
    /// Creates an empty store.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating room store");
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // The maps hold no cross-entry invariants a panicking writer could
        // leave half-applied.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a fresh waiting room under `code`.
    #[instrument(skip(self))]
    pub fn create_room(&self, code: RoomCode) -> Result<Room, RoomError> {
        let mut state = self.lock();
        if state.rooms.contains_key(&code) {
            debug!(%code, "Room code already taken");
            return Err(RoomError::RoomExists);
        }
        let room = Room::new(code.clone());
        state.rooms.insert(code.clone(), room.clone());
        info!(%code, "Created room");
        Ok(room)
    }

    /// Returns a snapshot of the room.
    #[instrument(skip(self))]
    pub fn get_room(&self, code: &RoomCode) -> Option<Room> {
        let room = self.lock().rooms.get(code).cloned();
        if room.is_none() {
            debug!(%code, "Room not found");
        }
        room
    }

    /// Returns a snapshot of the connection record.
    #[instrument(skip(self))]
    pub fn get_player(&self, id: ConnectionId) -> Option<Player> {
        self.lock().players.get(&id).cloned()
    }

    /// Merges `update` into the room. Does nothing if the room is absent.
    #[instrument(skip(self, update))]
    pub fn update_room(&self, code: &RoomCode, update: RoomUpdate) -> Option<Room> {
        let mut state = self.lock();
        let room = state.rooms.get_mut(code)?;
        room.apply(update);
        debug!(%code, status = %room.status(), "Room updated");
        Some(room.clone())
    }

    /// Runs `f` against the room under the store lock.
    ///
    /// `f` works on a copy which is committed only if it returns `Ok`, so a
    /// rejected action never leaves a partial change behind.
    #[instrument(skip(self, f))]
    pub fn modify_room<T, F>(&self, code: &RoomCode, f: F) -> Result<(T, Room), RoomError>
    where
        F: FnOnce(&mut Room) -> Result<T, RoomError>,
    {
        let mut state = self.lock();
        let slot = state.rooms.get_mut(code).ok_or(RoomError::RoomNotFound)?;
        let mut draft = slot.clone();
        let value = f(&mut draft)?;
        *slot = draft.clone();
        Ok((value, draft))
    }

    /// Seats `id` in the first free slot, X before O.
    ///
    /// Filling the second seat starts the game. A connection already seated
    /// in this room keeps its symbol; one seated elsewhere leaves that room
    /// first.
    #[instrument(skip(self))]
    pub fn join_room(&self, id: ConnectionId, code: &RoomCode) -> Result<Symbol, RoomError> {
        self.switch_room(id, code).map(|seated| seated.symbol)
    }

    /// Like [`join_room`](Self::join_room), also reporting the seat given up
    /// elsewhere. The old seat is kept if the join fails.
    #[instrument(skip(self))]
    pub fn switch_room(&self, id: ConnectionId, code: &RoomCode) -> Result<Seated, RoomError> {
        self.lock().seat(id, code)
    }

    /// Inserts a fresh room under `code` and seats `creator` as X in the
    /// same step, leaving any room `creator` sat in before.
    #[instrument(skip(self))]
    pub fn open_room(&self, code: RoomCode, creator: ConnectionId) -> Result<Seated, RoomError> {
        let mut state = self.lock();
        if state.rooms.contains_key(&code) {
            debug!(%code, "Room code already taken");
            return Err(RoomError::RoomExists);
        }
        state.rooms.insert(code.clone(), Room::new(code.clone()));
        info!(%code, "Created room");
        state.seat(creator, &code)
    }

    /// Frees the seat held by `id`. No effect if it holds none.
    ///
    /// The room is kept in the map; with its game cleared it waits for
    /// new players.
    #[instrument(skip(self))]
    pub fn leave_room(&self, id: ConnectionId) -> Option<Departure> {
        self.lock().leave(id)
    }

    /// Records a newly opened connection.
    #[instrument(skip(self))]
    pub fn register_connection(&self, id: ConnectionId) {
        self.lock().players.entry(id).or_default();
        debug!(%id, "Connection registered");
    }

    /// Forgets a connection, leaving its room first.
    #[instrument(skip(self))]
    pub fn unregister_connection(&self, id: ConnectionId) -> Option<Departure> {
        let mut state = self.lock();
        let departure = state.leave(id);
        state.players.remove(&id);
        debug!(%id, "Connection unregistered");
        departure
    }

    /// Counts rooms and connections.
    pub fn stats(&self) -> StoreStats {
        let state = self.lock();
        StoreStats {
            rooms: state.rooms.len(),
            connections: state.players.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::tictactoe::Board;

    fn code(s: &str) -> RoomCode {
        RoomCode::parse(s).unwrap()
    }

    #[test]
    fn test_create_room_rejects_duplicates() {
        let store = RoomStore::new();
        store.create_room(code("AAAAAA")).unwrap();
        assert_eq!(store.create_room(code("AAAAAA")), Err(RoomError::RoomExists));
    }

    #[test]
    fn test_join_assigns_x_then_o_then_full() {
        let store = RoomStore::new();
        let room = code("AAAAAA");
        store.create_room(room.clone()).unwrap();

        let (a, b, c) = (ConnectionId::new(), ConnectionId::new(), ConnectionId::new());
        assert_eq!(store.join_room(a, &room), Ok(Symbol::X));
        assert_eq!(*store.get_room(&room).unwrap().status(), RoomStatus::Waiting);
        assert_eq!(store.join_room(b, &room), Ok(Symbol::O));
        assert_eq!(*store.get_room(&room).unwrap().status(), RoomStatus::Playing);
        assert_eq!(store.join_room(c, &room), Err(RoomError::RoomFull));
        assert_eq!(store.get_player(c), None);
    }

    #[test]
    fn test_join_unknown_room() {
        let store = RoomStore::new();
        assert_eq!(
            store.join_room(ConnectionId::new(), &code("ZZZZZZ")),
            Err(RoomError::RoomNotFound)
        );
    }

    #[test]
    fn test_rejoin_same_room_keeps_symbol() {
        let store = RoomStore::new();
        let room = code("AAAAAA");
        store.create_room(room.clone()).unwrap();
        let a = ConnectionId::new();
        assert_eq!(store.join_room(a, &room), Ok(Symbol::X));
        assert_eq!(store.join_room(a, &room), Ok(Symbol::X));
        assert_eq!(store.get_room(&room).unwrap().occupant_count(), 1);
    }

    #[test]
    fn test_join_elsewhere_leaves_previous_room() {
        let store = RoomStore::new();
        let (first, second) = (code("AAAAAA"), code("BBBBBB"));
        store.create_room(first.clone()).unwrap();
        store.create_room(second.clone()).unwrap();
        let a = ConnectionId::new();
        store.join_room(a, &first).unwrap();
        store.join_room(a, &second).unwrap();

        assert_eq!(store.get_room(&first).unwrap().occupant_count(), 0);
        assert_eq!(store.get_player(a).unwrap().room().as_ref(), Some(&second));
    }

    #[test]
    fn test_switch_room_reports_departure() {
        let store = RoomStore::new();
        let (first, second) = (code("AAAAAA"), code("BBBBBB"));
        store.create_room(first.clone()).unwrap();
        store.create_room(second.clone()).unwrap();
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        store.join_room(a, &first).unwrap();
        store.join_room(b, &first).unwrap();

        let seated = store.switch_room(b, &second).unwrap();
        assert_eq!(seated.symbol, Symbol::X);
        assert_eq!(
            seated.departure,
            Some(Departure {
                code: first.clone(),
                symbol: Symbol::O,
                remaining: vec![a],
            })
        );
    }

    #[test]
    fn test_switch_to_full_room_keeps_old_seat() {
        let store = RoomStore::new();
        let (home, full) = (code("AAAAAA"), code("BBBBBB"));
        store.create_room(home.clone()).unwrap();
        store.create_room(full.clone()).unwrap();
        let (a, b, c, d) = (
            ConnectionId::new(),
            ConnectionId::new(),
            ConnectionId::new(),
            ConnectionId::new(),
        );
        store.join_room(a, &home).unwrap();
        store.join_room(b, &home).unwrap();
        store.join_room(c, &full).unwrap();
        store.join_room(d, &full).unwrap();

        assert_eq!(store.switch_room(b, &full), Err(RoomError::RoomFull));
        assert_eq!(store.get_player(b).unwrap().room().as_ref(), Some(&home));
        let room = store.get_room(&home).unwrap();
        assert_eq!(room.occupant(Symbol::O), Some(b));
        assert_eq!(*room.status(), RoomStatus::Playing);
    }

    #[test]
    fn test_open_room_seats_creator_as_x() {
        let store = RoomStore::new();
        let (old, new) = (code("AAAAAA"), code("BBBBBB"));
        store.create_room(old.clone()).unwrap();
        let a = ConnectionId::new();
        store.join_room(a, &old).unwrap();

        let seated = store.open_room(new.clone(), a).unwrap();
        assert_eq!(seated.symbol, Symbol::X);
        assert_eq!(seated.departure.map(|d| d.code), Some(old));
        assert_eq!(store.get_room(&new).unwrap().occupant(Symbol::X), Some(a));
        assert_eq!(
            store.open_room(new, ConnectionId::new()).unwrap_err(),
            RoomError::RoomExists
        );
    }

    #[test]
    fn test_leave_mid_game_reverts_to_waiting() {
        let store = RoomStore::new();
        let room = code("AAAAAA");
        store.create_room(room.clone()).unwrap();
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        store.join_room(a, &room).unwrap();
        store.join_room(b, &room).unwrap();
        store
            .modify_room(&room, |r| {
                r.apply(RoomUpdate {
                    board: Some(crate::games::tictactoe::apply_move(r.board(), 4, Symbol::X)?),
                    current_turn: Some(Symbol::O),
                    ..RoomUpdate::default()
                });
                Ok(())
            })
            .unwrap();

        let departure = store.leave_room(a).unwrap();
        assert_eq!(departure.symbol, Symbol::X);
        assert_eq!(departure.remaining, vec![b]);

        let snapshot = store.get_room(&room).unwrap();
        assert_eq!(*snapshot.status(), RoomStatus::Waiting);
        assert_eq!(*snapshot.board(), Board::new());
        assert_eq!(*snapshot.current_turn(), Symbol::X);
        assert_eq!(snapshot.occupant(Symbol::O), Some(b));
    }

    #[test]
    fn test_last_leave_keeps_dormant_room() {
        let store = RoomStore::new();
        let room = code("AAAAAA");
        store.create_room(room.clone()).unwrap();
        let a = ConnectionId::new();
        store.join_room(a, &room).unwrap();
        store.leave_room(a).unwrap();

        let snapshot = store.get_room(&room).unwrap();
        assert_eq!(snapshot.occupant_count(), 0);
        assert_eq!(*snapshot.status(), RoomStatus::Waiting);
        assert_eq!(store.join_room(ConnectionId::new(), &room), Ok(Symbol::X));
    }

    #[test]
    fn test_leave_without_room_is_noop() {
        let store = RoomStore::new();
        let a = ConnectionId::new();
        store.register_connection(a);
        assert_eq!(store.leave_room(a), None);
        assert_eq!(store.leave_room(ConnectionId::new()), None);
        assert_eq!(store.get_player(a), Some(Player::default()));
    }

    #[test]
    fn test_modify_room_discards_on_error() {
        let store = RoomStore::new();
        let room = code("AAAAAA");
        store.create_room(room.clone()).unwrap();
        let result: Result<((), Room), _> = store.modify_room(&room, |r| {
            r.apply(RoomUpdate {
                status: Some(RoomStatus::Finished),
                ..RoomUpdate::default()
            });
            Err(RoomError::NotYourTurn)
        });
        assert_eq!(result.unwrap_err(), RoomError::NotYourTurn);
        assert_eq!(*store.get_room(&room).unwrap().status(), RoomStatus::Waiting);
    }

    #[test]
    fn test_update_room_absent_is_noop() {
        let store = RoomStore::new();
        assert!(store.update_room(&code("AAAAAA"), RoomUpdate::default()).is_none());
    }

    #[test]
    fn test_unregister_removes_record_and_seat() {
        let store = RoomStore::new();
        let room = code("AAAAAA");
        store.create_room(room.clone()).unwrap();
        let a = ConnectionId::new();
        store.register_connection(a);
        store.join_room(a, &room).unwrap();
        assert_eq!(store.stats(), StoreStats { rooms: 1, connections: 1 });

        let departure = store.unregister_connection(a).unwrap();
        assert_eq!(departure.code, room);
        assert_eq!(store.get_player(a), None);
        assert_eq!(store.stats(), StoreStats { rooms: 1, connections: 0 });
    }
}
