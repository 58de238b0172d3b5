//! Strictly Rooms library - room-coded two-player tic-tac-toe
//!
//! Clients connect over a WebSocket, open or join a room by its six
//! character code, and play until a win or draw, with instant rematches.
//!
//! # Architecture
//!
//! - **Board engine**: pure move validation and win/draw detection
//! - **Room store**: single authority over rooms and connection records
//! - **Session coordinator**: the per-room state machine
//! - **Broadcaster**: pushes room views to seated connections
//! - **Server**: axum WebSocket front end
//!
//! # Example
//!
//! ```no_run
//! use strictly_rooms::serve;
//!
//! # async fn example() -> anyhow::Result<()> {
//! serve("127.0.0.1:3000".to_string()).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod error;
mod games;
mod gateway;
mod protocol;
mod room;
mod server;
mod session;
mod store;

// Crate-level exports - Errors
pub use error::{ConfigError, ProtocolError, RoomError};

// Crate-level exports - Configuration
pub use config::ServerConfig;

// Crate-level exports - Board engine
pub use games::tictactoe::{
    BOARD_SIZE, Board, Outcome, Square, Symbol, WINNING_LINES, apply_move, evaluate,
    is_valid_move,
};

// Crate-level exports - Rooms and connections
pub use room::{
    ConnectionId, Player, ROOM_CODE_ALPHABET, ROOM_CODE_LEN, Room, RoomCode, RoomStatus,
    RoomUpdate, RoomView, Seats, Winner,
};
pub use store::{Departure, RoomStore, Seated, StoreStats};

// Crate-level exports - Coordination and delivery
pub use gateway::{
    Broadcaster, ConnectionRegistry, ConnectionSender, OUTBOUND_CAPACITY, Transport,
};
pub use session::{MAX_CODE_ATTEMPTS, SessionCoordinator};

// Crate-level exports - Wire protocol
pub use protocol::{
    ClientMessage, Envelope, ErrorMessage, JoinRoomResponse, PlayerDisconnected, RoomCreated,
    ServerMessage,
};

// Crate-level exports - Server
pub use server::{AppState, router, serve};
