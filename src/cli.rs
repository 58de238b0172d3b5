//! Command-line interface for strictly_rooms.

use clap::{Parser, Subcommand};

/// Strictly Rooms - two-player tic-tac-toe rooms over WebSockets
#[derive(Parser, Debug)]
#[command(name = "strictly_rooms")]
#[command(about = "Room-coded tic-tac-toe server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the WebSocket room server
    Serve {
        /// Port to bind to (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config and HOST)
        #[arg(long)]
        host: Option<String>,

        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,
    },
}
