//! # Concentration Server Library
//!
//! This library provides the server side of the Concentration memory game.
//! Every client that connects gets its own shuffled board and plays alone
//! against it over a line-based text protocol.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Board
//! The server is the only party that knows where the letters are. Clients
//! learn a card's letter only when they reveal it, and the server decides
//! whether two revealed cards form a pair.
//!
//! ### Session Management
//! Handles the complete lifecycle of a client connection:
//! - Board size announcement on connect
//! - Request parsing and validation
//! - Match and mismatch resolution, including the pacing delay that keeps a
//!   mismatched pair visible before it is turned back over
//! - End-of-game notification and socket shutdown
//!
//! ## Architecture Design
//!
//! ### Task Per Connection
//! The acceptor spawns one tokio task per accepted connection. The task owns
//! the socket and the board outright, so sessions never share mutable state
//! and no locking is needed. The only thing the acceptor shares is an atomic
//! counter used to number sessions in the logs.
//!
//! ### Strictly Sequential Sessions
//! Inside a session every step is awaited in order: read a line, update the
//! board, write the replies. A slow client only ever stalls its own task.
//!
//! ## Module Organization
//!
//! ### Board Module (`board`)
//! Card layout and the reveal state machine:
//! - Randomized pairing of symbols
//! - Pending first card of a turn
//! - Match counting and end-of-game detection
//!
//! ### Session Module (`session`)
//! The per-connection protocol loop and its error taxonomy:
//! - Recoverable request errors answered with `ERROR`
//! - Fatal protocol violations and transport failures that close the socket
//!
//! ### Network Module (`network`)
//! Listening socket, accept loop and server configuration.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         address: "127.0.0.1:5555".to_string(),
//!         dimension: 4,
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = Server::new(config).await?;
//!     server.run().await;
//!
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod network;
pub mod session;
