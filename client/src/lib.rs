//! # Concentration Client Library
//!
//! This library provides the graphical client for the Concentration memory
//! game. The client never knows where the letters are: it sends the server a
//! request for every card the player clicks and draws whatever the server
//! answers.
//!
//! ## Architecture Overview
//!
//! The render loop and the network connection run on different threads and
//! only talk through channels. Clicks travel to the network thread as reveal
//! requests; every line the server sends comes back as a [`network::GameEvent`]
//! that the render loop applies to its local model before drawing.
//!
//! ## Module Organization
//!
//! ### Model Module (`model`)
//! The client's view of the board:
//! - Letters revealed so far, face-down cards shown as `.`
//! - Move and match counters
//! - Click validation so only useful requests reach the server
//!
//! ### Network Module (`network`)
//! Manages the server connection:
//! - `BOARD_DIM` handshake
//! - Request forwarding and response parsing
//! - Disconnect and error reporting as events
//!
//! ### Rendering Module (`rendering`)
//! Draws the card grid and the status bar, and owns the screen geometry used
//! to turn mouse positions into cells.
//!
//! ### Input Module (`input`)
//! Mouse click edge detection.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::model::ClientBoard;
//! use client::network::Controller;
//! use shared::Position;
//!
//! let mut controller = Controller::start("127.0.0.1:5555".to_string());
//! let mut board = ClientBoard::new();
//!
//! // Once per frame
//! for event in controller.poll_events() {
//!     board.apply(&event);
//! }
//! if board.is_valid(0, 0) && controller.request_reveal(Position::new(0, 0)) {
//!     board.note_request();
//! }
//! ```

pub mod input;
pub mod model;
pub mod network;
pub mod rendering;
