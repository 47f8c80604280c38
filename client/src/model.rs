//! Client-side view of the board, built only from what the server has told us

use crate::network::GameEvent;
use log::{debug, warn};
use shared::{Position, ServerMessage, HIDDEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
    GameOver,
}

/// Known letters, counters and status of the game being played
#[derive(Debug, Clone)]
pub struct ClientBoard {
    dimension: usize,
    cards: Vec<Vec<char>>,
    status: Status,
    last_error: Option<String>,
    moves: u32,
    matches: usize,
    /// Face-up cards of the turn in progress
    unresolved: Vec<Position>,
    /// Reveal requests sent but not answered yet
    in_flight: usize,
}

impl ClientBoard {
    pub fn new() -> Self {
        Self {
            dimension: 0,
            cards: Vec::new(),
            status: Status::Ok,
            last_error: None,
            moves: 0,
            matches: 0,
            unresolved: Vec::new(),
            in_flight: 0,
        }
    }

    /// Resets the board to `dimension`×`dimension` face-down cards
    pub fn init(&mut self, dimension: usize) {
        self.dimension = dimension;
        self.cards = vec![vec![HIDDEN; dimension]; dimension];
        self.moves = 0;
        self.matches = 0;
        self.unresolved.clear();
        self.in_flight = 0;
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn matches(&self) -> usize {
        self.matches
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub fn is_hidden(&self, row: usize, col: usize) -> bool {
        self.letter(row, col) == HIDDEN
    }

    /// The card's letter, or [`HIDDEN`] if it is face down or off the board
    pub fn letter(&self, row: usize, col: usize) -> char {
        self.cards
            .get(row)
            .and_then(|cells| cells.get(col))
            .copied()
            .unwrap_or(HIDDEN)
    }

    /// Face up and already paired
    pub fn is_matched(&self, row: usize, col: usize) -> bool {
        !self.is_hidden(row, col) && !self.unresolved.contains(&Position::new(row, col))
    }

    pub fn reveal_card(&mut self, position: Position, letter: char) {
        if let Some(cell) = self
            .cards
            .get_mut(position.row)
            .and_then(|cells| cells.get_mut(position.col))
        {
            *cell = letter;
            self.moves += 1;
            self.unresolved.push(position);
        }
    }

    pub fn set_match(&mut self, first: Position, second: Position) {
        self.matches += 1;
        self.unresolved.retain(|p| *p != first && *p != second);
    }

    pub fn set_mismatch(&mut self, first: Position, second: Position) {
        for position in [first, second] {
            if let Some(cell) = self
                .cards
                .get_mut(position.row)
                .and_then(|cells| cells.get_mut(position.col))
            {
                *cell = HIDDEN;
            }
        }
        self.unresolved.retain(|p| *p != first && *p != second);
    }

    /// Records that a reveal request was sent
    pub fn note_request(&mut self) {
        self.in_flight += 1;
    }

    /// Whether a click on this cell should be sent to the server
    ///
    /// The cell must be on the board and face down, no request may be
    /// waiting for its `CARD`, and a turn with two face-up cards must have
    /// been resolved first.
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        row < self.dimension
            && col < self.dimension
            && self.is_hidden(row, col)
            && self.in_flight == 0
            && self.unresolved.len() < 2
            && self.status != Status::GameOver
    }

    pub fn should_end(&self) -> bool {
        self.dimension > 0 && self.matches * 2 == self.dimension * self.dimension
    }

    /// Applies one event from the network controller
    pub fn apply(&mut self, event: &GameEvent) {
        match event {
            GameEvent::Message(message) => self.apply_message(message),
            GameEvent::Failed(reason) => {
                warn!("Connection error: {}", reason);
                self.fail(reason.clone());
            }
            GameEvent::Disconnected => {
                if self.status != Status::GameOver {
                    self.fail("Connection closed by server".to_string());
                }
            }
        }
    }

    fn apply_message(&mut self, message: &ServerMessage) {
        debug!("Applying {}", message);
        match message {
            ServerMessage::BoardDim { dimension } => self.init(*dimension),
            ServerMessage::Card { position, letter } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if self.status == Status::Error {
                    self.status = Status::Ok;
                }
                self.reveal_card(*position, *letter);
            }
            ServerMessage::Match { first, second } => self.set_match(*first, *second),
            ServerMessage::Mismatch { first, second } => self.set_mismatch(*first, *second),
            ServerMessage::Error { description } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.fail(description.clone());
            }
            ServerMessage::GameOver => self.status = Status::GameOver,
        }
    }

    fn fail(&mut self, reason: String) {
        self.status = Status::Error;
        self.last_error = Some(reason);
    }
}

impl Default for ClientBoard {
    fn default() -> Self {
        Self::new()
    }
}
