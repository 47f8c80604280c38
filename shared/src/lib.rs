//! Protocol definitions shared by the Concentration server and clients.
//!
//! Every message is a single line of space-separated tokens. The types in this
//! crate are the only place where lines are parsed or formatted, so the server,
//! the bot and the graphical client always agree on the wire format.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5555;
pub const DEFAULT_DIMENSION: usize = 4;
/// Pause before a `MISMATCH` is sent so both cards stay visible for a moment.
pub const MISMATCH_DELAY_MS: u64 = 1000;
/// Marker used by clients for a face-down card. Never used as a card symbol.
pub const HIDDEN: char = '.';
/// Longest request line a server accepts, newline included.
pub const MAX_LINE_LENGTH: usize = 256;

/// Card symbols in the order they are handed out to pairs.
pub const SYMBOLS: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!\"#$%&'()*+,-/:;<=>?@[\\]^_`{|}~";
/// Largest even dimension whose pairs fit in [`SYMBOLS`].
pub const MAX_DIMENSION: usize = 12;

pub const BOARD_DIM: &str = "BOARD_DIM";
pub const REVEAL: &str = "REVEAL";
pub const CARD: &str = "CARD";
pub const MATCH: &str = "MATCH";
pub const MISMATCH: &str = "MISMATCH";
pub const ERROR: &str = "ERROR";
pub const GAME_OVER: &str = "GAME_OVER";

/// Returns true if a board of this size can be built with exact pairing.
pub fn is_valid_dimension(dimension: usize) -> bool {
    dimension > 0 && dimension % 2 == 0 && dimension <= MAX_DIMENSION
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The line is not a message this side of the protocol understands.
    #[error("unexpected message: {0:?}")]
    UnexpectedMessage(String),
    /// A `REVEAL` with the right shape whose coordinates are not integers.
    #[error("invalid coordinate in {0:?}")]
    InvalidCoordinate(String),
    #[error("malformed {kind} message: {line:?}")]
    Malformed { kind: &'static str, line: String },
    #[error("line longer than {0} bytes")]
    LineTooLong(usize),
    #[error("line is not valid UTF-8")]
    InvalidEncoding,
}

impl ProtocolError {
    /// Recoverable errors are answered with an `ERROR` line; the rest close the connection.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProtocolError::InvalidCoordinate(_))
    }
}

/// A cell on the board, rendered on the wire as `<row> <col>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.row, self.col)
    }
}

/// Messages sent from a client to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    /// Coordinates are signed: the server answers negative ones with a bounds error.
    Reveal { row: i32, col: i32 },
}

impl fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientMessage::Reveal { row, col } => write!(f, "{} {} {}", REVEAL, row, col),
        }
    }
}

impl FromStr for ClientMessage {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = strip_line_ending(line);
        let tokens: Vec<&str> = line.split_whitespace().collect();

        if tokens.len() != 3 || tokens[0] != REVEAL {
            return Err(ProtocolError::UnexpectedMessage(line.to_string()));
        }

        match (tokens[1].parse::<i32>(), tokens[2].parse::<i32>()) {
            (Ok(row), Ok(col)) => Ok(ClientMessage::Reveal { row, col }),
            _ => Err(ProtocolError::InvalidCoordinate(line.to_string())),
        }
    }
}

/// Messages sent from the server to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    BoardDim { dimension: usize },
    Card { position: Position, letter: char },
    Match { first: Position, second: Position },
    Mismatch { first: Position, second: Position },
    Error { description: String },
    GameOver,
}

impl ServerMessage {
    pub fn invalid_coordinate() -> Self {
        ServerMessage::Error {
            description: "Invalid coordinate".to_string(),
        }
    }

    pub fn out_of_bounds(row: i32, col: i32) -> Self {
        ServerMessage::Error {
            description: format!("Coordinates out of bounds [{}][{}]", row, col),
        }
    }

    pub fn already_revealed(row: i32, col: i32) -> Self {
        ServerMessage::Error {
            description: format!("Card already revealed [{}][{}]", row, col),
        }
    }

    /// Formats the message as a newline-terminated wire line.
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::BoardDim { dimension } => write!(f, "{} {}", BOARD_DIM, dimension),
            ServerMessage::Card { position, letter } => {
                write!(f, "{} {} {}", CARD, position, letter)
            }
            ServerMessage::Match { first, second } => {
                write!(f, "{} {} {}", MATCH, first, second)
            }
            ServerMessage::Mismatch { first, second } => {
                write!(f, "{} {} {}", MISMATCH, first, second)
            }
            ServerMessage::Error { description } => write!(f, "{} {}", ERROR, description),
            ServerMessage::GameOver => write!(f, "{}", GAME_OVER),
        }
    }
}

impl FromStr for ServerMessage {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = strip_line_ending(line);
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let malformed = |kind| ProtocolError::Malformed {
            kind,
            line: line.to_string(),
        };

        match tokens.first().copied() {
            Some(BOARD_DIM) if tokens.len() == 2 => {
                let dimension = tokens[1].parse().map_err(|_| malformed(BOARD_DIM))?;
                Ok(ServerMessage::BoardDim { dimension })
            }
            Some(CARD) if tokens.len() == 4 => {
                let position = parse_position(tokens[1], tokens[2]).ok_or(malformed(CARD))?;
                let mut chars = tokens[3].chars();
                match (chars.next(), chars.next()) {
                    (Some(letter), None) => Ok(ServerMessage::Card { position, letter }),
                    _ => Err(malformed(CARD)),
                }
            }
            Some(k @ (MATCH | MISMATCH)) if tokens.len() == 5 => {
                let kind = if k == MATCH { MATCH } else { MISMATCH };
                let first = parse_position(tokens[1], tokens[2]).ok_or(malformed(kind))?;
                let second = parse_position(tokens[3], tokens[4]).ok_or(malformed(kind))?;
                if kind == MATCH {
                    Ok(ServerMessage::Match { first, second })
                } else {
                    Ok(ServerMessage::Mismatch { first, second })
                }
            }
            Some(ERROR) => {
                let description = line
                    .trim_start()
                    .strip_prefix(ERROR)
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                Ok(ServerMessage::Error { description })
            }
            Some(GAME_OVER) if tokens.len() == 1 => Ok(ServerMessage::GameOver),
            _ => Err(ProtocolError::UnexpectedMessage(line.to_string())),
        }
    }
}

fn parse_position(row: &str, col: &str) -> Option<Position> {
    Some(Position::new(row.parse().ok()?, col.parse().ok()?))
}

fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}
