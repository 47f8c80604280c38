//! Scripted client that plays a whole game against a running server.
//!
//! It reveals unseen cards in row-major order, remembers every letter it has
//! seen and turns over a known partner whenever it has one.

use clap::Parser;
use log::{debug, info};
use shared::{ClientMessage, Position, ServerMessage, DEFAULT_PORT};
use std::collections::{HashMap, HashSet};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,
}

type BoxError = Box<dyn std::error::Error>;

/// What the bot has learned about the board so far
struct Memory {
    dimension: usize,
    seen: HashMap<Position, char>,
    matched: HashSet<Position>,
}

impl Memory {
    fn new(dimension: usize) -> Self {
        Self {
            dimension,
            seen: HashMap::new(),
            matched: HashSet::new(),
        }
    }

    /// Two seen, unmatched cards with the same letter
    fn known_pair(&self) -> Option<(Position, Position)> {
        self.seen
            .iter()
            .filter(|(position, _)| !self.matched.contains(*position))
            .find_map(|(position, letter)| {
                self.partner(*position, *letter)
                    .map(|partner| (*position, partner))
            })
    }

    fn partner(&self, position: Position, letter: char) -> Option<Position> {
        self.seen
            .iter()
            .find(|(other, seen_letter)| {
                **other != position && **seen_letter == letter && !self.matched.contains(*other)
            })
            .map(|(other, _)| *other)
    }

    fn unexplored(&self) -> Option<Position> {
        (0..self.dimension)
            .flat_map(|row| (0..self.dimension).map(move |col| Position::new(row, col)))
            .find(|position| !self.seen.contains_key(position))
    }

    fn all_matched(&self) -> bool {
        self.matched.len() == self.dimension * self.dimension
    }
}

struct Connection {
    reader: BufReader<TcpStream>,
}

impl Connection {
    async fn receive(&mut self) -> Result<ServerMessage, BoxError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err("server closed the connection".into());
        }
        debug!("Received: {}", line.trim_end());
        Ok(line.parse()?)
    }

    async fn reveal(&mut self, position: Position) -> Result<char, BoxError> {
        let request = ClientMessage::Reveal {
            row: i32::try_from(position.row)?,
            col: i32::try_from(position.col)?,
        };
        debug!("Sending: {}", request);
        self.reader
            .get_mut()
            .write_all(format!("{}\n", request).as_bytes())
            .await?;

        match self.receive().await? {
            ServerMessage::Card { letter, .. } => Ok(letter),
            other => Err(format!("expected CARD, got {}", other).into()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Connecting to {}", args.server);
    let stream = TcpStream::connect(&args.server).await?;
    let mut connection = Connection {
        reader: BufReader::new(stream),
    };

    let dimension = match connection.receive().await? {
        ServerMessage::BoardDim { dimension } => dimension,
        other => return Err(format!("expected BOARD_DIM, got {}", other).into()),
    };
    info!("Playing a {}x{} board", dimension, dimension);

    let mut memory = Memory::new(dimension);
    let mut turns = 0;

    while !memory.all_matched() {
        turns += 1;

        let (first, planned) = match memory.known_pair() {
            Some((first, second)) => (first, Some(second)),
            None => (memory.unexplored().ok_or("no hidden cards left")?, None),
        };
        let letter = connection.reveal(first).await?;
        memory.seen.insert(first, letter);

        let second = planned
            .or_else(|| memory.partner(first, letter))
            .or_else(|| memory.unexplored())
            .ok_or("no second card to reveal")?;
        let letter = connection.reveal(second).await?;
        memory.seen.insert(second, letter);

        match connection.receive().await? {
            ServerMessage::Match { first, second } => {
                info!("Turn {}: matched '{}' at [{}] and [{}]", turns, letter, first, second);
                memory.matched.insert(first);
                memory.matched.insert(second);
            }
            ServerMessage::Mismatch { first, second } => {
                info!("Turn {}: mismatch at [{}] and [{}]", turns, first, second);
            }
            other => return Err(format!("expected MATCH or MISMATCH, got {}", other).into()),
        }
    }

    match connection.receive().await? {
        ServerMessage::GameOver => info!("Game over after {} turns", turns),
        other => return Err(format!("expected GAME_OVER, got {}", other).into()),
    }

    Ok(())
}
