//! Authoritative card layout and the two-step reveal/match state machine
//!
//! A board is owned by exactly one session. It only changes through
//! [`Board::reveal`], which keeps the turn bookkeeping (the pending first card,
//! the match counter) in a single place. Coordinates arrive as signed integers
//! straight from the wire and are bounds-checked here.

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{is_valid_dimension, Position, HIDDEN, MAX_DIMENSION, SYMBOLS};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("board dimension {0} must be even and between 2 and {max}", max = MAX_DIMENSION)]
    InvalidDimension(usize),
    #[error("layout must contain {expected} cards with every letter exactly twice")]
    InvalidLayout { expected: usize },
    #[error("coordinates out of bounds [{row}][{col}]")]
    OutOfBounds { row: i32, col: i32 },
    #[error("card [{row}][{col}] is already revealed")]
    AlreadyRevealed { row: usize, col: usize },
}

/// A single card on the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    position: Position,
    letter: char,
    hidden: bool,
}

impl Card {
    fn new(position: Position, letter: char) -> Self {
        Self {
            position,
            letter,
            hidden: true,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn row(&self) -> usize {
        self.position.row
    }

    pub fn col(&self) -> usize {
        self.position.col
    }

    pub fn letter(&self) -> char {
        self.letter
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}

/// Result of a single reveal
///
/// `Pending` means the turn is not finished yet; the other two variants are
/// the "ready" outcomes of the second reveal and carry both positions, first
/// card first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    Pending { card: Position },
    Match { first: Position, second: Position },
    Mismatch { first: Position, second: Position },
}

impl RevealOutcome {
    pub fn is_ready(&self) -> bool {
        !matches!(self, RevealOutcome::Pending { .. })
    }

    pub fn is_match(&self) -> bool {
        matches!(self, RevealOutcome::Match { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Board {
    dimension: usize,
    cards: Vec<Vec<Card>>,
    matches: usize,
    /// First card of the turn in progress, if any
    pending: Option<Position>,
}

impl Board {
    /// Creates a board with a freshly shuffled layout
    pub fn new(dimension: usize) -> Result<Self, BoardError> {
        Self::with_rng(dimension, &mut rand::thread_rng())
    }

    /// Creates a board shuffled with the given generator
    ///
    /// Takes the first `dimension² / 2` symbols, duplicates each one and
    /// shuffles the result before laying it out row by row.
    pub fn with_rng<R: Rng + ?Sized>(dimension: usize, rng: &mut R) -> Result<Self, BoardError> {
        if !is_valid_dimension(dimension) {
            return Err(BoardError::InvalidDimension(dimension));
        }

        let pairs = dimension * dimension / 2;
        let mut letters: Vec<char> = SYMBOLS
            .chars()
            .take(pairs)
            .flat_map(|symbol| [symbol, symbol])
            .collect();
        letters.shuffle(rng);

        Ok(Self::build(dimension, &letters))
    }

    /// Creates a board from a fixed row-major layout
    pub fn from_letters(dimension: usize, letters: &[char]) -> Result<Self, BoardError> {
        if !is_valid_dimension(dimension) {
            return Err(BoardError::InvalidDimension(dimension));
        }

        let expected = dimension * dimension;
        let mut counts: HashMap<char, usize> = HashMap::new();
        for letter in letters {
            *counts.entry(*letter).or_insert(0) += 1;
        }

        let paired = counts
            .iter()
            .all(|(letter, count)| *count == 2 && letter.is_ascii_graphic() && *letter != HIDDEN);
        if letters.len() != expected || !paired {
            return Err(BoardError::InvalidLayout { expected });
        }

        Ok(Self::build(dimension, letters))
    }

    fn build(dimension: usize, letters: &[char]) -> Self {
        let cards = letters
            .chunks(dimension)
            .enumerate()
            .map(|(row, chunk)| {
                chunk
                    .iter()
                    .enumerate()
                    .map(|(col, letter)| Card::new(Position::new(row, col), *letter))
                    .collect()
            })
            .collect();

        Self {
            dimension,
            cards,
            matches: 0,
            pending: None,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn matches(&self) -> usize {
        self.matches
    }

    /// The face-up card waiting for its partner, if a turn is in progress
    pub fn pending(&self) -> Option<&Card> {
        self.pending.map(|position| self.card_at(position))
    }

    /// Iterates over every card in row-major order
    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().flatten()
    }

    pub fn get_card(&self, row: i32, col: i32) -> Result<&Card, BoardError> {
        let position = self.locate(row, col)?;
        Ok(self.card_at(position))
    }

    /// Flips a hidden card face up and resolves the turn if it was the second one
    ///
    /// Errors leave the board untouched.
    pub fn reveal(&mut self, row: i32, col: i32) -> Result<RevealOutcome, BoardError> {
        let position = self.locate(row, col)?;

        let card = self.card_at_mut(position);
        if !card.hidden {
            return Err(BoardError::AlreadyRevealed {
                row: position.row,
                col: position.col,
            });
        }
        card.hidden = false;
        let letter = card.letter;

        let Some(first) = self.pending.take() else {
            self.pending = Some(position);
            return Ok(RevealOutcome::Pending { card: position });
        };

        if self.card_at(first).letter == letter {
            self.matches += 1;
            debug!(
                "Matched '{}' at [{}] and [{}] ({} of {} pairs)",
                letter,
                first,
                position,
                self.matches,
                self.dimension * self.dimension / 2
            );
            Ok(RevealOutcome::Match {
                first,
                second: position,
            })
        } else {
            self.card_at_mut(first).hidden = true;
            self.card_at_mut(position).hidden = true;
            Ok(RevealOutcome::Mismatch {
                first,
                second: position,
            })
        }
    }

    pub fn game_over(&self) -> bool {
        self.matches * 2 == self.dimension * self.dimension
    }

    fn locate(&self, row: i32, col: i32) -> Result<Position, BoardError> {
        let in_range = |value: i32| usize::try_from(value).ok().filter(|v| *v < self.dimension);

        match (in_range(row), in_range(col)) {
            (Some(r), Some(c)) => Ok(Position::new(r, c)),
            _ => Err(BoardError::OutOfBounds { row, col }),
        }
    }

    fn card_at(&self, position: Position) -> &Card {
        &self.cards[position.row][position.col]
    }

    fn card_at_mut(&mut self, position: Position) -> &mut Card {
        &mut self.cards[position.row][position.col]
    }
}

/// Renders the board as a grid, face-down cards shown as `.`
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.cards {
            let line: String = row
                .iter()
                .map(|card| if card.hidden { HIDDEN } else { card.letter })
                .collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
