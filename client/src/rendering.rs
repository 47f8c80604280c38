use crate::model::{ClientBoard, Status};
use macroquad::prelude::*;
use shared::Position;

const STATUS_BAR_HEIGHT: f32 = 40.0;
const MARGIN: f32 = 10.0;
const CARD_GAP: f32 = 6.0;

/// Screen geometry of the card grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub origin_x: f32,
    pub origin_y: f32,
    pub cell_size: f32,
    pub dimension: usize,
}

impl Layout {
    /// Fits a square grid below the status bar, centered horizontally
    pub fn new(width: f32, height: f32, dimension: usize) -> Self {
        let available_w = (width - 2.0 * MARGIN).max(0.0);
        let available_h = (height - STATUS_BAR_HEIGHT - 2.0 * MARGIN).max(0.0);
        let side = available_w.min(available_h);
        let cell_size = if dimension == 0 {
            0.0
        } else {
            side / dimension as f32
        };

        Self {
            origin_x: (width - cell_size * dimension as f32) / 2.0,
            origin_y: STATUS_BAR_HEIGHT + MARGIN,
            cell_size,
            dimension,
        }
    }

    /// Top-left corner and side length of a card, gap included
    pub fn card_rect(&self, position: Position) -> (f32, f32, f32) {
        let x = self.origin_x + position.col as f32 * self.cell_size + CARD_GAP / 2.0;
        let y = self.origin_y + position.row as f32 * self.cell_size + CARD_GAP / 2.0;
        (x, y, (self.cell_size - CARD_GAP).max(0.0))
    }

    /// The cell under a screen point, if any
    pub fn cell_at(&self, x: f32, y: f32) -> Option<Position> {
        if self.cell_size <= 0.0 || x < self.origin_x || y < self.origin_y {
            return None;
        }

        let col = ((x - self.origin_x) / self.cell_size) as usize;
        let row = ((y - self.origin_y) / self.cell_size) as usize;
        if row < self.dimension && col < self.dimension {
            Some(Position::new(row, col))
        } else {
            None
        }
    }
}

pub struct Renderer {
    layout: Layout,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            layout: Layout::new(screen_width(), screen_height(), 0),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Recomputes the grid for the current window size
    pub fn update_layout(&mut self, dimension: usize) {
        self.layout = Layout::new(screen_width(), screen_height(), dimension);
    }

    pub fn render(&mut self, board: &ClientBoard) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        for row in 0..board.dimension() {
            for col in 0..board.dimension() {
                self.draw_card(board, Position::new(row, col));
            }
        }

        self.draw_status(board);
    }

    fn draw_card(&self, board: &ClientBoard, position: Position) {
        let (x, y, size) = self.layout.card_rect(position);

        if board.is_hidden(position.row, position.col) {
            draw_rectangle(x, y, size, size, Color::from_rgba(40, 70, 140, 255));
            draw_rectangle_lines(x, y, size, size, 2.0, WHITE);
            return;
        }

        let face = if board.is_matched(position.row, position.col) {
            Color::from_rgba(60, 150, 80, 255)
        } else {
            Color::from_rgba(230, 200, 60, 255)
        };
        draw_rectangle(x, y, size, size, face);
        draw_rectangle_lines(x, y, size, size, 2.0, WHITE);

        let letter = board.letter(position.row, position.col).to_string();
        let font_size = (size * 0.6).max(1.0);
        let dims = measure_text(&letter, None, font_size as u16, 1.0);
        draw_text(
            &letter,
            x + (size - dims.width) / 2.0,
            y + (size + dims.offset_y) / 2.0,
            font_size,
            BLACK,
        );
    }

    fn draw_status(&self, board: &ClientBoard) {
        let pairs = board.dimension() * board.dimension() / 2;
        let (label, color) = match board.status() {
            Status::Ok => ("OK".to_string(), GREEN),
            Status::GameOver => ("GAME OVER".to_string(), YELLOW),
            Status::Error => (
                format!("ERROR: {}", board.last_error().unwrap_or("unknown")),
                RED,
            ),
        };

        let text = format!(
            "Moves: {}   Matches: {}/{}   ",
            board.moves(),
            board.matches(),
            pairs
        );
        draw_text(&text, MARGIN, 26.0, 22.0, WHITE);
        let offset = measure_text(&text, None, 22, 1.0).width;
        draw_text(&label, MARGIN + offset, 26.0, 22.0, color);
    }
}
