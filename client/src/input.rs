//! Mouse input mapped to board cells

use crate::rendering::Layout;
use macroquad::prelude::*;
use shared::Position;

pub struct InputManager {
    prev_mouse_down: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            prev_mouse_down: false,
        }
    }

    /// Returns the cell clicked this frame, if any
    ///
    /// A click fires on the press edge only, so holding the button down does
    /// not repeat the request.
    pub fn update(&mut self, layout: &Layout) -> Option<Position> {
        let mouse_down = is_mouse_button_down(MouseButton::Left);
        let pressed = mouse_down && !self.prev_mouse_down;
        self.prev_mouse_down = mouse_down;

        if !pressed {
            return None;
        }

        let (x, y) = mouse_position();
        layout.cell_at(x, y)
    }

    /// Escape closes the window
    pub fn quit_requested(&self) -> bool {
        is_key_pressed(KeyCode::Escape)
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
