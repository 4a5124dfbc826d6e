//! Keyboard and mouse state collected from window events.
//!
//! Events only update this state; the demo polls it once per update. Edge
//! queries (`was_key_pressed`, `mouse_delta`, `scroll_delta`) cover everything
//! since the last [`InputState::end_frame`].

use std::collections::HashSet;

use winit::{
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

/// Pixels per wheel notch for touchpads reporting pixel deltas.
const PIXELS_PER_LINE: f32 = 40.0;

#[derive(Debug, Default)]
pub struct InputState {
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    buttons_down: HashSet<MouseButton>,
    /// Set on a button press, cleared when the last button is released.
    captured: bool,
    mouse_position: Option<(f32, f32)>,
    frame_start_position: Option<(f32, f32)>,
    scroll: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `event`. Returns `true` if it was an input event.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return false;
                };
                match event.state {
                    ElementState::Pressed => self.key_down(code),
                    ElementState::Released => self.key_up(code),
                }
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                match state {
                    ElementState::Pressed => self.mouse_pressed(*button),
                    ElementState::Released => self.mouse_released(*button),
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_moved(position.x as f32, position.y as f32);
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / PIXELS_PER_LINE,
                };
                self.wheel(lines);
                true
            }
            WindowEvent::Focused(false) => {
                // Releases are not delivered to unfocused windows.
                self.keys_down.clear();
                self.buttons_down.clear();
                self.captured = false;
                false
            }
            _ => false,
        }
    }

    pub fn key_down(&mut self, code: KeyCode) {
        if self.keys_down.insert(code) {
            self.keys_pressed.insert(code);
        }
    }

    pub fn key_up(&mut self, code: KeyCode) {
        self.keys_down.remove(&code);
    }

    pub fn mouse_pressed(&mut self, button: MouseButton) {
        self.buttons_down.insert(button);
        self.captured = true;
    }

    pub fn mouse_released(&mut self, button: MouseButton) {
        self.buttons_down.remove(&button);
        if self.buttons_down.is_empty() {
            self.captured = false;
        }
    }

    pub fn cursor_moved(&mut self, x: f32, y: f32) {
        if self.frame_start_position.is_none() {
            self.frame_start_position = Some((x, y));
        }
        self.mouse_position = Some((x, y));
    }

    pub fn wheel(&mut self, lines: f32) {
        self.scroll += lines;
    }

    pub fn is_key_down(&self, code: KeyCode) -> bool {
        self.keys_down.contains(&code)
    }

    /// Whether `code` went down since the last frame. Key repeats do not count.
    pub fn was_key_pressed(&self, code: KeyCode) -> bool {
        self.keys_pressed.contains(&code)
    }

    pub fn is_captured(&self) -> bool {
        self.captured
    }

    pub fn mouse_position(&self) -> Option<(f32, f32)> {
        self.mouse_position
    }

    pub fn mouse_delta(&self) -> (f32, f32) {
        match (self.frame_start_position, self.mouse_position) {
            (Some((x0, y0)), Some((x1, y1))) => (x1 - x0, y1 - y0),
            _ => (0.0, 0.0),
        }
    }

    pub fn scroll_delta(&self) -> f32 {
        self.scroll
    }

    /// Clears the per-frame edges.
    pub fn end_frame(&mut self) {
        self.keys_pressed.clear();
        self.scroll = 0.0;
        self.frame_start_position = self.mouse_position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_presses_are_edges_and_holds_are_levels() {
        let mut input = InputState::new();
        input.key_down(KeyCode::KeyF);
        assert!(input.was_key_pressed(KeyCode::KeyF));
        assert!(input.is_key_down(KeyCode::KeyF));

        input.end_frame();
        // Auto-repeat delivers another press while held.
        input.key_down(KeyCode::KeyF);
        assert!(!input.was_key_pressed(KeyCode::KeyF));
        assert!(input.is_key_down(KeyCode::KeyF));

        input.key_up(KeyCode::KeyF);
        assert!(!input.is_key_down(KeyCode::KeyF));
    }

    #[test]
    fn capture_follows_mouse_buttons() {
        let mut input = InputState::new();
        input.mouse_pressed(MouseButton::Left);
        input.mouse_pressed(MouseButton::Right);
        input.mouse_released(MouseButton::Left);
        assert!(input.is_captured());
        input.mouse_released(MouseButton::Right);
        assert!(!input.is_captured());
    }

    #[test]
    fn mouse_delta_spans_one_frame() {
        let mut input = InputState::new();
        input.cursor_moved(10.0, 10.0);
        input.cursor_moved(14.0, 7.0);
        assert_eq!(input.mouse_delta(), (4.0, -3.0));
        assert_eq!(input.mouse_position(), Some((14.0, 7.0)));

        input.end_frame();
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
        input.cursor_moved(15.0, 7.0);
        assert_eq!(input.mouse_delta(), (1.0, 0.0));
    }

    #[test]
    fn wheel_accumulates_until_the_frame_ends() {
        let mut input = InputState::new();
        input.wheel(1.0);
        input.wheel(0.5);
        assert_eq!(input.scroll_delta(), 1.5);
        input.end_frame();
        assert_eq!(input.scroll_delta(), 0.0);
    }
}
