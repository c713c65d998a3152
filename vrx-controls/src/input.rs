use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, WindowEvent};

/// Relative pointer movement in pixels, as reported by pointer lock or a drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub movement: Vec2,
}

impl PointerSample {
    pub fn new(dx: f32, dy: f32) -> Self {
        Self {
            movement: Vec2::new(dx, dy),
        }
    }
}

/// Pointer state used to turn window events into look samples.
///
/// While the pointer is locked raw motion drives the camera; otherwise the
/// look button has to be held and cursor movement is used.
#[derive(Debug)]
pub struct InputState {
    mouse_position: Option<Vec2>,
    mouse_down: HashSet<MouseButton>,
    look_button: MouseButton,
    pointer_locked: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            mouse_position: None,
            mouse_down: HashSet::new(),
            look_button: MouseButton::Left,
            pointer_locked: false,
        }
    }

    pub fn mouse_position(&self) -> Option<Vec2> {
        self.mouse_position
    }

    pub fn mouse_button_down(&self, button: MouseButton) -> bool {
        self.mouse_down.contains(&button)
    }

    pub fn pointer_locked(&self) -> bool {
        self.pointer_locked
    }

    pub fn set_pointer_locked(&mut self, locked: bool) {
        self.pointer_locked = locked;
    }

    /// Record a window event, returning a look sample when it produces one.
    pub fn record_event(&mut self, event: &WindowEvent) -> Option<PointerSample> {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                let current = Vec2::new(position.x as f32, position.y as f32);
                let previous = self.mouse_position.replace(current);
                if self.pointer_locked || !self.mouse_button_down(self.look_button) {
                    return None;
                }
                previous.map(|prev| PointerSample {
                    movement: current - prev,
                })
            }
            WindowEvent::MouseInput { state, button, .. } => {
                match state {
                    ElementState::Pressed => {
                        self.mouse_down.insert(*button);
                    }
                    ElementState::Released => {
                        self.mouse_down.remove(button);
                    }
                };
                None
            }
            WindowEvent::CursorLeft { .. } | WindowEvent::Focused(false) => {
                self.mouse_down.clear();
                self.mouse_position = None;
                None
            }
            _ => None,
        }
    }

    /// Record raw device motion. Only produces a sample while pointer-locked.
    pub fn record_motion(&mut self, delta: (f64, f64)) -> Option<PointerSample> {
        if !self.pointer_locked {
            return None;
        }
        Some(PointerSample::new(delta.0 as f32, delta.1 as f32))
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}
