use std::collections::HashSet;

use winit::event::{ElementState, KeyboardInput, VirtualKeyCode};

/// Tracks which keys are currently held, so movement can be applied once per
/// frame scaled by delta time rather than once per key event.
#[derive(Default)]
pub struct InputState {
    pressed: HashSet<VirtualKeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_keyboard(&mut self, input: &KeyboardInput) {
        if let Some(keycode) = input.virtual_keycode {
            match input.state {
                ElementState::Pressed => {
                    self.pressed.insert(keycode);
                }
                ElementState::Released => {
                    self.pressed.remove(&keycode);
                }
            }
        }
    }

    pub fn is_pressed(&self, keycode: VirtualKeyCode) -> bool {
        self.pressed.contains(&keycode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(deprecated)]
    fn key_event(keycode: VirtualKeyCode, state: ElementState) -> KeyboardInput {
        KeyboardInput {
            scancode: 0,
            state,
            virtual_keycode: Some(keycode),
            modifiers: Default::default(),
        }
    }

    #[test]
    fn keys_are_held_until_released() {
        let mut input = InputState::new();

        input.handle_keyboard(&key_event(VirtualKeyCode::W, ElementState::Pressed));
        assert!(input.is_pressed(VirtualKeyCode::W));
        assert!(!input.is_pressed(VirtualKeyCode::S));

        // A repeat press changes nothing.
        input.handle_keyboard(&key_event(VirtualKeyCode::W, ElementState::Pressed));
        assert!(input.is_pressed(VirtualKeyCode::W));

        input.handle_keyboard(&key_event(VirtualKeyCode::W, ElementState::Released));
        assert!(!input.is_pressed(VirtualKeyCode::W));
    }
}
