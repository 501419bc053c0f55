//! Input collaborator handed to the hero entity at construction.
//!
//! The world never reads input itself; it only forwards an [`InputSource`]
//! into the spawn arguments of the hero so that entity can steer itself.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Logical actions an input device can hold down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Left,
    Right,
    Up,
    Down,
    Jump,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Left,
        Action::Right,
        Action::Up,
        Action::Down,
        Action::Jump,
    ];

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Read-only view of an input device.
pub trait InputSource: Send + Sync {
    /// Whether `action` is currently held.
    fn is_held(&self, action: Action) -> bool;
}

/// A shareable set of held actions, driven by whoever owns the device.
///
/// Backed by a single atomic bitmask, so the device thread and the entity
/// reading it never block each other.
#[derive(Debug, Default)]
pub struct InputState {
    held: AtomicU32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self, action: Action) {
        self.held.fetch_or(action.bit(), Ordering::Relaxed);
    }

    pub fn release(&self, action: Action) {
        self.held.fetch_and(!action.bit(), Ordering::Relaxed);
    }

    pub fn release_all(&self) {
        self.held.store(0, Ordering::Relaxed);
    }

    /// Currently held actions, in declaration order.
    pub fn held(&self) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|a| self.is_held(*a))
            .collect()
    }

    /// Replace the held set.
    pub fn set_held(&self, actions: &[Action]) {
        let mask = actions.iter().fold(0, |mask, a| mask | a.bit());
        self.held.store(mask, Ordering::Relaxed);
    }
}

impl InputSource for InputState {
    fn is_held(&self, action: Action) -> bool {
        self.held.load(Ordering::Relaxed) & action.bit() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release_are_independent_per_action() {
        let input = InputState::new();
        input.press(Action::Left);
        input.press(Action::Jump);
        assert!(input.is_held(Action::Left));
        assert!(input.is_held(Action::Jump));
        assert!(!input.is_held(Action::Right));

        input.release(Action::Left);
        assert!(!input.is_held(Action::Left));
        assert!(input.is_held(Action::Jump));

        input.release_all();
        assert!(!input.is_held(Action::Jump));
    }

    #[test]
    fn held_set_can_be_captured_and_restored() {
        let input = InputState::new();
        input.press(Action::Jump);
        input.press(Action::Left);
        assert_eq!(input.held(), vec![Action::Left, Action::Jump]);

        let other = InputState::new();
        other.set_held(&input.held());
        assert!(other.is_held(Action::Left));
        assert!(!other.is_held(Action::Right));
    }
}
