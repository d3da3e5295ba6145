//! Lock-free buffer for human control events
//!
//! Uses crossbeam-channel so whatever reads the keyboard can submit
//! press/release events without blocking; the simulation drains them into a
//! `KeyboardState` at the start of each tick.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use hashbrown::HashSet;
use rustc_hash::FxBuildHasher;

use crate::game::constants::round::INPUT_BUFFER_CAPACITY;
use crate::game::state::{ControlMapping, KeyCode};

/// One control transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyCode,
    pub pressed: bool,
}

impl KeyEvent {
    pub fn press(key: KeyCode) -> Self {
        Self { key, pressed: true }
    }

    pub fn release(key: KeyCode) -> Self {
        Self { key, pressed: false }
    }
}

/// Bounded event queue between the input source and the simulation
pub struct InputBuffer {
    sender: Sender<KeyEvent>,
    receiver: Receiver<KeyEvent>,
    capacity: usize,
}

impl InputBuffer {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Clonable handle for producers
    pub fn sender(&self) -> InputSender {
        InputSender {
            sender: self.sender.clone(),
        }
    }

    /// Drain every pending event in arrival order
    pub fn drain(&self) -> impl Iterator<Item = KeyEvent> + '_ {
        self.receiver.try_iter()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new(INPUT_BUFFER_CAPACITY)
    }
}

/// Clonable sender handle
#[derive(Clone)]
pub struct InputSender {
    sender: Sender<KeyEvent>,
}

impl InputSender {
    /// Submit an event without blocking
    #[inline]
    pub fn try_send(&self, event: KeyEvent) -> Result<(), InputBufferError> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => InputBufferError::Full,
            TrySendError::Disconnected(_) => InputBufferError::Disconnected,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InputBufferError {
    /// Buffer is full (backpressure)
    #[error("Input buffer is full")]
    Full,
    /// The simulation dropped its end
    #[error("Input buffer disconnected")]
    Disconnected,
}

/// Queryable pressed state per logical control
pub trait InputSource {
    fn is_pressed(&self, key: KeyCode) -> bool;
}

/// Set of currently held keys
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    held: HashSet<KeyCode, FxBuildHasher>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: KeyEvent) {
        if event.pressed {
            self.held.insert(event.key);
        } else {
            self.held.remove(&event.key);
        }
    }

    /// Apply every pending event from `buffer`; returns how many were applied
    pub fn drain_from(&mut self, buffer: &InputBuffer) -> usize {
        let mut applied = 0;
        for event in buffer.drain() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    pub fn release_all(&mut self) {
        self.held.clear();
    }
}

impl InputSource for KeyboardState {
    #[inline]
    fn is_pressed(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }
}

/// Turn command for a human player. Right wins when both keys are held.
pub fn steer(input: &dyn InputSource, mapping: ControlMapping, max_turn: f32) -> f32 {
    if input.is_pressed(mapping.right) {
        max_turn
    } else if input.is_pressed(mapping.left) {
        -max_turn
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: ControlMapping = ControlMapping { left: 37, right: 39 };

    #[test]
    fn test_input_buffer_submit_and_drain() {
        let buffer = InputBuffer::new(10);
        let sender = buffer.sender();

        sender.try_send(KeyEvent::press(37)).unwrap();
        sender.try_send(KeyEvent::release(37)).unwrap();
        sender.try_send(KeyEvent::press(39)).unwrap();
        assert_eq!(buffer.pending_count(), 3);

        let events: Vec<_> = buffer.drain().collect();
        assert_eq!(events, vec![KeyEvent::press(37), KeyEvent::release(37), KeyEvent::press(39)]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_input_buffer_backpressure() {
        let buffer = InputBuffer::new(2);
        let sender = buffer.sender();

        assert!(sender.try_send(KeyEvent::press(1)).is_ok());
        assert!(sender.try_send(KeyEvent::press(2)).is_ok());
        assert_eq!(sender.try_send(KeyEvent::press(3)), Err(InputBufferError::Full));

        let _ = buffer.drain().count();
        assert!(sender.try_send(KeyEvent::press(3)).is_ok());
    }

    #[test]
    fn test_disconnected_sender() {
        let buffer = InputBuffer::new(2);
        let sender = buffer.sender();
        drop(buffer);
        assert_eq!(sender.try_send(KeyEvent::press(1)), Err(InputBufferError::Disconnected));
    }

    #[test]
    fn test_keyboard_state_tracks_held_keys() {
        let buffer = InputBuffer::default();
        let sender = buffer.sender();
        let mut keyboard = KeyboardState::new();

        sender.try_send(KeyEvent::press(37)).unwrap();
        assert_eq!(keyboard.drain_from(&buffer), 1);
        assert!(keyboard.is_pressed(37));
        assert_eq!(steer(&keyboard, KEYS, 4.0), -4.0);

        sender.try_send(KeyEvent::release(37)).unwrap();
        keyboard.drain_from(&buffer);
        assert_eq!(steer(&keyboard, KEYS, 4.0), 0.0);
    }

    #[test]
    fn test_right_takes_precedence() {
        let mut keyboard = KeyboardState::new();
        keyboard.apply(KeyEvent::press(37));
        keyboard.apply(KeyEvent::press(39));
        assert_eq!(steer(&keyboard, KEYS, 4.0), 4.0);

        keyboard.release_all();
        assert!(!keyboard.is_pressed(39));
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(InputBuffer::default().capacity(), INPUT_BUFFER_CAPACITY);
    }
}
