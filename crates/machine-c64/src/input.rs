//! Host input.
//!
//! The host pushes key and joystick edges from any thread through an
//! [`InputSender`]. The machine drains them at the start of its next
//! step, so input always lands on an instruction boundary.

use crossbeam_channel::{Receiver, Sender, TryRecvError};

/// Joystick switches, `true` while closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoystickState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub fire: bool,
}

impl JoystickState {
    /// Port lines as the CIA sees them: closed switches pull low.
    #[must_use]
    pub fn lines(self) -> u8 {
        let closed = u8::from(self.up)
            | u8::from(self.down) << 1
            | u8::from(self.left) << 2
            | u8::from(self.right) << 3
            | u8::from(self.fire) << 4;
        !closed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Keyboard matrix edge. `row` is the CIA1 port A bit, `col` the port
    /// B bit.
    Key { row: u8, col: u8, pressed: bool },
    /// New switch state for control port 1 or 2.
    Joystick { port: u8, state: JoystickState },
}

/// Cloneable handle for queueing input from the host.
#[derive(Debug, Clone)]
pub struct InputSender(Sender<InputEvent>);

impl InputSender {
    /// Queue an event. Events sent after the machine is dropped are lost.
    pub fn send(&self, event: InputEvent) {
        if self.0.send(event).is_err() {
            log::debug!("input: machine gone, {event:?} dropped");
        }
    }
}

/// Events waiting for the next step.
#[derive(Debug)]
pub struct InputQueue {
    sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
}

impl InputQueue {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    #[must_use]
    pub fn sender(&self) -> InputSender {
        InputSender(self.sender.clone())
    }

    pub fn push(&self, event: InputEvent) {
        // The queue holds its own receiver, so this cannot disconnect.
        let _ = self.sender.send(event);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Next queued event, in the order they were sent.
    pub fn pop(&self) -> Option<InputEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}
