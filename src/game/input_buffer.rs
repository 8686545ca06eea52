//! Lock-free input buffer
//!
//! Uses crossbeam-channel for MPSC communication from connection handlers
//! to the game loop. The loop drains it at the start of each tick.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::game::constants::net::INPUT_BUFFER_SIZE;
use crate::game::state::PeerId;
use crate::net::protocol::MoveInput;

/// Input message from a participant connection
#[derive(Debug, Clone, Copy)]
pub struct InputMessage {
    /// Peer that sent the input; must be the avatar's input authority
    pub peer_id: PeerId,
    pub input: MoveInput,
}

/// Bounded input channel owned by one game loop
pub struct InputBuffer {
    sender: Sender<InputMessage>,
    receiver: Receiver<InputMessage>,
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

    /// Create a sender handle for a connection
    pub fn sender(&self) -> InputSender {
        InputSender {
            sender: self.sender.clone(),
        }
    }

    /// Try to submit an input (non-blocking). False when the buffer is full.
    #[inline]
    pub fn try_submit(&self, peer_id: PeerId, input: MoveInput) -> bool {
        self.sender.try_send(InputMessage { peer_id, input }).is_ok()
    }

    /// Drain all pending inputs, oldest first
    pub fn drain(&self) -> Vec<InputMessage> {
        self.receiver.try_iter().collect()
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
        Self::new(INPUT_BUFFER_SIZE)
    }
}

/// Clonable sender handle for connection handlers
#[derive(Clone)]
pub struct InputSender {
    sender: Sender<InputMessage>,
}

impl InputSender {
    /// Submit an input (non-blocking)
    #[inline]
    pub fn try_send(&self, peer_id: PeerId, input: MoveInput) -> Result<(), InputBufferError> {
        self.sender
            .try_send(InputMessage { peer_id, input })
            .map_err(|e| match e {
                TrySendError::Full(_) => InputBufferError::Full,
                TrySendError::Disconnected(_) => InputBufferError::Disconnected,
            })
    }
}

/// Input buffer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InputBufferError {
    /// Buffer is full (backpressure)
    #[error("input buffer full")]
    Full,
    /// Game loop dropped its receiver
    #[error("input buffer disconnected")]
    Disconnected,
}
