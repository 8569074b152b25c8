use futures::channel::oneshot;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::lock;
use crate::error::{ChoreographyError, Result};

/// Unbounded FIFO with awaiting consumers.
///
/// `push` hands the value straight to the longest-waiting consumer if there is
/// one, otherwise buffers it. `pop` takes from the buffer or parks until the
/// next push. There is no close: consumers go away with the owner.
pub struct AsyncQueue<T> {
    state: Mutex<QueueState<T>>,
}

struct QueueState<T> {
    buffer: VecDeque<T>,
    waiters: VecDeque<oneshot::Sender<T>>,
}

impl<T> AsyncQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                buffer: VecDeque::new(),
                waiters: VecDeque::new(),
            }),
        }
    }

    pub fn push(&self, value: T) {
        let mut state = lock(&self.state);
        let mut value = value;
        // Waiters whose pop was dropped hand the value back; try the next one.
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(value) {
                Ok(()) => return,
                Err(returned) => value = returned,
            }
        }
        state.buffer.push_back(value);
    }

    pub async fn pop(&self) -> Result<T> {
        let receiver = {
            let mut state = lock(&self.state);
            if let Some(value) = state.buffer.pop_front() {
                return Ok(value);
            }
            let (sender, receiver) = oneshot::channel();
            state.waiters.push_back(sender);
            receiver
        };
        receiver.await.map_err(|_| ChoreographyError::ChannelClosed)
    }

    /// Take a buffered value without waiting.
    pub fn try_pop(&self) -> Option<T> {
        lock(&self.state).buffer.pop_front()
    }

    /// Number of buffered values not yet taken.
    pub fn len(&self) -> usize {
        lock(&self.state).buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for AsyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
