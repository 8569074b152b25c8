use futures::channel::oneshot;
use std::sync::Mutex;

use super::lock;
use crate::error::{ChoreographyError, Result};

/// Single-assignment cell.
///
/// Holds zero or one value. Any number of reads may be pending before the
/// write; all of them, and every later read, observe the written value.
/// Writing twice is a usage error.
pub struct IVar<T> {
    state: Mutex<IVarState<T>>,
}

struct IVarState<T> {
    value: Option<T>,
    readers: Vec<oneshot::Sender<T>>,
}

impl<T: Clone> IVar<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IVarState {
                value: None,
                readers: Vec::new(),
            }),
        }
    }

    pub fn write(&self, value: T) -> Result<()> {
        let mut state = lock(&self.state);
        if state.value.is_some() {
            return Err(ChoreographyError::AlreadyWritten);
        }
        for reader in state.readers.drain(..) {
            // A reader that went away simply misses the value.
            let _ = reader.send(value.clone());
        }
        state.value = Some(value);
        Ok(())
    }

    pub async fn read(&self) -> Result<T> {
        let receiver = {
            let mut state = lock(&self.state);
            if let Some(value) = &state.value {
                return Ok(value.clone());
            }
            let (sender, receiver) = oneshot::channel();
            state.readers.push(sender);
            receiver
        };
        receiver.await.map_err(|_| ChoreographyError::ChannelClosed)
    }

    /// The value, if it has been written.
    pub fn peek(&self) -> Option<T> {
        lock(&self.state).value.clone()
    }

    pub fn is_written(&self) -> bool {
        lock(&self.state).value.is_some()
    }
}

impl<T: Clone> Default for IVar<T> {
    fn default() -> Self {
        Self::new()
    }
}
