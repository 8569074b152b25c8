// Per-projection inbox keyed by (sender, tag)
//
// The transport hands over envelopes in whatever order they arrive; each one
// lands in the single-assignment cell for its key and the receive that
// computed the same key picks it up, whether it started waiting before or
// after the arrival. Consumed keys are remembered so that a late duplicate is
// still rejected once its slot is gone.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use locus::{ChoreographyError, IVar, Location, Result, Tag};

use crate::transport::Envelope;

type Slot = Arc<IVar<serde_json::Value>>;

struct Slots<L> {
    pending: HashMap<(L, Tag), Slot>,
    consumed: HashSet<(L, Tag)>,
}

pub(crate) struct Mailbox<L> {
    slots: Mutex<Slots<L>>,
}

impl<L: Location> Mailbox<L> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                pending: HashMap::new(),
                consumed: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots<L>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an inbound envelope. A second envelope for the same key is
    /// rejected with `AlreadyWritten`, before or after the first was received.
    pub(crate) fn deliver(&self, envelope: Envelope<L>) -> Result<()> {
        let key = (envelope.from, envelope.tag);
        let slot = {
            let mut slots = self.lock();
            if slots.consumed.contains(&key) {
                return Err(ChoreographyError::AlreadyWritten);
            }
            slots
                .pending
                .entry(key)
                .or_insert_with(|| Arc::new(IVar::new()))
                .clone()
        };
        slot.write(envelope.data)
    }

    /// Wait for the payload sent by `from` at `tag`.
    pub(crate) async fn receive(&self, from: L, tag: &Tag) -> Result<serde_json::Value> {
        let key = (from, tag.clone());
        let slot = self
            .lock()
            .pending
            .entry(key.clone())
            .or_insert_with(|| Arc::new(IVar::new()))
            .clone();
        let data = slot.read().await?;
        let mut slots = self.lock();
        slots.pending.remove(&key);
        slots.consumed.insert(key);
        Ok(data)
    }

    /// Keys delivered or awaited but not yet consumed.
    pub(crate) fn outstanding(&self) -> usize {
        self.lock().pending.len()
    }
}
