// In-process transport
//
// Every participant runs in the same process and shares one bus. Each
// location owns an inbox queue; sends push into the target's inbox
// synchronously, and a pump task drains it into the subscribed callback.
// Envelopes sent before the receiver subscribes wait in the inbox.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use locus::{AsyncQueue, ChoreographyError, Location, Result};

use super::{spawn_pump, Delivery, Envelope, Subscription, Transport};

/// Shared in-memory event channel connecting every participant.
pub struct LocalBus<L> {
    locations: Vec<L>,
    inboxes: HashMap<L, Arc<AsyncQueue<Envelope<L>>>>,
}

impl<L: Location> LocalBus<L> {
    pub fn new(locations: impl IntoIterator<Item = L>) -> Arc<Self> {
        let locations: Vec<L> = locations.into_iter().collect();
        let inboxes = locations
            .iter()
            .map(|l| (*l, Arc::new(AsyncQueue::new())))
            .collect();
        Arc::new(Self { locations, inboxes })
    }

    pub fn locations(&self) -> &[L] {
        &self.locations
    }

    /// The endpoint of `location` on this bus.
    pub fn transport(self: &Arc<Self>, location: L) -> LocalTransport<L> {
        LocalTransport {
            bus: self.clone(),
            location,
            closed: AtomicBool::new(false),
        }
    }

    fn inbox(&self, location: L) -> Result<&Arc<AsyncQueue<Envelope<L>>>> {
        self.inboxes
            .get(&location)
            .ok_or_else(|| ChoreographyError::UnknownLocation(format!("{:?}", location)))
    }

    /// Envelopes waiting for `location` that no subscriber has taken yet.
    pub fn pending(&self, location: L) -> usize {
        self.inboxes.get(&location).map_or(0, |inbox| inbox.len())
    }
}

/// One participant's endpoint on a [`LocalBus`].
pub struct LocalTransport<L: Location> {
    bus: Arc<LocalBus<L>>,
    location: L,
    closed: AtomicBool,
}

impl<L: Location> LocalTransport<L> {
    pub fn location(&self) -> L {
        self.location
    }
}

#[async_trait]
impl<L: Location> Transport<L> for LocalTransport<L> {
    fn locations(&self) -> &[L] {
        self.bus.locations()
    }

    async fn send(&self, to: L, envelope: Envelope<L>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChoreographyError::Transport(format!(
                "transport of {:?} is torn down",
                self.location
            )));
        }
        tracing::trace!(from = ?self.location, ?to, tag = %envelope.tag, "LocalTransport: send");
        self.bus.inbox(to)?.push(envelope);
        Ok(())
    }

    fn subscribe(&self, delivery: Delivery<L>) -> Result<Subscription> {
        let inbox = self.bus.inbox(self.location)?.clone();
        Ok(spawn_pump(inbox, delivery))
    }

    async fn teardown(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(location = ?self.location, "LocalTransport: teardown");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus::Tag;
    use serde::{Deserialize, Serialize};

    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    enum Role {
        Alice,
        Bob,
    }

    #[tokio::test]
    async fn buffers_until_subscribed() {
        let bus = LocalBus::new([Role::Alice, Role::Bob]);
        let alice = bus.transport(Role::Alice);
        let bob = bus.transport(Role::Bob);

        let envelope = Envelope::seal(Role::Alice, Tag::root(), "hi").unwrap();
        alice.send(Role::Bob, envelope.clone()).await.unwrap();
        assert_eq!(bus.pending(Role::Bob), 1);

        let received = Arc::new(AsyncQueue::new());
        let sink = received.clone();
        let _subscription = bob
            .subscribe(Arc::new(move |e: Envelope<Role>| {
                sink.push(e);
                Ok(())
            }))
            .unwrap();

        assert_eq!(received.pop().await.unwrap(), envelope);
        assert_eq!(bus.pending(Role::Bob), 0);
    }

    #[tokio::test]
    async fn send_after_teardown_fails() {
        let bus = LocalBus::new([Role::Alice, Role::Bob]);
        let alice = bus.transport(Role::Alice);
        alice.teardown().await.unwrap();
        alice.teardown().await.unwrap();
        let envelope = Envelope::seal(Role::Alice, Tag::root(), &1).unwrap();
        assert!(alice.send(Role::Bob, envelope).await.is_err());
    }
}
