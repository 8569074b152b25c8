// Transport contract
//
// Every concrete transport (in-process bus, HTTP, anything else) implements
// this trait. It sits below the projection engine and knows nothing about
// tags beyond carrying them.

use async_trait::async_trait;
use std::sync::Arc;

use locus::{AsyncQueue, Location, Result};

use super::Envelope;

/// Callback invoked once per inbound envelope. Returning an error rejects the
/// delivery (for instance a second envelope for an already answered tag).
pub type Delivery<L> = Arc<dyn Fn(Envelope<L>) -> Result<()> + Send + Sync>;

/// Deregistration handle returned by [`Transport::subscribe`]. Dropping it
/// deregisters too.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to release.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Message delivery between the participants of one choreography.
#[async_trait]
pub trait Transport<L: Location>: Send + Sync {
    /// The fixed participant set this transport was configured for.
    fn locations(&self) -> &[L];

    /// Best-effort delivery of `envelope` to `to`. Failures are returned, never
    /// retried.
    async fn send(&self, to: L, envelope: Envelope<L>) -> Result<()>;

    /// Register `delivery` for every envelope addressed to the participant
    /// this transport is bound to.
    fn subscribe(&self, delivery: Delivery<L>) -> Result<Subscription>;

    /// Release sockets, listeners and tasks. Idempotent.
    async fn teardown(&self) -> Result<()>;
}

/// Drain `inbox` into `delivery` on a background task until the returned
/// subscription is dropped.
pub fn spawn_pump<L: Location>(
    inbox: Arc<AsyncQueue<Envelope<L>>>,
    delivery: Delivery<L>,
) -> Subscription {
    let task = tokio::spawn(async move {
        while let Ok(envelope) = inbox.pop().await {
            let from = envelope.from;
            let tag = envelope.tag.clone();
            if let Err(e) = delivery(envelope) {
                tracing::error!(?from, %tag, error = %e, "delivery rejected");
            }
        }
    });
    let abort = task.abort_handle();
    Subscription::new(move || abort.abort())
}

/// A transport for projections that never communicate. Sends vanish and
/// nothing is ever delivered.
pub struct NoOpTransport<L> {
    locations: Vec<L>,
}

impl<L: Location> NoOpTransport<L> {
    pub fn new(locations: impl IntoIterator<Item = L>) -> Self {
        Self {
            locations: locations.into_iter().collect(),
        }
    }
}

#[async_trait]
impl<L: Location> Transport<L> for NoOpTransport<L> {
    fn locations(&self) -> &[L] {
        &self.locations
    }

    async fn send(&self, _to: L, _envelope: Envelope<L>) -> Result<()> {
        Ok(())
    }

    fn subscribe(&self, _delivery: Delivery<L>) -> Result<Subscription> {
        Ok(Subscription::noop())
    }

    async fn teardown(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<L: Location, T: Transport<L> + ?Sized> Transport<L> for Arc<T> {
    fn locations(&self) -> &[L] {
        (**self).locations()
    }

    async fn send(&self, to: L, envelope: Envelope<L>) -> Result<()> {
        (**self).send(to, envelope).await
    }

    fn subscribe(&self, delivery: Delivery<L>) -> Result<Subscription> {
        (**self).subscribe(delivery)
    }

    async fn teardown(&self) -> Result<()> {
        (**self).teardown().await
    }
}
