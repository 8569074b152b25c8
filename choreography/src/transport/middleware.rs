// Middleware layers for transports
//
// These wrap any transport to add cross-cutting concerns like tracing,
// metrics and fault injection without touching the choreography or the
// concrete transport underneath.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

use locus::{Location, Result};

use super::{Delivery, Envelope, Subscription, Transport};

/// Tracing middleware that logs every send and delivery
pub struct Trace<T> {
    inner: T,
    prefix: String,
}

impl<T> Trace<T> {
    pub fn new(inner: T) -> Self {
        Self::with_prefix(inner, "choreo")
    }

    pub fn with_prefix(inner: T, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl<L: Location, T: Transport<L>> Transport<L> for Trace<T> {
    fn locations(&self) -> &[L] {
        self.inner.locations()
    }

    async fn send(&self, to: L, envelope: Envelope<L>) -> Result<()> {
        let start = Instant::now();
        let tag = envelope.tag.clone();
        trace!(prefix = %self.prefix, ?to, %tag, "send: start");
        let result = self.inner.send(to, envelope).await;
        let duration = start.elapsed();
        match &result {
            Ok(()) => debug!(prefix = %self.prefix, ?to, %tag, ?duration, "send: success"),
            Err(e) => warn!(prefix = %self.prefix, ?to, %tag, ?duration, error = %e, "send: failed"),
        }
        result
    }

    fn subscribe(&self, delivery: Delivery<L>) -> Result<Subscription> {
        let prefix = self.prefix.clone();
        self.inner.subscribe(Arc::new(move |envelope: Envelope<L>| {
            let from = envelope.from;
            let tag = envelope.tag.clone();
            let result = delivery(envelope);
            match &result {
                Ok(()) => debug!(%prefix, ?from, %tag, "deliver"),
                Err(e) => warn!(%prefix, ?from, %tag, error = %e, "deliver: rejected"),
            }
            result
        }))
    }

    async fn teardown(&self) -> Result<()> {
        debug!(prefix = %self.prefix, "teardown");
        self.inner.teardown().await
    }
}

/// Metrics collection middleware
pub struct Metrics<T> {
    inner: T,
    send_count: AtomicU64,
    recv_count: Arc<AtomicU64>,
    error_count: Arc<AtomicU64>,
}

impl<T> Metrics<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            send_count: AtomicU64::new(0),
            recv_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Envelopes handed to the inner transport successfully.
    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::Relaxed)
    }

    /// Envelopes delivered and accepted.
    pub fn recv_count(&self) -> u64 {
        self.recv_count.load(Ordering::Relaxed)
    }

    /// Failed sends plus rejected deliveries.
    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<L: Location, T: Transport<L>> Transport<L> for Metrics<T> {
    fn locations(&self) -> &[L] {
        self.inner.locations()
    }

    async fn send(&self, to: L, envelope: Envelope<L>) -> Result<()> {
        let result = self.inner.send(to, envelope).await;
        if result.is_ok() {
            self.send_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn subscribe(&self, delivery: Delivery<L>) -> Result<Subscription> {
        let recv_count = self.recv_count.clone();
        let error_count = self.error_count.clone();
        self.inner.subscribe(Arc::new(move |envelope: Envelope<L>| {
            let result = delivery(envelope);
            if result.is_ok() {
                recv_count.fetch_add(1, Ordering::Relaxed);
            } else {
                error_count.fetch_add(1, Ordering::Relaxed);
            }
            result
        }))
    }

    async fn teardown(&self) -> Result<()> {
        self.inner.teardown().await
    }
}

/// Fault injection middleware for testing
#[cfg(feature = "test-utils")]
pub struct FaultInjection<T> {
    inner: T,
    failure_rate: f32,
    delay_range: Option<(std::time::Duration, std::time::Duration)>,
    rng: std::sync::Mutex<rand::rngs::StdRng>,
}

#[cfg(feature = "test-utils")]
impl<T> FaultInjection<T> {
    pub fn new(inner: T, failure_rate: f32) -> Self {
        use rand::SeedableRng;
        Self::with_rng(inner, failure_rate, rand::rngs::StdRng::from_entropy())
    }

    /// Reproducible faults.
    pub fn with_seed(inner: T, failure_rate: f32, seed: u64) -> Self {
        use rand::SeedableRng;
        Self::with_rng(inner, failure_rate, rand::rngs::StdRng::seed_from_u64(seed))
    }

    fn with_rng(inner: T, failure_rate: f32, rng: rand::rngs::StdRng) -> Self {
        Self {
            inner,
            failure_rate,
            delay_range: None,
            rng: std::sync::Mutex::new(rng),
        }
    }

    pub fn with_delays(mut self, min: std::time::Duration, max: std::time::Duration) -> Self {
        self.delay_range = Some((min, max));
        self
    }
}

#[cfg(feature = "test-utils")]
#[async_trait]
impl<L: Location, T: Transport<L>> Transport<L> for FaultInjection<T> {
    fn locations(&self) -> &[L] {
        self.inner.locations()
    }

    async fn send(&self, to: L, envelope: Envelope<L>) -> Result<()> {
        use rand::Rng;

        let (delay, fail) = {
            let mut rng = self
                .rng
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let delay = self.delay_range.map(|(min, max)| {
                let ms = rng.gen_range(min.as_millis() as u64..=max.as_millis() as u64);
                std::time::Duration::from_millis(ms)
            });
            (delay, rng.gen::<f32>() < self.failure_rate)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if fail {
            warn!(?to, tag = %envelope.tag, "injected fault");
            return Err(locus::ChoreographyError::Transport("Injected fault".into()));
        }

        self.inner.send(to, envelope).await
    }

    fn subscribe(&self, delivery: Delivery<L>) -> Result<Subscription> {
        self.inner.subscribe(delivery)
    }

    async fn teardown(&self) -> Result<()> {
        self.inner.teardown().await
    }
}
