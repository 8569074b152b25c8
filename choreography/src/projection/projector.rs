// Binding a choreography to one participant and one transport

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use locus::{Capability, ChoreographyError, Location, Result, ScopeTracker, Tag};

use super::choreo::{Choreo, Choreography, Endpoint};
use super::mailbox::Mailbox;
use crate::log::Log;
use crate::transport::{Envelope, Subscription, Transport};

/// One participant's side of a deployment.
///
/// The projector subscribes to its transport as soon as it is built, so
/// envelopes that arrive before the local program reaches the matching receive
/// are kept. Successive invocations run under successive child tags of a
/// projector-wide root, so every participant has to invoke its programs in
/// the same order.
pub struct Projector<L: Location> {
    location: L,
    transport: Arc<dyn Transport<L>>,
    mailbox: Arc<Mailbox<L>>,
    log: Option<Arc<dyn Log>>,
    root: Mutex<Tag>,
    subscription: Mutex<Option<Subscription>>,
}

impl<L: Location> Projector<L> {
    pub fn new<T>(transport: T, location: L) -> Result<Self>
    where
        T: Transport<L> + 'static,
    {
        if !transport.locations().contains(&location) {
            return Err(ChoreographyError::UnknownLocation(format!("{:?}", location)));
        }
        let mailbox = Arc::new(Mailbox::new());
        let sink = mailbox.clone();
        let subscription =
            transport.subscribe(Arc::new(move |envelope: Envelope<L>| sink.deliver(envelope)))?;
        debug!(?location, participants = ?transport.locations(), "projector ready");
        Ok(Self {
            location,
            transport: Arc::new(transport),
            mailbox,
            log: None,
            root: Mutex::new(Tag::root()),
            subscription: Mutex::new(Some(subscription)),
        })
    }

    /// Attach a persistence hook, reachable from every operator handle.
    pub fn with_log(mut self, log: impl Log + 'static) -> Self {
        self.log = Some(Arc::new(log));
        self
    }

    pub fn location(&self) -> L {
        self.location
    }

    pub fn locations(&self) -> &[L] {
        self.transport.locations()
    }

    /// The local program of `chor` at this participant.
    pub fn project<'a, C>(&'a self, chor: &'a C) -> LocalProgram<'a, L, C>
    where
        C: Choreography<L> + ?Sized,
    {
        LocalProgram {
            projector: self,
            chor,
        }
    }

    /// Project and invoke once.
    pub async fn epp<C>(&self, chor: &C, args: C::Args) -> Result<C::Output>
    where
        C: Choreography<L> + ?Sized,
    {
        self.project(chor).call(args).await
    }

    /// Deregister from the transport and tear it down.
    pub async fn teardown(self) -> Result<()> {
        if let Some(subscription) = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            subscription.unsubscribe();
        }
        debug!(location = ?self.location, "projector teardown");
        self.transport.teardown().await
    }

    fn invocation(&self) -> Result<Choreo<L>> {
        let tag = self.root.lock().unwrap_or_else(PoisonError::into_inner).call()?;
        let endpoint = Arc::new(Endpoint {
            location: self.location,
            transport: self.transport.clone(),
            mailbox: self.mailbox.clone(),
            log: self.log.clone(),
        });
        let tracker = ScopeTracker::new(self.transport.locations().iter().copied());
        Ok(Choreo::new(endpoint, Capability::mint(), tag, tracker.snapshot()))
    }
}

/// A choreography projected to one participant. Each [`call`](Self::call)
/// is one run of the protocol with a freshly minted capability and a fresh
/// scope.
pub struct LocalProgram<'a, L: Location, C: ?Sized> {
    projector: &'a Projector<L>,
    chor: &'a C,
}

impl<'a, L, C> LocalProgram<'a, L, C>
where
    L: Location,
    C: Choreography<L> + ?Sized,
{
    pub async fn call(&self, args: C::Args) -> Result<C::Output> {
        let op = self.projector.invocation()?;
        let location = self.projector.location;
        let tag = op.tag();
        debug!(?location, %tag, "local program: start");
        let result = self.chor.run(op, args).await;
        match &result {
            Ok(_) => debug!(?location, %tag, "local program: done"),
            Err(e) => warn!(?location, %tag, error = %e, fatal = e.is_fatal(), "local program: failed"),
        }
        result
    }
}

/// Build a projector, invoke `chor` once and tear the transport down, whether
/// or not the invocation succeeded.
pub async fn run<L, T, C>(transport: T, location: L, chor: &C, args: C::Args) -> Result<C::Output>
where
    L: Location,
    T: Transport<L> + 'static,
    C: Choreography<L> + ?Sized,
{
    let projector = Projector::new(transport, location)?;
    let result = projector.epp(chor, args).await;
    let teardown = projector.teardown().await;
    let output = result?;
    teardown?;
    Ok(output)
}
