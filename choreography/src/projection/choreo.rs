// Operator implementations
//
// Every participant replays the same choreography through its own `Choreo`
// handle. An operator compares the locations it names with the local one and
// either does the work, waits for the matching envelope, or steps over it.

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

use locus::{
    Capability, Colocated, Faceted, Guarded, Located, Location, Placeholder, Result, Scope, Tag,
};

use super::mailbox::Mailbox;
use crate::log::Log;
use crate::transport::{Envelope, Transport};

/// What every handle of one projection shares.
pub(crate) struct Endpoint<L: Location> {
    pub(crate) location: L,
    pub(crate) transport: Arc<dyn Transport<L>>,
    pub(crate) mailbox: Arc<Mailbox<L>>,
    pub(crate) log: Option<Arc<dyn Log>>,
}

/// A protocol written from the global viewpoint.
///
/// `run` is executed at every participant with that participant's operator
/// handle; the operators decide which steps are local.
#[async_trait]
pub trait Choreography<L: Location>: Send + Sync {
    type Args: Send;
    type Output: Send;

    async fn run(&self, op: Choreo<L>, args: Self::Args) -> Result<Self::Output>;
}

/// A [`Choreography`] backed by a closure. See [`choreography`].
pub struct FnChoreography<F, A, O> {
    f: F,
    _marker: PhantomData<fn(A) -> O>,
}

/// Adapt an async closure into a [`Choreography`].
///
/// ```
/// use locus_choreography::{choreography, Choreo, Located};
///
/// let double = choreography(|op: Choreo<char>, n: Located<u32, char>| async move {
///     op.locally('a', |un| Ok(un.get(&n)? * 2))
/// });
/// # let _ = double;
/// ```
pub fn choreography<L, F, Fut, A, O>(f: F) -> FnChoreography<F, A, O>
where
    L: Location,
    F: Fn(Choreo<L>, A) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O>> + Send,
{
    FnChoreography {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<L, F, Fut, A, O> Choreography<L> for FnChoreography<F, A, O>
where
    L: Location,
    F: Fn(Choreo<L>, A) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O>> + Send,
    A: Send,
    O: Send,
{
    type Args = A;
    type Output = O;

    async fn run(&self, op: Choreo<L>, args: A) -> Result<O> {
        (self.f)(op, args).await
    }
}

/// Read access to values owned by the local participant, handed to the
/// callbacks of [`Choreo::locally`] and [`Choreo::parallel`].
#[derive(Clone, Debug)]
pub struct Unwrap<L> {
    location: L,
    capability: Capability,
}

impl<L: Location> Unwrap<L> {
    /// The participant running the callback.
    pub fn location(&self) -> L {
        self.location
    }

    pub fn get<'a, V: Guarded>(&self, value: &'a V) -> Result<&'a V::Value> {
        value.read(&self.capability)
    }
}

/// Operator handle of one participant.
///
/// Cloning is cheap; clones share the causal tag and the scope they were
/// created in. A handle used after its scope was left, or while a narrower
/// scope is active on its lane, fails with a scope violation.
#[derive(Clone)]
pub struct Choreo<L: Location> {
    endpoint: Arc<Endpoint<L>>,
    capability: Capability,
    tag: Arc<Mutex<Tag>>,
    scope: Scope<L>,
}

impl<L: Location> std::fmt::Debug for Choreo<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Choreo")
            .field("location", &self.endpoint.location)
            .field("tag", &self.tag())
            .field("scope", &self.scope.members())
            .finish()
    }
}

impl<L: Location> Choreo<L> {
    pub(crate) fn new(
        endpoint: Arc<Endpoint<L>>,
        capability: Capability,
        tag: Tag,
        scope: Scope<L>,
    ) -> Self {
        Choreo {
            endpoint,
            capability,
            tag: Arc::new(Mutex::new(tag)),
            scope,
        }
    }

    /// The participant this handle projects to.
    pub fn location(&self) -> L {
        self.endpoint.location
    }

    /// The active participant set.
    pub fn scope(&self) -> &[L] {
        self.scope.members()
    }

    /// The persistence hook configured on the projector, if any.
    pub fn log(&self) -> Option<&dyn Log> {
        self.endpoint.log.as_deref()
    }

    /// The causal position of the last communication on this handle.
    pub fn tag(&self) -> Tag {
        self.tag_lock().clone()
    }

    fn tag_lock(&self) -> MutexGuard<'_, Tag> {
        self.tag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reader(&self) -> Unwrap<L> {
        Unwrap {
            location: self.location(),
            capability: self.capability.clone(),
        }
    }

    fn enter(&self, involved: &[L]) -> Result<()> {
        self.scope.check()?;
        self.scope.require_all(involved)
    }

    fn next_tag(&self) -> Result<Tag> {
        let mut tag = self.tag_lock();
        tag.comm()?;
        Ok(tag.clone())
    }

    /// A handle for a sub-choreography: child tag, same frame on its own lane.
    fn fork(&self) -> Result<Choreo<L>> {
        let tag = self.tag_lock().call()?;
        Ok(Choreo::new(
            self.endpoint.clone(),
            self.capability.clone(),
            tag,
            self.scope.fork(),
        ))
    }

    fn forks(&self, n: usize) -> Result<Vec<Choreo<L>>> {
        (0..n).map(|_| self.fork()).collect()
    }

    async fn send<T: Serialize + ?Sized>(&self, to: L, tag: &Tag, payload: &T) -> Result<()> {
        let from = self.location();
        let envelope = Envelope::seal(from, tag.clone(), payload)?;
        debug!(?from, ?to, %tag, "send");
        self.endpoint.transport.send(to, envelope).await
    }

    async fn receive<T: DeserializeOwned>(&self, from: L, tag: &Tag) -> Result<T> {
        let to = self.location();
        trace!(?from, ?to, %tag, "receive: waiting");
        let data = self.endpoint.mailbox.receive(from, tag).await?;
        debug!(?from, ?to, %tag, "receive");
        Ok(serde_json::from_value(data)?)
    }

    /// Run `f` at `at` only. Every other participant gets a placeholder.
    pub fn locally<T, F>(&self, at: L, f: F) -> Result<Located<T, L>>
    where
        F: FnOnce(&Unwrap<L>) -> Result<T>,
    {
        self.enter(&[at])?;
        if at != self.location() {
            trace!(location = ?self.location(), ?at, "locally: skipped");
            return Ok(Located::remote());
        }
        let value = f(&self.reader())?;
        Ok(Located::new(value, &self.capability))
    }

    /// [`locally`](Self::locally) for an asynchronous computation.
    pub async fn locally_async<T, F, Fut>(&self, at: L, f: F) -> Result<Located<T, L>>
    where
        F: FnOnce(Unwrap<L>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.enter(&[at])?;
        if at != self.location() {
            trace!(location = ?self.location(), ?at, "locally: skipped");
            return Ok(Located::remote());
        }
        let value = f(self.reader()).await?;
        Ok(Located::new(value, &self.capability))
    }

    /// Move a value from `from` to `to`.
    pub async fn comm<T>(&self, from: L, to: L, value: &Located<T, L>) -> Result<Located<T, L>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync,
    {
        self.enter(&[from, to])?;
        let tag = self.next_tag()?;
        let me = self.location();
        if from == to {
            return Ok(value.clone());
        }
        if me == from {
            self.send(to, &tag, value.get(&self.capability)?).await?;
            Ok(Located::remote())
        } else if me == to {
            let data = self.receive(from, &tag).await?;
            Ok(Located::new(data, &self.capability))
        } else {
            trace!(location = ?me, ?from, ?to, %tag, "comm: skipped");
            Ok(Located::remote())
        }
    }

    /// Send one value from `from` to every location in `to`. The result is
    /// shared by the sender and all receivers.
    pub async fn multicast<T>(
        &self,
        from: L,
        to: &[L],
        value: &Located<T, L>,
    ) -> Result<Colocated<T, L>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync,
    {
        self.enter(&[from])?;
        self.scope.require_all(to)?;
        let tag = self.next_tag()?;
        let me = self.location();

        let mut owners = vec![from];
        for l in to {
            if !owners.contains(l) {
                owners.push(*l);
            }
        }

        if me == from {
            let payload = value.get(&self.capability)?;
            for receiver in owners.iter().filter(|l| **l != from) {
                self.send(*receiver, &tag, payload).await?;
            }
            Ok(Colocated::new(payload.clone(), owners, &self.capability))
        } else if owners.contains(&me) {
            let data = self.receive(from, &tag).await?;
            Ok(Colocated::new(data, owners, &self.capability))
        } else {
            trace!(location = ?me, ?from, %tag, "multicast: skipped");
            Ok(Colocated::remote())
        }
    }

    /// Send a value from `from` to every member of the active scope. Every
    /// member gets the plain value.
    pub async fn broadcast<T>(&self, from: L, value: &Located<T, L>) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync,
    {
        self.enter(&[from])?;
        let tag = self.next_tag()?;
        if self.location() == from {
            let payload = value.get(&self.capability)?;
            for receiver in self.scope.members().iter().filter(|l| **l != from) {
                self.send(*receiver, &tag, payload).await?;
            }
            Ok(payload.clone())
        } else {
            self.receive(from, &tag).await
        }
    }

    /// Run `chor` with only `members` in scope. Participants outside the set
    /// skip the body and get [`Placeholder::placeholder`].
    ///
    /// The narrowed frame replaces the one on this handle's lane until the
    /// body returns, so any other operator on the same lane fails meanwhile,
    /// including a second `colocally`. Scoped calls that run concurrently
    /// must each be wrapped in [`call`](Self::call), which gives them their
    /// own lane.
    #[doc(alias = "enclave")]
    #[doc(alias = "conclave")]
    pub async fn colocally<C>(&self, members: &[L], chor: &C, args: C::Args) -> Result<C::Output>
    where
        C: Choreography<L> + ?Sized,
        C::Output: Placeholder,
    {
        self.enter(members)?;
        let tag = self.tag_lock().call()?;
        let me = self.location();
        if !members.contains(&me) {
            trace!(location = ?me, ?members, %tag, "colocally: skipped");
            return Ok(C::Output::placeholder());
        }
        debug!(location = ?me, ?members, %tag, "colocally: enter");
        let endpoint = self.endpoint.clone();
        let capability = self.capability.clone();
        self.scope
            .tracker()
            .with_context(members.to_vec(), |scope| async move {
                chor.run(Choreo::new(endpoint, capability, tag, scope), args)
                    .await
            })
            .await
    }

    /// Run a sub-choreography under a child tag without narrowing the scope.
    pub async fn call<C>(&self, chor: &C, args: C::Args) -> Result<C::Output>
    where
        C: Choreography<L> + ?Sized,
    {
        self.enter(&[])?;
        chor.run(self.fork()?, args).await
    }

    /// Read a jointly owned value held by the local participant.
    #[doc(alias = "naked")]
    pub fn peel<T: Clone>(&self, value: &Colocated<T, L>) -> Result<T> {
        self.enter(&[])?;
        value.get(&self.capability).cloned()
    }

    /// Run one sub-choreography per target concurrently, each producing a
    /// value at its target.
    pub async fn fanout<T, C, B>(&self, targets: &[L], build: B) -> Result<Faceted<T, L>>
    where
        B: Fn(L) -> C,
        C: Choreography<L, Args = (), Output = Located<T, L>>,
    {
        self.enter(targets)?;
        let ops = self.forks(targets.len())?;
        let branches = targets.iter().zip(ops).map(|(&target, op)| {
            let chor = build(target);
            async move { chor.run(op, ()).await.map(|value| (target, value)) }
        });
        let facets = try_join_all(branches).await?;
        Ok(facets.into_iter().collect())
    }

    /// Run one sub-choreography per source concurrently, each producing a
    /// value shared with `to`, and gather them keyed by source.
    pub async fn fanin<T, C, B>(
        &self,
        from: &[L],
        to: &[L],
        build: B,
    ) -> Result<Colocated<HashMap<L, T>, L>>
    where
        B: Fn(L) -> C,
        C: Choreography<L, Args = (), Output = Colocated<T, L>>,
    {
        self.enter(from)?;
        self.scope.require_all(to)?;
        let ops = self.forks(from.len())?;
        let branches = from.iter().zip(ops).map(|(&source, op)| {
            let chor = build(source);
            async move { chor.run(op, ()).await.map(|value| (source, value)) }
        });
        let gathered = try_join_all(branches).await?;

        if !to.contains(&self.location()) {
            return Ok(Colocated::remote());
        }
        let values = gathered
            .into_iter()
            .map(|(source, value)| value.into_inner(&self.capability).map(|v| (source, v)))
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Colocated::new(values, to.to_vec(), &self.capability))
    }

    /// Run `f` at each listed location; the local participant runs only its
    /// own entry.
    pub async fn parallel<T, F, Fut>(&self, locations: &[L], f: F) -> Result<Faceted<T, L>>
    where
        F: FnOnce(L, Unwrap<L>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.enter(locations)?;
        let me = self.location();
        let mut facets: Vec<(L, Located<T, L>)> = locations
            .iter()
            .filter(|l| **l != me)
            .map(|l| (*l, Located::remote()))
            .collect();
        if locations.contains(&me) {
            let value = f(me, self.reader()).await?;
            facets.push((me, Located::new(value, &self.capability)));
        }
        Ok(facets.into_iter().collect())
    }
}
