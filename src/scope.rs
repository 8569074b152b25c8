//! Scope tracking
//!
//! Operators are first-class values and can be captured, stored and invoked
//! after a suspension point, possibly from inside a nested sub-choreography
//! they were never meant to run in. Every operator handle therefore carries a
//! [`Scope`]: the tracker lane it runs on plus the [`Frame`] that was active
//! when the handle was made. Invoking the operator while a different frame is
//! live on that lane is an invalid context.
//!
//! Concurrent branches (fan-out, fan-in, calls raced against each other) each
//! run on a forked lane, so a sibling entering a narrower scope never changes
//! what another branch sees.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{ChoreographyError, Result};
use crate::location::Location;

/// One active participant set. Frames are compared by identity: entering a
/// scope always creates a new frame, even for an identical member list.
#[derive(Debug)]
pub struct Frame<L> {
    members: Vec<L>,
}

impl<L: Location> Frame<L> {
    fn new(members: Vec<L>) -> Self {
        Frame { members }
    }

    pub fn members(&self) -> &[L] {
        &self.members
    }

    pub fn contains(&self, location: &L) -> bool {
        self.members.contains(location)
    }
}

/// The live frame of one execution lane.
#[derive(Debug, Clone)]
pub struct ScopeTracker<L> {
    live: Arc<Mutex<Arc<Frame<L>>>>,
}

impl<L: Location> ScopeTracker<L> {
    /// A fresh lane whose active set is every participant.
    pub fn new(members: impl IntoIterator<Item = L>) -> Self {
        let frame = Arc::new(Frame::new(members.into_iter().collect()));
        Self::starting_at(frame)
    }

    fn starting_at(frame: Arc<Frame<L>>) -> Self {
        ScopeTracker {
            live: Arc::new(Mutex::new(frame)),
        }
    }

    fn live(&self) -> MutexGuard<'_, Arc<Frame<L>>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The frame currently active on this lane.
    pub fn active(&self) -> Arc<Frame<L>> {
        self.live().clone()
    }

    /// Capture the active frame for a new operator handle.
    pub fn snapshot(&self) -> Scope<L> {
        Scope {
            tracker: self.clone(),
            frame: self.active(),
        }
    }

    /// Run `body` with `members` as the active set, restoring the previous
    /// frame when the body finishes, fails, or is dropped.
    pub async fn with_context<F, Fut, T>(&self, members: Vec<L>, body: F) -> T
    where
        F: FnOnce(Scope<L>) -> Fut,
        Fut: Future<Output = T>,
    {
        let frame = Arc::new(Frame::new(members));
        let previous = std::mem::replace(&mut *self.live(), frame.clone());
        let _restore = Restore {
            tracker: self.clone(),
            previous: Some(previous),
        };
        tracing::trace!(members = ?frame.members(), "scope: enter");
        body(Scope {
            tracker: self.clone(),
            frame,
        })
        .await
    }
}

struct Restore<L: Location> {
    tracker: ScopeTracker<L>,
    previous: Option<Arc<Frame<L>>>,
}

impl<L: Location> Drop for Restore<L> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            tracing::trace!(members = ?previous.members(), "scope: restore");
            *self.tracker.live() = previous;
        }
    }
}

/// A frame snapshot bound to the lane it was taken on.
#[derive(Debug, Clone)]
pub struct Scope<L> {
    tracker: ScopeTracker<L>,
    frame: Arc<Frame<L>>,
}

impl<L: Location> Scope<L> {
    /// Fails unless the captured frame is still the live one.
    pub fn check(&self) -> Result<()> {
        let live = self.tracker.active();
        if Arc::ptr_eq(&live, &self.frame) {
            Ok(())
        } else {
            Err(ChoreographyError::ScopeViolation(format!(
                "operator bound to a frame over {:?} invoked after its lane switched to \
                 another frame over {:?}",
                self.frame.members(),
                live.members()
            )))
        }
    }

    /// Fails unless `location` belongs to the captured frame.
    pub fn require(&self, location: L) -> Result<()> {
        if self.frame.contains(&location) {
            Ok(())
        } else {
            Err(ChoreographyError::ScopeViolation(format!(
                "location {:?} is outside the active scope {:?}",
                location,
                self.frame.members()
            )))
        }
    }

    pub fn require_all(&self, locations: &[L]) -> Result<()> {
        locations.iter().try_for_each(|l| self.require(*l))
    }

    pub fn members(&self) -> &[L] {
        self.frame.members()
    }

    pub fn contains(&self, location: &L) -> bool {
        self.frame.contains(location)
    }

    pub fn tracker(&self) -> &ScopeTracker<L> {
        &self.tracker
    }

    /// Same frame on a new lane, for a branch that runs concurrently with
    /// its siblings.
    pub fn fork(&self) -> Scope<L> {
        Scope {
            tracker: ScopeTracker::starting_at(self.frame.clone()),
            frame: self.frame.clone(),
        }
    }
}
