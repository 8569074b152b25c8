//! Minimal concurrency primitives
//!
//! Both primitives are runtime-agnostic: waiters park on
//! `futures::channel::oneshot` receivers, so they work under tokio, the
//! futures executors, or anything else that polls.

mod ivar;
mod queue;

pub use ivar::IVar;
pub use queue::AsyncQueue;

use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
