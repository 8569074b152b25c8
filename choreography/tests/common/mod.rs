#![allow(dead_code)]

use locus_choreography::{run, Choreography, LocalBus, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Alice,
    Bob,
    Carol,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Run `chor` once at every location over a fresh in-process bus and collect
/// each participant's result, in the order of `locations`.
pub async fn deploy<C>(locations: &[Role], chor: &C) -> Vec<Result<C::Output>>
where
    C: Choreography<Role, Args = ()>,
{
    init_tracing();
    let bus = LocalBus::new(locations.iter().copied());
    futures::future::join_all(
        locations
            .iter()
            .map(|&at| run(bus.transport(at), at, chor, ())),
    )
    .await
}

/// Shared sink that `locally` callbacks push observations into.
pub type Recorder<T> = Arc<Mutex<Vec<T>>>;

pub fn recorder<T>() -> Recorder<T> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn recorded<T: Clone + Ord>(recorder: &Recorder<T>) -> Vec<T> {
    let mut seen = recorder.lock().unwrap().clone();
    seen.sort();
    seen
}
