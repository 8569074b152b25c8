//! Transport boundary
//!
//! The engine never talks to a network directly. A transport only has to
//! deliver an [`Envelope`] to a named participant and hand inbound envelopes
//! to whoever subscribed; correlation of sends with receives happens above it,
//! keyed by `(sender, tag)`.
//!
//! - `contract`: the [`Transport`] trait and the subscription handle
//! - `envelope`: the wire unit and its JSON form
//! - `local`: in-process bus for running every participant in one process
//! - `middleware`: tracing, metrics and fault injection wrappers

mod contract;
mod envelope;
pub mod local;
pub mod middleware;

pub use contract::{spawn_pump, Delivery, NoOpTransport, Subscription, Transport};
pub use envelope::Envelope;
pub use local::{LocalBus, LocalTransport};
