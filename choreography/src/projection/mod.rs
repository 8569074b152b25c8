//! Endpoint projection
//!
//! A [`Choreography`] is run at every participant through a [`Choreo`]
//! handle bound to that participant. The [`Projector`] owns the transport
//! subscription and the mailbox that pairs inbound envelopes with receives.

mod choreo;
mod mailbox;
mod projector;

pub use choreo::{choreography, Choreo, Choreography, FnChoreography, Unwrap};
pub use projector::{run, LocalProgram, Projector};
