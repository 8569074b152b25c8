//! Runtime primitives for choreographic endpoint projection
//!
//! A choreography is one program describing a whole multi-party protocol. The
//! engine in `locus-choreography` replays that program at every participant
//! and keeps only the steps belonging to the local participant. This crate
//! holds the pieces that make the replay safe without a compiler's help:
//!
//! - [`Tag`]: the causal path identifier every participant computes
//!   identically, used to pair each send with its receive.
//! - [`AsyncQueue`] and [`IVar`]: the two concurrency primitives transports
//!   and mailboxes are built from.
//! - [`ScopeTracker`]: the active participant set of nested sub-choreographies,
//!   and the check that catches operators escaping their scope.
//! - [`Located`], [`Colocated`] and [`Faceted`]: values gated by the
//!   [`Capability`] minted for one projection.

#![forbid(unsafe_code)]

pub mod error;
pub mod located;
pub mod location;
pub mod scope;
pub mod sync;
pub mod tag;

pub use error::{ChoreographyError, Result};
pub use located::{Capability, Colocated, Faceted, Guarded, Located, Placeholder};
pub use location::Location;
pub use scope::{Frame, Scope, ScopeTracker};
pub use sync::{AsyncQueue, IVar};
pub use tag::Tag;
