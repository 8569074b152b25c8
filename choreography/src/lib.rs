//! Choreographic programming by runtime endpoint projection
//!
//! A choreography is written once, from the global viewpoint, as an async
//! function over a [`Choreo`] operator handle. The [`Projector`] binds it to
//! one concrete participant and one [`Transport`]; running the projected
//! program at every participant realizes the whole protocol. Steps owned by
//! other participants become no-ops, and each send is paired with its
//! receive by the causal [`Tag`](locus::Tag) every participant computes
//! identically.
//!
//! ```no_run
//! use locus_choreography::{choreography, Choreo, LocalBus, Projector};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
//! enum Role {
//!     Alice,
//!     Bob,
//! }
//!
//! # async fn demo() -> locus_choreography::Result<()> {
//! let hello = choreography(|op: Choreo<Role>, (): ()| async move {
//!     let msg = op.locally(Role::Alice, |_| Ok(String::from("hello")))?;
//!     let msg = op.comm(Role::Alice, Role::Bob, &msg).await?;
//!     op.locally(Role::Bob, |un| Ok(println!("{}", un.get(&msg)?)))?;
//!     Ok(())
//! });
//!
//! let bus = LocalBus::new([Role::Alice, Role::Bob]);
//! let alice = Projector::new(bus.transport(Role::Alice), Role::Alice)?;
//! let bob = Projector::new(bus.transport(Role::Bob), Role::Bob)?;
//! let (a, b) = futures::join!(alice.epp(&hello, ()), bob.epp(&hello, ()));
//! a?;
//! b?;
//! # Ok(())
//! # }
//! ```

pub mod log;
pub mod projection;
pub mod transport;

// Re-export main APIs
pub use locus::{
    Capability, ChoreographyError, Colocated, Faceted, Located, Location, Placeholder, Result,
    Tag,
};
pub use log::{FileLog, InMemoryLog, Log, LogExt};
pub use projection::{
    choreography, run, Choreo, Choreography, FnChoreography, LocalProgram, Projector, Unwrap,
};
pub use transport::middleware::{Metrics, Trace};
pub use transport::{
    spawn_pump, Delivery, Envelope, LocalBus, LocalTransport, NoOpTransport, Subscription,
    Transport,
};

#[cfg(feature = "test-utils")]
pub use transport::middleware::FaultInjection;
