//! HTTP transport for locus choreographies
//!
//! Every participant listens on its own socket address. Sending an envelope
//! is one `POST /envelope` carrying the JSON wire form to the receiver's
//! address; a non-2xx answer fails the send. Inbound envelopes are buffered
//! until the projector's subscription drains them.

#![forbid(unsafe_code)]

mod config;
mod transport;

pub use config::HttpConfig;
pub use transport::HttpTransport;
