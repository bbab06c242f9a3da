//! Envelopes put on the wire around every payload.
//!
//! [`Message`] and [`Response`] travel through [`crate::Endpoint`]s and are
//! correlated by their `id`. [`CoreMessage`] and [`CoreResponse`] belong to the
//! runtime-scoped variant, where the transport pairs a dispatch with its reply.

mod message;
pub use message::*;

mod scoped;
pub use scoped::*;
