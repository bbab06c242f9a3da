//! The runtime-scoped variant.
//!
//! Here the transport itself pairs every dispatch with exactly one reply
//! callback, so there are no request identifiers to correlate. Instead, many
//! independent [`ScopedMessenger`]s share one [`RuntimeTransport`], and each one
//! only answers the messages tagged with its own scope.

mod transport;
pub use transport::*;

mod local;
pub use local::*;

mod messenger;
pub use messenger::*;
