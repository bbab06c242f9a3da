//! Named endpoints that payloads are posted to, and the registry that finds them.
//!
//! An [`Endpoint`] is a fire-and-forget channel: [`Endpoint::post`] hands a value
//! over and returns, and anything coming back is pushed to the handlers given to
//! [`Endpoint::subscribe`]. There is no notion of a reply at this level; that is
//! what [`crate::Courier`] adds on top.

use serde_json::Value;
use std::sync::Arc;

use crate::CourierError;

mod registry;
pub use registry::*;

mod port;
pub use port::*;

mod responder;
pub use responder::*;

/// A handler invoked once for every inbound value of an [`Endpoint`].
pub type InboundHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// A named, bidirectional communication channel.
pub trait Endpoint: Send + Sync {
    /// The name the endpoint is registered under.
    fn name(&self) -> &str;

    /// Post a value through the endpoint.
    ///
    /// Errors are transport failures and are handed to the caller unchanged.
    fn post(&self, value: Value) -> Result<(), CourierError>;

    /// Add a handler for inbound values.
    ///
    /// Endpoints must support any number of independent subscriptions.
    fn subscribe(&self, handler: InboundHandler);
}
