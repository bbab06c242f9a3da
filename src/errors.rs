//! Error types.
//!

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::token::RequestId;

#[derive(Error, Debug)]
pub enum CourierError {
    #[error("The port \"{0}\" is not registered")]
    UnregisteredDestination(String),
    #[error("Could not derive target destination name or destination name is empty")]
    UnderivableDestination,
    #[error("{0}")]
    TransportPostFailure(String),
    #[error("Remote failure: {0}")]
    Remote(Value),
    #[error("{0}")]
    RemoteRejected(String),
    #[error("{0}")]
    TransportLastError(String),
    #[error("No response was received.")]
    NoResponse,
    #[error("Request {0} is already pending.")]
    DuplicateRequest(RequestId),
    #[error("Request {0} was cancelled.")]
    Cancelled(RequestId),
    #[error("Request {id} did not receive a reply within {timeout:?}.")]
    Timeout { id: RequestId, timeout: Duration },
    #[error("Request {0} was dropped before a reply arrived.")]
    Dropped(RequestId),
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Invalid destination list: {0}")]
    InvalidDestinations(String),
}
