//! Envelopes exchanged with named endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::token::RequestId;

/// An outbound envelope.
///
/// Wire shape: `{ "id": string, "target": string, "payload": any, "only": bool }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: RequestId,
    pub target: String,
    #[serde(default)]
    pub payload: Value,

    /// Fire-and-forget: no reply is expected for this message.
    pub only: bool,
}

impl Message {
    /// A message that expects a [`Response`] carrying the same `id`.
    pub fn correlated(id: RequestId, target: &str, payload: Value) -> Self {
        Self {
            id,
            target: target.to_owned(),
            payload,
            only: false,
        }
    }

    /// A fire-and-forget message. The `id` is only there for tracing.
    pub fn only(id: RequestId, target: &str, payload: Value) -> Self {
        Self {
            id,
            target: target.to_owned(),
            payload,
            only: true,
        }
    }

    /// Parse a message out of a raw value, if it is one.
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    /// Serialize the message into a raw value for posting.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// An inbound envelope, matched against pending requests by `id` only.
///
/// Wire shape: `{ "id": string, "payload": any, "success": bool, "target": string }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: RequestId,
    #[serde(default)]
    pub payload: Value,
    pub success: bool,

    /// Name of the endpoint the response came from; informational only.
    #[serde(default)]
    pub target: String,
}

impl Response {
    /// A successful response to the message with the given `id`.
    pub fn success(id: RequestId, target: &str, payload: Value) -> Self {
        Self {
            id,
            payload,
            success: true,
            target: target.to_owned(),
        }
    }

    /// A failed response to the message with the given `id`.
    pub fn failure(id: RequestId, target: &str, payload: Value) -> Self {
        Self {
            id,
            payload,
            success: false,
            target: target.to_owned(),
        }
    }

    /// Parse a response out of a raw value, if it is one.
    ///
    /// Outbound [`Message`]s have no `success` field and are therefore never
    /// mistaken for responses.
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    /// Serialize the response into a raw value for posting.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
