//! Envelopes of the runtime-scoped variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of an addressable context (a tab) on a runtime transport.
pub type TabId = i64;

/// A message dispatched over a [`crate::runtime::RuntimeTransport`].
///
/// Wire shape: `{ "async": bool, "payload": any, "scope": string, "tabId": number|null }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoreMessage {
    /// Whether the sender waits for a reply.
    #[serde(rename = "async")]
    pub is_async: bool,
    #[serde(default)]
    pub payload: Value,

    /// Keeps independent messengers sharing one transport apart.
    pub scope: String,
    #[serde(rename = "tabId", default)]
    pub tab_id: Option<TabId>,
}

impl CoreMessage {
    /// Parse a core message out of a raw value, if it is one.
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    /// Serialize the message into a raw value for dispatching.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// The reply handed to the single reply callback of a dispatch.
///
/// Wire shape: `{ "payload": any, "success": bool }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoreResponse {
    #[serde(default)]
    pub payload: Value,
    pub success: bool,
}

impl CoreResponse {
    /// A successful reply.
    pub fn success(payload: Value) -> Self {
        Self {
            payload,
            success: true,
        }
    }

    /// A failed reply; `payload` describes the failure.
    pub fn failure(payload: Value) -> Self {
        Self {
            payload,
            success: false,
        }
    }

    /// Serialize the response into a raw value for replying.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// The human readable failure text carried by the payload.
    ///
    /// This is the payload itself if it is a string, otherwise its `greeting` or
    /// `message` string field, otherwise the payload rendered as JSON.
    pub fn error_message(&self) -> String {
        match &self.payload {
            Value::String(message) => message.clone(),
            payload => ["greeting", "message"]
                .iter()
                .find_map(|field| payload.get(field).and_then(Value::as_str))
                .map(str::to_owned)
                .unwrap_or_else(|| payload.to_string()),
        }
    }
}
