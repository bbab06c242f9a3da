//! The far side of a correlated conversation.

use serde_json::Value;
use std::sync::Arc;

use super::Endpoint;
use crate::{Message, Response};

/// Answer every correlated [`Message`] arriving on `endpoint` with `handler`.
///
/// `Ok` becomes a successful [`Response`], `Err` a failed one; both carry the
/// message's `id` and are posted back through the same endpoint. Fire-and-forget
/// messages are handed to `handler` too, but nothing is posted back for them.
/// Values that are not [`Message`]s, including the responses themselves, are
/// ignored.
pub fn answer<F>(endpoint: &Arc<dyn Endpoint>, handler: F)
where
    F: Fn(Value) -> Result<Value, Value> + Send + Sync + 'static,
{
    let weak_endpoint = Arc::downgrade(endpoint);

    endpoint.subscribe(Arc::new(move |value: &Value| {
        let Some(message) = Message::from_value(value) else {
            return;
        };
        let Some(endpoint) = weak_endpoint.upgrade() else {
            return;
        };

        let only = message.only;
        let outcome = handler(message.payload);
        if only {
            logger::trace!("Handled fire-and-forget message {id}.", id = message.id);
            return;
        }

        let response = match outcome {
            Ok(payload) => Response::success(message.id, endpoint.name(), payload),
            Err(payload) => Response::failure(message.id, endpoint.name(), payload),
        };

        match response.to_value() {
            Ok(value) => {
                if let Err(err) = endpoint.post(value) {
                    logger::warn!(
                        "Failed to answer request {id} on {name}: {err}",
                        id = response.id,
                        name = endpoint.name(),
                    );
                }
            }
            Err(err) => {
                logger::error!(
                    "Failed to serialize the answer to {id}: {err}",
                    id = response.id
                );
            }
        }
    }));
}
