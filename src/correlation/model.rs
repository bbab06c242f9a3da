//! The main correlation struct that sends payloads and matches their replies.
//!

use serde_json::Value;
use std::sync::{Arc, Mutex, Weak};

use super::Reply;
use crate::{
    token, CourierError, Endpoint, EndpointRegistry, Message, Outcome, PendingRequests, Response,
};

/// The correlation core.
///
/// A [`Courier`] looks destinations up in the [`EndpointRegistry`] it was given,
/// posts [`Message`]s to them, and matches inbound [`Response`]s to the requests
/// that are still pending, by request identifier only.
///
/// The first correlated send to an endpoint subscribes one handler to it; every
/// later request to the same endpoint shares that handler. The handlers only hold
/// weak references back into the [`Courier`], so dropping the [`Courier`] leaves
/// inert handlers behind rather than keeping it alive. Requests still pending at
/// that point complete with [`CourierError::Dropped`].
///
/// It is recommended to wrap the [`Courier`] in an [`Arc`] (see [`Self::new_arc`])
/// to share it between tasks.
pub struct Courier {
    registry: Arc<EndpointRegistry>,

    /// The requests awaiting a reply.
    pending: Arc<PendingRequests>,

    /// The endpoints that already carry this courier's handler.
    ///
    /// Held weakly, and compared by address; a [`Weak`] keeps its allocation, so
    /// the address cannot be reused by another endpoint while it is listed here.
    wired: Mutex<Vec<Weak<dyn Endpoint>>>,
}

impl Courier {
    /// Create a new [`Courier`] over the given registry.
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self {
            registry,
            pending: PendingRequests::new_arc(),
            wired: Mutex::new(Vec::new()),
        }
    }

    /// Create a new [`Courier`], and return the atomic reference to it.
    pub fn new_arc(registry: Arc<EndpointRegistry>) -> Arc<Self> {
        Arc::new(Self::new(registry))
    }

    /// The registry destinations are looked up in.
    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    /// Get the number of requests still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if the request with the given identifier is still waiting for a reply.
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    /// Give up on a pending request.
    ///
    /// Its waiter is rejected with [`CourierError::Cancelled`], and a response
    /// arriving later is ignored. Returns whether the request was pending.
    pub fn cancel(&self, id: &str) -> bool {
        let cancelled = self
            .pending
            .settle(id, Err(CourierError::Cancelled(id.to_owned())));
        if cancelled {
            logger::debug!("Cancelled request {id}.");
        }
        cancelled
    }

    /// Send `payload` to `destination` and return the [`Reply`] to await.
    ///
    /// Dispatch happens right away, before the [`Reply`] is polled: the
    /// destination is looked up, a request identifier is issued, the pending entry
    /// is staged, the endpoint's handler is attached if it was not already, and
    /// the [`Message`] is posted. Any failure on the way is what the [`Reply`]
    /// resolves to:
    ///
    /// - the registry's [`CourierError::UnregisteredDestination`], unchanged;
    /// - whatever error the endpoint's post returned, unchanged, after the
    ///   pending entry has been removed again.
    ///
    /// Once dispatched, the [`Reply`] resolves with the payload of the matching
    /// [`Response`] if `success` is set, and rejects with
    /// [`CourierError::Remote`] carrying the payload otherwise.
    pub fn send(&self, payload: impl Into<Value>, destination: &str) -> Reply {
        let endpoint = match self.registry.get(destination) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                logger::debug!("Cannot send to {destination:?}: {err}");
                return Reply::failed(None, err);
            }
        };

        let id = token::generate_id();
        let receiver = match self.pending.register(id.clone()) {
            Ok(receiver) => receiver,
            Err(err) => return Reply::failed(Some(id), err),
        };

        self.ensure_listener(&endpoint);

        let posted = Message::correlated(id.clone(), destination, payload.into())
            .to_value()
            .map_err(CourierError::from)
            .and_then(|value| endpoint.post(value));

        if let Err(err) = posted {
            logger::warn!("Failed to post request {id} to {destination:?}: {err}");
            // A loopback endpoint may have settled the entry already; either way
            // nothing is left behind.
            self.pending.remove(&id);
            return Reply::failed(Some(id), err);
        }

        logger::debug!("Sent request {id} to {destination:?}.");
        Reply::waiting(id, receiver, Arc::downgrade(&self.pending))
    }

    /// Send `payload` to `destination`, giving up after `timeout`.
    ///
    /// On timeout the pending entry is removed and [`CourierError::Timeout`] is
    /// returned; a response arriving afterwards is ignored.
    pub async fn send_timeout(
        &self,
        payload: impl Into<Value>,
        destination: &str,
        timeout: tokio::time::Duration,
    ) -> Outcome {
        let reply = self.send(payload, destination);
        let id = reply.id().map(str::to_owned).unwrap_or_default();

        tokio::time::timeout(timeout, reply)
            .await
            .unwrap_or_else(|_| {
                logger::warn!("Request {id} to {destination:?} timed out after {timeout:?}.");
                Err(CourierError::Timeout { id, timeout })
            })
    }

    /// Post `payload` to `destination` without waiting for any reply.
    ///
    /// Returns as soon as the post went through. No pending entry is staged; the
    /// [`Message`] still carries a fresh identifier for tracing.
    ///
    /// # Errors
    ///
    /// - [`CourierError::UnderivableDestination`] if `destination` is empty,
    ///   before the registry is consulted;
    /// - the registry's [`CourierError::UnregisteredDestination`], unchanged;
    /// - whatever error the endpoint's post returned, unchanged.
    pub fn only_send(
        &self,
        payload: impl Into<Value>,
        destination: &str,
    ) -> Result<(), CourierError> {
        if destination.is_empty() {
            return Err(CourierError::UnderivableDestination);
        }

        let endpoint = self.registry.get(destination)?;
        let message = Message::only(token::generate_id(), destination, payload.into());

        endpoint.post(message.to_value()?)?;

        logger::debug!(
            "Sent fire-and-forget message {id} to {destination:?}.",
            id = message.id
        );
        Ok(())
    }

    /// Attach this courier's response handler to `endpoint`, unless it already is.
    ///
    /// The guard stays locked until the handler is subscribed, so a concurrent
    /// send cannot post before the handler is in place.
    fn ensure_listener(&self, endpoint: &Arc<dyn Endpoint>) {
        let mut wired = self
            .wired
            .lock()
            .unwrap_or_else(ignore_poison!("the wired endpoint list"));

        wired.retain(|wired_endpoint| wired_endpoint.strong_count() > 0);
        let already_wired = wired.iter().any(|wired_endpoint| {
            std::ptr::addr_eq(wired_endpoint.as_ptr(), Arc::as_ptr(endpoint))
        });
        if already_wired {
            return;
        }

        let weak_pending = Arc::downgrade(&self.pending);
        let _name = endpoint.name().to_owned();

        logger::debug!("Attaching response handler to {_name:?}.");
        endpoint.subscribe(Arc::new(move |value: &Value| {
            let Some(pending) = weak_pending.upgrade() else {
                return;
            };

            match Response::from_value(value) {
                Some(response) => {
                    pending.resolve(response);
                }
                None => {
                    logger::trace!("Ignoring non-response traffic on {_name:?}.");
                }
            }
        }));

        wired.push(Arc::downgrade(endpoint));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{LocalPort, _tests::*};
    use serde_json::json;

    #[tokio::test]
    async fn send_to_target() {
        let (registry, ports) = registry_with(&[BACKGROUND, OPTIONS]);
        let courier = Courier::new(registry);

        let reply = courier.send(json!({ "greeting": "set-options" }), OPTIONS);
        assert!(reply.is_waiting());

        assert_eq!(ports[0].post_count(), 0);
        assert_eq!(ports[1].post_count(), 1);

        let message = Message::from_value(&ports[1].posted()[0])
            .expect("Not a message.");
        assert_eq!(message.target, OPTIONS);
        assert_eq!(Some(message.id.as_str()), reply.id());
        assert!(!message.only);
        assert_eq!(message.payload, json!({ "greeting": "set-options" }));
    }

    #[tokio::test]
    async fn resolves_on_matching_response_id() {
        let (registry, ports) = registry_with(&[BACKGROUND]);
        reply_once(&ports[0], |id| {
            vec![Response::success(id, BACKGROUND, json!("hey yourself"))]
        });

        let courier = Courier::new(registry);
        let result = courier.send("hey there", BACKGROUND).await;

        assert_eq!(result.unwrap(), json!("hey yourself"));
        assert_eq!(courier.pending_count(), 0);
    }

    #[tokio::test]
    async fn does_not_resolve_on_other_response() {
        let (registry, ports) = registry_with(&[BACKGROUND]);
        reply_once(&ports[0], |id| {
            vec![
                Response::success("abc123".to_owned(), BACKGROUND, json!("other")),
                Response::success(id, BACKGROUND, json!("hey yourself")),
            ]
        });

        let courier = Courier::new(registry);
        let result = courier.send("hey there", BACKGROUND).await;

        assert_eq!(result.unwrap(), json!("hey yourself"));
    }

    #[tokio::test]
    async fn rejects_on_failure() {
        let (registry, ports) = registry_with(&[BACKGROUND]);
        reply_once(&ports[0], |id| {
            vec![Response::failure(id, BACKGROUND, json!("some error"))]
        });

        let courier = Courier::new(registry);
        let result = courier.send("hey there", BACKGROUND).await;

        assert!(matches!(
            result,
            Err(CourierError::Remote(payload)) if payload == json!("some error")
        ));
    }

    #[tokio::test]
    async fn unregistered_destination() {
        let (registry, ports) = registry_with(&[BACKGROUND]);
        let courier = Courier::new(registry);

        let reply = courier.send("hey there", OPTIONS);
        assert!(reply.id().is_none());
        assert!(matches!(
            reply.await,
            Err(CourierError::UnregisteredDestination(name)) if name == OPTIONS
        ));
        assert_eq!(ports[0].post_count(), 0);
    }

    #[tokio::test]
    async fn post_failure_cleans_up() {
        let (registry, ports) = registry_with(&[BACKGROUND]);
        ports[0].fail_posts_with("postError");
        let courier = Courier::new(registry);

        let result = courier.send("hey there", BACKGROUND).await;

        assert!(matches!(
            result,
            Err(CourierError::TransportPostFailure(message)) if message == "postError"
        ));
        assert_eq!(courier.pending_count(), 0);
    }

    #[tokio::test]
    async fn one_listener_per_endpoint() {
        let (registry, ports) = registry_with(&[BACKGROUND, OPTIONS]);
        let courier = Courier::new(registry);

        let replies = (0..4)
            .map(|count| courier.send(count, BACKGROUND))
            .collect::<Vec<_>>();
        let _options_reply = courier.send("hi", OPTIONS);

        assert_eq!(ports[0].subscriber_count(), 1);
        assert_eq!(ports[1].subscriber_count(), 1);
        assert_eq!(courier.pending_count(), 5);

        drop(replies);
        assert_eq!(courier.pending_count(), 1);
    }

    #[tokio::test]
    async fn replaced_endpoint_gets_its_own_listener() {
        let (registry, ports) = registry_with(&[BACKGROUND]);
        let courier = Courier::new(Arc::clone(&registry));

        let _first = courier.send("one", BACKGROUND);

        let replacement = LocalPort::new_arc(BACKGROUND);
        registry.register(replacement.clone());
        let _second = courier.send("two", BACKGROUND);

        assert_eq!(ports[0].subscriber_count(), 1);
        assert_eq!(replacement.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn late_response_after_timeout_is_ignored() {
        let (registry, ports) = registry_with(&[BACKGROUND]);
        let courier = Courier::new(registry);

        let result = courier
            .send_timeout(
                "hey there",
                BACKGROUND,
                tokio::time::Duration::from_millis(20),
            )
            .await;

        let id = match result {
            Err(CourierError::Timeout { id, .. }) => id,
            other => panic!("Expected a timeout, got {other:?}"),
        };
        assert!(!courier.is_pending(&id));

        // The late response settles nothing, and nothing panics.
        ports[0].deliver(
            &Response::success(id, BACKGROUND, json!("too late"))
                .to_value()
                .unwrap(),
        );
        assert_eq!(courier.pending_count(), 0);
    }

    #[tokio::test]
    async fn cancel() {
        let (registry, _ports) = registry_with(&[BACKGROUND]);
        let courier = Courier::new(registry);

        let reply = courier.send("hey there", BACKGROUND);
        let id = reply
            .id()
            .expect("A dispatched request has an id.")
            .to_owned();

        assert!(courier.cancel(&id));
        assert!(!courier.cancel(&id));
        assert!(matches!(
            reply.await,
            Err(CourierError::Cancelled(cancelled)) if cancelled == id
        ));
    }

    #[tokio::test]
    async fn courier_dropped_while_pending() {
        let (registry, ports) = registry_with(&[BACKGROUND]);
        let courier = Courier::new(registry);

        let reply = courier.send("hey there", BACKGROUND);
        drop(courier);

        // The orphaned handler must not panic on later traffic.
        ports[0].deliver(&json!({ "id": "abc123", "success": true }));

        assert!(matches!(reply.await, Err(CourierError::Dropped(_))));
    }

    #[tokio::test]
    async fn only_send() {
        let (registry, ports) = registry_with(&[BACKGROUND, OPTIONS]);
        let courier = Courier::new(registry);

        courier
            .only_send(json!({ "greeting": "set-options" }), OPTIONS)
            .expect("Failed to send.");

        assert_eq!(ports[0].post_count(), 0);
        assert_eq!(ports[1].post_count(), 1);
        assert_eq!(ports[1].subscriber_count(), 0);
        assert_eq!(courier.pending_count(), 0);

        let message = Message::from_value(&ports[1].posted()[0])
            .expect("Not a message.");
        assert!(message.only);
        assert_eq!(message.target, OPTIONS);
    }

    #[tokio::test]
    async fn only_send_errors() {
        let (registry, ports) = registry_with(&[BACKGROUND]);
        let courier = Courier::new(registry);

        let unregistered = courier.only_send("hey there", OPTIONS).unwrap_err();
        assert_eq!(
            unregistered.to_string(),
            format!("The port \"{OPTIONS}\" is not registered")
        );

        let underivable = courier.only_send("hey there", "").unwrap_err();
        assert!(matches!(underivable, CourierError::UnderivableDestination));
        assert_eq!(
            underivable.to_string(),
            "Could not derive target destination name or destination name is empty"
        );

        ports[0].fail_posts_with("postError");
        assert!(matches!(
            courier.only_send("hey there", BACKGROUND),
            Err(CourierError::TransportPostFailure(message)) if message == "postError"
        ));
    }
}
