//! A scoped channel over a shared [`RuntimeTransport`].
//!

use serde_json::Value;
use std::{future::Future, sync::Arc};
use tokio::sync::oneshot;

use super::{ReplyCallback, ReplyHandle, RuntimeListener, RuntimeTransport};
use crate::{CoreMessage, CoreResponse, CourierError, TabId};

/// How a [`ScopedMessenger::send`] is dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendOptions {
    /// Whether to wait for the reply.
    pub is_async: bool,

    /// The tab to send to; the whole runtime if [`None`].
    pub tab_id: Option<TabId>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            is_async: true,
            tab_id: None,
        }
    }
}

impl SendOptions {
    /// Wait for the reply, and send to the whole runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to wait for the reply.
    pub fn with_async(mut self, is_async: bool) -> Self {
        self.is_async = is_async;
        self
    }

    /// Send to the tab `tab_id` instead of the whole runtime.
    pub fn with_tab(mut self, tab_id: TabId) -> Self {
        self.tab_id = Some(tab_id);
        self
    }
}

/// One named scope on a shared [`RuntimeTransport`].
///
/// Any number of messengers can share a transport; the scope every
/// [`CoreMessage`] is tagged with keeps their traffic apart.
pub struct ScopedMessenger {
    scope: String,
    transport: Arc<dyn RuntimeTransport>,
}

impl ScopedMessenger {
    /// Create a new messenger for `scope` on `transport`.
    pub fn new(scope: &str, transport: Arc<dyn RuntimeTransport>) -> Self {
        Self {
            scope: scope.to_owned(),
            transport,
        }
    }

    /// Create a new messenger, and return the atomic reference to it.
    pub fn new_arc(scope: &str, transport: Arc<dyn RuntimeTransport>) -> Arc<Self> {
        Arc::new(Self::new(scope, transport))
    }

    /// The scope of this messenger.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Send `payload` in this scope, to the whole runtime or to the tab named in
    /// `options`.
    ///
    /// If `options.is_async` is unset, nothing is waited for and the result is
    /// [`Value::Null`]. Otherwise the reply decides:
    ///
    /// - an error reported by [`RuntimeTransport::last_error`] rejects with
    ///   [`CourierError::TransportLastError`], whatever the reply says;
    /// - no reply rejects with [`CourierError::NoResponse`];
    /// - a [`CoreResponse`] without `success` rejects with
    ///   [`CourierError::RemoteRejected`], see [`CoreResponse::error_message`];
    /// - anything else resolves with the reply's payload.
    ///
    /// If the transport holds on to the reply callback and never calls it, this
    /// never completes.
    pub async fn send(
        &self,
        payload: impl Into<Value>,
        options: SendOptions,
    ) -> Result<Value, CourierError> {
        let message = CoreMessage {
            is_async: options.is_async,
            payload: payload.into(),
            scope: self.scope.clone(),
            tab_id: options.tab_id,
        }
        .to_value()?;

        if !options.is_async {
            self.dispatch(options.tab_id, message, Box::new(|_: Option<Value>| {}));
            return Ok(Value::Null);
        }

        let (sender, receiver) = oneshot::channel();
        let weak_transport = Arc::downgrade(&self.transport);

        self.dispatch(
            options.tab_id,
            message,
            Box::new(move |response: Option<Value>| {
                let last_error = weak_transport
                    .upgrade()
                    .and_then(|transport| transport.last_error());

                // The sender may have given up already.
                let _ = sender.send(settle_reply(last_error, response));
            }),
        );

        receiver.await.unwrap_or(Err(CourierError::NoResponse))
    }

    /// Answer the runtime messages of this scope with `handler`.
    ///
    /// `Ok` becomes a successful [`CoreResponse`], `Err` a failed one. Messages of
    /// other scopes are left to other listeners.
    pub fn listen<F, Fut>(&self, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        self.transport.add_listener(self.scoped_listener(handler));
    }

    /// Answer the messages of this scope sent to tab `tab_id` with `handler`.
    pub fn listen_tab<F, Fut>(&self, tab_id: TabId, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        self.transport.add_tab_listener(tab_id, self.scoped_listener(handler));
    }

    fn dispatch(&self, tab_id: Option<TabId>, message: Value, reply: ReplyCallback) {
        logger::debug!(
            "Dispatching in scope {scope:?}: {message}",
            scope = self.scope
        );

        match tab_id {
            Some(tab_id) => self.transport.send_tab_message(tab_id, message, reply),
            None => self.transport.send_message(message, reply),
        }
    }

    /// Wrap `handler` into a listener that only takes on this scope's messages.
    ///
    /// The handler runs on its own tokio task, so listeners must be invoked
    /// from within a tokio runtime; outside of one, messages are declined.
    fn scoped_listener<F, Fut>(&self, handler: F) -> RuntimeListener
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        let scope = self.scope.clone();
        let handler = Arc::new(handler);

        Arc::new(move |value: &Value, reply: ReplyHandle| {
            let Some(message) = CoreMessage::from_value(value) else {
                return false;
            };
            if message.scope != scope {
                return false;
            }

            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                logger::error!(
                    "Cannot handle a message in scope {scope:?} outside of a tokio runtime."
                );
                return false;
            };

            let handler = Arc::clone(&handler);
            runtime.spawn(async move {
                let response = match handler(message.payload).await {
                    Ok(payload) => CoreResponse::success(payload),
                    Err(payload) => CoreResponse::failure(payload),
                };

                match response.to_value() {
                    Ok(response) => {
                        if !reply.respond(response) {
                            logger::debug!(
                                "Reply in scope {scope:?} was already given.",
                                scope = message.scope
                            );
                        }
                    }
                    Err(err) => {
                        logger::error!("Failed to serialize a reply: {err}");
                        reply.abandon();
                    }
                }
            });

            true
        })
    }
}

/// Turn what a reply callback was invoked with into the outcome of a send.
fn settle_reply(
    last_error: Option<String>,
    response: Option<Value>,
) -> Result<Value, CourierError> {
    if let Some(message) = last_error {
        return Err(CourierError::TransportLastError(message));
    }

    let response: CoreResponse = serde_json::from_value(response.ok_or(CourierError::NoResponse)?)?;
    if response.success {
        Ok(response.payload)
    } else {
        Err(CourierError::RemoteRejected(response.error_message()))
    }
}
