//! An in-process [`Endpoint`].

use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock};

use super::{Endpoint, InboundHandler};
use crate::CourierError;

/// An in-process, loopback [`Endpoint`].
///
/// Every value posted to a [`LocalPort`] is handed to every subscribed handler,
/// which makes both ends of a conversation share one port: the far side
/// subscribes to receive messages, and anything it posts back reaches the
/// [`crate::Courier`]'s handler. Posts are recorded, and the port can be told
/// to fail them, which is what the tests in this crate rely on.
#[derive(Default)]
pub struct LocalPort {
    name: String,
    handlers: RwLock<Vec<InboundHandler>>,
    posted: Mutex<Vec<Value>>,
    failure: Mutex<Option<String>>,
}

impl LocalPort {
    /// Create a new port with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Create a new port with the given name, and return the atomic reference to it.
    pub fn new_arc(name: &str) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// Make every following post fail with a [`CourierError::TransportPostFailure`]
    /// carrying `message`.
    pub fn fail_posts_with(&self, message: &str) {
        *self
            .failure
            .lock()
            .unwrap_or_else(ignore_poison!(self.name.as_str())) = Some(message.to_owned());
    }

    /// Let posts succeed again.
    pub fn recover(&self) {
        self.failure
            .lock()
            .unwrap_or_else(ignore_poison!(self.name.as_str()))
            .take();
    }

    /// Every value [`Endpoint::post`] was called with, including failed posts.
    pub fn posted(&self) -> Vec<Value> {
        self.posted
            .lock()
            .unwrap_or_else(ignore_poison!(self.name.as_str()))
            .clone()
    }

    /// The number of times [`Endpoint::post`] was called.
    pub fn post_count(&self) -> usize {
        self.posted
            .lock()
            .unwrap_or_else(ignore_poison!(self.name.as_str()))
            .len()
    }

    /// The number of subscribed handlers.
    pub fn subscriber_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(ignore_poison!(self.name.as_str()))
            .len()
    }

    /// Hand `value` to every subscribed handler without recording it as a post.
    ///
    /// Handlers run on the calling thread. The handler list is copied first, so a
    /// handler is free to post or subscribe on this very port.
    pub fn deliver(&self, value: &Value) {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(ignore_poison!(self.name.as_str()))
            .clone();

        handlers.iter().for_each(|handler| handler(value));
    }
}

impl Endpoint for LocalPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn post(&self, value: Value) -> Result<(), CourierError> {
        self.posted
            .lock()
            .unwrap_or_else(ignore_poison!(self.name.as_str()))
            .push(value.clone());

        let failure = self
            .failure
            .lock()
            .unwrap_or_else(ignore_poison!(self.name.as_str()))
            .clone();
        if let Some(message) = failure {
            return Err(CourierError::TransportPostFailure(message));
        }

        self.deliver(&value);
        Ok(())
    }

    fn subscribe(&self, handler: InboundHandler) {
        self.handlers
            .write()
            .unwrap_or_else(ignore_poison!(self.name.as_str()))
            .push(handler);
    }
}
