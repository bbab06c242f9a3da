//! The transport contract of the runtime-scoped variant.
//!

use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::TabId;

/// The single-shot callback a dispatch is paired with.
///
/// Invoked with the raw reply, or with [`None`] if no reply is coming.
pub type ReplyCallback = Box<dyn FnOnce(Option<Value>) + Send>;

/// A handler of dispatched messages.
///
/// Returns whether it took the message on; a listener that did is then expected
/// to answer through the [`ReplyHandle`], now or later. A listener that declines
/// leaves the reply to the others.
pub type RuntimeListener = Arc<dyn Fn(&Value, ReplyHandle) -> bool + Send + Sync>;

/// A transport that delivers messages to a whole runtime or to one of its tabs.
///
/// Unlike [`crate::Endpoint`], every dispatch carries its own [`ReplyCallback`],
/// and failures are not returned but reported through [`Self::last_error`]
/// while that callback runs.
pub trait RuntimeTransport: Send + Sync {
    /// Dispatch `message` to every runtime listener.
    fn send_message(&self, message: Value, reply: ReplyCallback);

    /// Dispatch `message` to the listeners of the tab `tab_id`.
    fn send_tab_message(&self, tab_id: TabId, message: Value, reply: ReplyCallback);

    /// The failure of the dispatch whose reply callback is currently running.
    fn last_error(&self) -> Option<String>;

    /// Add a listener for runtime messages.
    fn add_listener(&self, listener: RuntimeListener);

    /// Add a listener for the messages of tab `tab_id`.
    fn add_tab_listener(&self, tab_id: TabId, listener: RuntimeListener);
}

/// Holds the [`ReplyCallback`] until somebody uses it.
struct ReplySlot {
    callback: Mutex<Option<ReplyCallback>>,
}

impl ReplySlot {
    fn take(&self) -> Option<ReplyCallback> {
        self.callback
            .lock()
            .unwrap_or_else(ignore_poison!("a reply callback"))
            .take()
    }
}

impl Drop for ReplySlot {
    /// Nobody answered and nobody can anymore.
    fn drop(&mut self) {
        let callback = self
            .callback
            .get_mut()
            .unwrap_or_else(ignore_poison!("a reply callback"))
            .take();

        if let Some(callback) = callback {
            logger::trace!("Reply handle dropped unanswered.");
            callback(None);
        }
    }
}

/// A cloneable, single-shot responder to one dispatch.
///
/// The first of [`Self::respond`] and [`Self::abandon`] on any clone invokes the
/// callback; every later call is ignored and returns `false`. If the last clone
/// is dropped before either happened, the callback is invoked with [`None`].
#[derive(Clone)]
pub struct ReplyHandle {
    slot: Arc<ReplySlot>,
}

impl ReplyHandle {
    /// Wrap `callback` in a new handle.
    pub fn new(callback: ReplyCallback) -> Self {
        Self {
            slot: Arc::new(ReplySlot {
                callback: Mutex::new(Some(callback)),
            }),
        }
    }

    /// Answer with `response`. Returns whether this was the first answer.
    pub fn respond(&self, response: Value) -> bool {
        self.slot
            .take()
            .map(|callback| callback(Some(response)))
            .is_some()
    }

    /// Report that no answer is coming. Returns whether this was the first answer.
    pub fn abandon(&self) -> bool {
        self.slot
            .take()
            .map(|callback| callback(None))
            .is_some()
    }

    /// Check if the callback has been invoked already.
    pub fn is_settled(&self) -> bool {
        self.slot
            .callback
            .lock()
            .unwrap_or_else(ignore_poison!("a reply callback"))
            .is_none()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn recording_handle() -> (ReplyHandle, Arc<Mutex<Vec<Option<Value>>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let handle = ReplyHandle::new(Box::new({
            let calls = Arc::clone(&calls);
            move |response: Option<Value>| calls.lock().unwrap().push(response)
        }));

        (handle, calls)
    }

    #[test]
    fn first_response_wins() {
        let (handle, calls) = recording_handle();
        let other = handle.clone();

        assert!(!handle.is_settled());
        assert!(other.respond(json!("first")));
        assert!(!handle.respond(json!("second")));
        assert!(!handle.abandon());
        assert!(handle.is_settled());

        assert_eq!(*calls.lock().unwrap(), vec![Some(json!("first"))]);
    }

    #[test]
    fn abandon() {
        let (handle, calls) = recording_handle();

        assert!(handle.abandon());
        assert!(!handle.respond(json!("late")));

        assert_eq!(*calls.lock().unwrap(), vec![None]);
    }

    #[test]
    fn dropped_unanswered() {
        let (handle, calls) = recording_handle();
        let other = handle.clone();

        drop(handle);
        assert!(calls.lock().unwrap().is_empty());

        drop(other);
        assert_eq!(*calls.lock().unwrap(), vec![None]);
    }
}
