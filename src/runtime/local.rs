//! An in-process [`RuntimeTransport`].

use fxhash::FxHashMap;
use serde_json::Value;
use std::{
    cell::RefCell,
    sync::{Arc, Mutex, RwLock},
};

use super::{ReplyCallback, ReplyHandle, RuntimeListener, RuntimeTransport};
use crate::TabId;

/// What [`LocalRuntime::last_error`] reports while a dispatch nobody took is
/// being answered.
pub const NO_RECEIVER: &str = "Could not establish connection. Receiving end does not exist.";

thread_local! {
    /// The error of the dispatch being abandoned on this thread, if any.
    ///
    /// Abandoned callbacks run synchronously inside [`LocalRuntime::deliver`], so
    /// only they can ever observe it.
    static ABANDONING: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// An in-process [`RuntimeTransport`].
///
/// Runtime messages are offered to every runtime listener, tab messages to every
/// listener of that tab. If none of them takes the message on, the reply callback
/// is invoked with [`None`] while [`RuntimeTransport::last_error`] reports
/// [`NO_RECEIVER`].
///
/// Dispatches are recorded, and the runtime can be told to report an error for
/// every dispatch, which is what the tests in this crate rely on.
#[derive(Default)]
pub struct LocalRuntime {
    listeners: RwLock<Vec<RuntimeListener>>,
    tabs: RwLock<FxHashMap<TabId, Vec<RuntimeListener>>>,
    sent: Mutex<Vec<(Option<TabId>, Value)>>,

    /// Set by [`Self::fail_with`] until [`Self::recover`].
    failure: Mutex<Option<String>>,
}

impl LocalRuntime {
    /// Create a new runtime with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new runtime, and return the atomic reference to it.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Report `message` as the last error of every following dispatch.
    ///
    /// Messages are still delivered.
    pub fn fail_with(&self, message: &str) {
        *self
            .failure
            .lock()
            .unwrap_or_else(ignore_poison!("the runtime failure")) = Some(message.to_owned());
    }

    /// Stop reporting the error given to [`Self::fail_with`].
    pub fn recover(&self) {
        self.failure
            .lock()
            .unwrap_or_else(ignore_poison!("the runtime failure"))
            .take();
    }

    /// Every dispatch so far, with the tab it was addressed to.
    pub fn sent(&self) -> Vec<(Option<TabId>, Value)> {
        self.sent
            .lock()
            .unwrap_or_else(ignore_poison!("the runtime dispatch log"))
            .clone()
    }

    /// The number of runtime listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(ignore_poison!("the runtime listeners"))
            .len()
    }

    /// The number of listeners of tab `tab_id`.
    pub fn tab_listener_count(&self, tab_id: TabId) -> usize {
        self.tabs
            .read()
            .unwrap_or_else(ignore_poison!("the tab listeners"))
            .get(&tab_id)
            .map_or(0, Vec::len)
    }

    /// Offer `message` to every one of `listeners`, and abandon the reply if none
    /// of them took it on.
    fn deliver(&self, listeners: Vec<RuntimeListener>, message: Value, reply: ReplyCallback) {
        let handle = ReplyHandle::new(reply);

        // Not short-circuiting: every listener gets to see the message.
        let taken = listeners.iter().fold(false, |taken, listener| {
            listener(&message, handle.clone()) | taken
        });

        if !taken {
            logger::debug!("No listener took the message on: {message}");
            abandon_with(&handle, NO_RECEIVER);
        }
    }

    fn record(&self, tab_id: Option<TabId>, message: &Value) {
        self.sent
            .lock()
            .unwrap_or_else(ignore_poison!("the runtime dispatch log"))
            .push((tab_id, message.clone()));
    }
}

impl RuntimeTransport for LocalRuntime {
    fn send_message(&self, message: Value, reply: ReplyCallback) {
        self.record(None, &message);

        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(ignore_poison!("the runtime listeners"))
            .clone();

        self.deliver(listeners, message, reply);
    }

    fn send_tab_message(&self, tab_id: TabId, message: Value, reply: ReplyCallback) {
        self.record(Some(tab_id), &message);

        let listeners = self
            .tabs
            .read()
            .unwrap_or_else(ignore_poison!("the tab listeners"))
            .get(&tab_id)
            .cloned()
            .unwrap_or_default();

        self.deliver(listeners, message, reply);
    }

    fn last_error(&self) -> Option<String> {
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(ignore_poison!("the runtime failure"))
            .clone();

        failure.or_else(|| ABANDONING.with_borrow(Option::clone))
    }

    fn add_listener(&self, listener: RuntimeListener) {
        self.listeners
            .write()
            .unwrap_or_else(ignore_poison!("the runtime listeners"))
            .push(listener);
    }

    fn add_tab_listener(&self, tab_id: TabId, listener: RuntimeListener) {
        self.tabs
            .write()
            .unwrap_or_else(ignore_poison!("the tab listeners"))
            .entry(tab_id)
            .or_default()
            .push(listener);
    }
}

/// Abandon `handle`, reporting `message` as the last error to its callback only.
fn abandon_with(handle: &ReplyHandle, message: &str) {
    let previous = ABANDONING.replace(Some(message.to_owned()));
    handle.abandon();
    ABANDONING.set(previous);
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    /// What a reply callback was called with, and the last error visible then.
    type Calls = Arc<Mutex<Vec<(Option<Value>, Option<String>)>>>;

    /// A reply callback that records its [`Calls`].
    fn recorder(runtime: &Arc<LocalRuntime>) -> (ReplyCallback, Calls) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let callback: ReplyCallback = Box::new({
            let calls = Arc::clone(&calls);
            let runtime = Arc::clone(runtime);
            move |response: Option<Value>| {
                calls.lock().unwrap().push((response, runtime.last_error()))
            }
        });

        (callback, calls)
    }

    /// A listener that takes every message on and answers it with `response`.
    fn answering(response: Value) -> RuntimeListener {
        Arc::new(move |_: &Value, reply: ReplyHandle| {
            reply.respond(response.clone())
        })
    }

    #[test]
    fn no_receiver() {
        let runtime = LocalRuntime::new_arc();
        let (callback, calls) = recorder(&runtime);

        runtime.send_message(json!("hello"), callback);

        assert_eq!(
            *calls.lock().unwrap(),
            vec![(None, Some(NO_RECEIVER.to_owned()))]
        );
        assert_eq!(runtime.last_error(), None);
        assert_eq!(runtime.sent(), vec![(None, json!("hello"))]);
    }

    #[test]
    fn every_listener_sees_the_message() {
        let runtime = LocalRuntime::new_arc();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for (index, takes) in [false, true, false].into_iter().enumerate() {
            let seen = Arc::clone(&seen);
            runtime.add_listener(Arc::new(move |message: &Value, reply: ReplyHandle| {
                seen.lock().unwrap().push(index);
                if takes {
                    reply.respond(json!({ "echo": message }));
                }
                takes
            }));
        }

        let (callback, calls) = recorder(&runtime);
        runtime.send_message(json!("hello"), callback);

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![(Some(json!({ "echo": "hello" })), None)]
        );
    }

    #[test]
    fn tab_messages_stay_in_their_tab() {
        let runtime = LocalRuntime::new_arc();
        runtime.add_tab_listener(1234, answering(json!("from tab 1234")));
        assert_eq!(runtime.tab_listener_count(1234), 1);
        assert_eq!(runtime.listener_count(), 0);

        let (callback, calls) = recorder(&runtime);
        runtime.send_tab_message(1234, json!("hello"), callback);
        let (callback, other_calls) = recorder(&runtime);
        runtime.send_tab_message(4321, json!("hello"), callback);

        assert_eq!(
            *calls.lock().unwrap(),
            vec![(Some(json!("from tab 1234")), None)]
        );
        assert_eq!(
            *other_calls.lock().unwrap(),
            vec![(None, Some(NO_RECEIVER.to_owned()))]
        );
    }

    #[test]
    fn forced_failure() {
        let runtime = LocalRuntime::new_arc();
        runtime.add_listener(answering(json!("ok")));
        runtime.fail_with("should reject");

        let (callback, calls) = recorder(&runtime);
        runtime.send_message(json!("hello"), callback);

        assert_eq!(
            *calls.lock().unwrap(),
            vec![(Some(json!("ok")), Some("should reject".to_owned()))]
        );

        runtime.recover();
        assert_eq!(runtime.last_error(), None);
    }

    #[test]
    fn no_receiver_error_stays_on_its_thread() {
        let runtime = LocalRuntime::new_arc();
        let seen_elsewhere = Arc::new(Mutex::new(None));

        let callback: ReplyCallback = Box::new({
            let runtime = Arc::clone(&runtime);
            let seen_elsewhere = Arc::clone(&seen_elsewhere);
            move |_: Option<Value>| {
                let runtime = Arc::clone(&runtime);
                let elsewhere = std::thread::spawn(move || runtime.last_error())
                    .join()
                    .unwrap();
                *seen_elsewhere.lock().unwrap() = Some(elsewhere);
            }
        });
        runtime.send_message(json!("hello"), callback);

        assert_eq!(*seen_elsewhere.lock().unwrap(), Some(None));
    }
}
