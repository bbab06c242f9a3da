//! The table of requests awaiting a reply.
//!
//! Every correlated send stages an entry here before its message leaves. The
//! endpoint listeners look replies up by request identifier, remove the entry
//! and settle whoever is waiting on it. Removal and settling are one step from
//! the outside: an entry can only ever be settled once.

use fxhash::FxHashMap;
use serde_json::Value;
use std::{
    collections::hash_map::Entry,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::sync::oneshot;

use crate::{token::RequestId, CourierError, Response};

/// The outcome a waiter is settled with.
pub type Outcome = Result<Value, CourierError>;

/// The sending half that settles a waiter.
pub type Settle = oneshot::Sender<Outcome>;

/// The type alias for a [`fxhash::FxHashMap`] of pending requests.
pub type PendingMap = FxHashMap<RequestId, Settle>;

/// The pending requests of one [`crate::Courier`].
///
/// Endpoint handlers are plain synchronous callbacks, so the table sits behind a
/// [`std::sync::Mutex`]. The lock is never held while a waiter is settled.
#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: Mutex<PendingMap>,
}

impl PendingRequests {
    /// Create a new, empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new table, and return the atomic reference to it.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, PendingMap> {
        self.entries
            .lock()
            .unwrap_or_else(ignore_poison!("the pending request table"))
    }

    /// Stage a new entry, returning the receiving half its outcome will arrive on.
    ///
    /// # Errors
    ///
    /// [`CourierError::DuplicateRequest`] if `id` is still pending; the existing
    /// entry is left untouched.
    pub fn register(&self, id: RequestId) -> Result<oneshot::Receiver<Outcome>, CourierError> {
        let (settle, receiver) = oneshot::channel();
        self.insert(id, settle).map(|_| receiver)
    }

    /// Stage an entry with an existing [`Settle`] half.
    pub fn insert(&self, id: RequestId, settle: Settle) -> Result<(), CourierError> {
        match self.lock().entry(id) {
            Entry::Occupied(existing) => {
                logger::warn!(
                    "Request {id} is already pending; refusing to stage it again.",
                    id = existing.key()
                );
                Err(CourierError::DuplicateRequest(existing.key().clone()))
            }
            Entry::Vacant(vacant) => {
                logger::trace!("Staging request {id}...", id = vacant.key());
                vacant.insert(settle);
                Ok(())
            }
        }
    }

    /// Remove an entry without settling it.
    ///
    /// Dropping the returned [`Settle`] wakes the waiter with a closed channel.
    pub fn remove(&self, id: &str) -> Option<Settle> {
        logger::trace!("Removing request {id}...");
        self.lock().remove(id)
    }

    /// Remove the entry for `id` and settle it with `outcome`.
    ///
    /// Returns whether an entry was found. A waiter that has already gone away
    /// still counts as found; its outcome is discarded.
    pub fn settle(&self, id: &str, outcome: Outcome) -> bool {
        // The guard is a temporary of this statement; it is released before settling.
        let settle = self.lock().remove(id);

        match settle {
            Some(settle) => {
                if settle.send(outcome).is_err() {
                    logger::debug!("The waiter for request {id} went away; dropping its outcome.");
                }
                true
            }
            None => false,
        }
    }

    /// Settle the entry an inbound [`Response`] refers to.
    ///
    /// The waiter is resolved with the payload if `success` is set, and rejected
    /// with [`CourierError::Remote`] carrying the payload otherwise.
    pub fn resolve(&self, response: Response) -> bool {
        let Response {
            id,
            payload,
            success,
            target: _target,
        } = response;

        let outcome = if success {
            Ok(payload)
        } else {
            Err(CourierError::Remote(payload))
        };

        let found = self.settle(&id, outcome);
        if !found {
            logger::trace!("No pending request for response {id} from {_target:?}; ignoring.");
        }
        found
    }

    /// Check if a request is pending.
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Get the number of pending requests.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::generate_id;
    use serde_json::json;

    #[tokio::test]
    async fn simple() {
        let pending = PendingRequests::new_arc();

        let id = generate_id();
        let receiver = pending
            .register(id.clone())
            .expect("Failed to stage request.");
        assert!(pending.contains(&id));

        let remote_task = {
            let remote_pending = Arc::clone(&pending);
            let id = id.clone();

            // This is to simulate the remote side replying some time later.
            async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(50))
                    .await;

                assert!(remote_pending.resolve(Response::success(
                    id.clone(),
                    "background",
                    json!("Test Body")
                )));

                // The entry is gone; a second reply finds nothing.
                assert!(!remote_pending.resolve(Response::success(
                    id,
                    "background",
                    json!("Bad Body")
                )));
            }
        };
        let local_task = async move {
            tokio::time::timeout(tokio::time::Duration::from_secs(1), receiver)
                .await
                .expect("Timed out waiting for the reply.")
                .expect("The entry was dropped without being settled.")
        };

        let ((), outcome) = tokio::join!(remote_task, local_task);

        assert_eq!(outcome.unwrap(), json!("Test Body"));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn failure_rejects_with_payload() {
        let pending = PendingRequests::new();
        let id = generate_id();
        let receiver = pending.register(id.clone()).unwrap();

        pending.resolve(Response::failure(id, "background", json!("some error")));

        assert!(matches!(
            receiver.await.unwrap(),
            Err(CourierError::Remote(payload)) if payload == json!("some error")
        ));
    }

    #[test]
    fn duplicate_ids_are_refused() {
        let pending = PendingRequests::new();
        let id = generate_id();

        let _receiver = pending.register(id.clone()).unwrap();

        assert!(matches!(
            pending.register(id.clone()),
            Err(CourierError::DuplicateRequest(duplicate)) if duplicate == id
        ));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let pending = PendingRequests::new();
        let id = generate_id();
        let mut receiver = pending.register(id.clone()).unwrap();

        assert!(!pending.resolve(Response::success(
            "abc123".to_owned(),
            "background",
            json!("other")
        )));

        assert!(pending.contains(&id));
        assert!(receiver.try_recv().is_err());
    }
}
