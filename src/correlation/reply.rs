//! The future returned by [`crate::Courier::send`].

use std::{
    future::Future,
    pin::Pin,
    sync::Weak,
    task::{Context, Poll},
};
use tokio::sync::oneshot;

use crate::{token::RequestId, CourierError, Outcome, PendingRequests};

enum ReplyState {
    /// Dispatch failed; the error is handed out on the first poll.
    Failed(CourierError),

    /// The message is out and the pending entry is staged.
    Waiting {
        receiver: oneshot::Receiver<Outcome>,
        pending: Weak<PendingRequests>,
    },

    Done,
}

/// A reply that has yet to arrive.
///
/// The message has already been posted by the time a [`Reply`] exists; awaiting
/// it only waits for the matching response. It never times out on its own: see
/// [`crate::Courier::send_timeout`] for that.
///
/// Dropping an unsettled [`Reply`] removes its pending entry, so a late response
/// for it is ignored.
#[must_use = "the reply is lost, and the pending entry removed, if it is dropped"]
pub struct Reply {
    id: Option<RequestId>,
    state: ReplyState,
}

impl Reply {
    /// A reply that is already rejected.
    pub(crate) fn failed(id: Option<RequestId>, err: CourierError) -> Self {
        Self {
            id,
            state: ReplyState::Failed(err),
        }
    }

    /// A reply waiting on a pending entry.
    pub(crate) fn waiting(
        id: RequestId,
        receiver: oneshot::Receiver<Outcome>,
        pending: Weak<PendingRequests>,
    ) -> Self {
        Self {
            id: Some(id),
            state: ReplyState::Waiting { receiver, pending },
        }
    }

    /// The identifier of the request, if one was issued before dispatch failed.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Check if the request is still waiting for its response.
    pub fn is_waiting(&self) -> bool {
        matches!(self.state, ReplyState::Waiting { .. })
    }
}

impl Future for Reply {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match std::mem::replace(&mut this.state, ReplyState::Done) {
            ReplyState::Failed(err) => Poll::Ready(Err(err)),
            ReplyState::Waiting {
                mut receiver,
                pending,
            } => match Pin::new(&mut receiver).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(_)) => Poll::Ready(Err(CourierError::Dropped(
                    this.id.clone().unwrap_or_default(),
                ))),
                Poll::Pending => {
                    this.state = ReplyState::Waiting { receiver, pending };
                    Poll::Pending
                }
            },
            ReplyState::Done => panic!("`Reply` polled after completion"),
        }
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        if let (ReplyState::Waiting { pending, .. }, Some(id)) = (&self.state, &self.id) {
            if let Some(pending) = pending.upgrade() {
                if pending.remove(id).is_some() {
                    logger::debug!("Reply for request {id} abandoned; removed its pending entry.");
                }
            }
        }
    }
}
