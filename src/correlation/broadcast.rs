//! Fire-and-forget sends to one or to every registered endpoint.
//!

use serde_json::Value;

use super::Courier;
use crate::{token, CourierError, Message};

/// Where a fire-and-forget payload is headed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// The endpoint registered under this name.
    Named(String),

    /// Every registered endpoint.
    All,
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

impl Courier {
    /// Walk the registry and post a fire-and-forget `payload` only to the endpoint
    /// named `destination`.
    ///
    /// Returns the number of endpoints posted to.
    pub fn broadcast_send(
        &self,
        payload: impl Into<Value>,
        destination: &str,
    ) -> Result<usize, CourierError> {
        if destination.is_empty() {
            return Err(CourierError::UnderivableDestination);
        }

        let payload = payload.into();
        let mut posted = 0;

        for (name, endpoint) in self.registry().entries() {
            if name != destination {
                continue;
            }

            let message = Message::only(token::generate_id(), &name, payload.clone());
            endpoint.post(message.to_value()?)?;
            posted += 1;
        }

        match posted {
            0 => Err(CourierError::UnregisteredDestination(destination.into())),
            posted => {
                logger::debug!("Broadcast to {posted} endpoint(s) named {destination:?}.");
                Ok(posted)
            }
        }
    }

    /// Post a fire-and-forget `payload` to every registered endpoint.
    ///
    /// Every endpoint is attempted even if an earlier one fails; the first
    /// failure is what is returned. Returns the number of endpoints posted to.
    pub fn broadcast_all(&self, payload: impl Into<Value>) -> Result<usize, CourierError> {
        let payload = payload.into();

        let (posted, first_error) = self.registry().entries().into_iter().fold(
            (0, None),
            |(posted, first_error), (name, endpoint)| {
                let result = Message::only(token::generate_id(), &name, payload.clone())
                    .to_value()
                    .map_err(CourierError::from)
                    .and_then(|value| endpoint.post(value));

                match result {
                    Ok(()) => (posted + 1, first_error),
                    Err(err) => {
                        logger::warn!("Failed to broadcast to {name:?}: {err}");
                        (posted, first_error.or(Some(err)))
                    }
                }
            },
        );

        match first_error {
            Some(err) => Err(err),
            None => {
                logger::debug!("Broadcast to all {posted} endpoint(s).");
                Ok(posted)
            }
        }
    }

    /// Send a fire-and-forget `payload` to `target`.
    ///
    /// Returns the number of endpoints posted to.
    pub fn dispatch(
        &self,
        payload: impl Into<Value>,
        target: &Target,
    ) -> Result<usize, CourierError> {
        match target {
            Target::Named(name) => self.only_send(payload, name).map(|_| 1),
            Target::All => self.broadcast_all(payload),
        }
    }
}
