//! Courier library.
//!
//! Request/response correlation on top of named, fire-and-forget endpoints.
//! A [`Courier`] sends a payload to a destination found in an [`EndpointRegistry`]
//! and hands back a [`Reply`] that settles once a [`Response`] with the same
//! request identifier comes back through that endpoint.
//!
//! The [`runtime`] module contains the scoped variant, where the transport itself
//! pairs every dispatch with exactly one reply callback.

/// Recover the guard of a poisoned lock, logging a warning naming what was locked.
macro_rules! ignore_poison {
    ($what:expr) => {
        |poison| {
            logger::warn!(
                "Poisoned lock ignored for {what}; its contents may be inconsistent.",
                what = $what
            );
            poison.into_inner()
        }
    };
}

mod config;
pub use config::*;

mod errors;
pub use errors::CourierError;

pub mod token;
pub use token::{generate_id, RequestId};

pub mod envelope;
pub use envelope::*;

pub mod endpoint;
pub use endpoint::*;

mod pending;
pub use pending::*;

mod correlation;
pub use correlation::*;

pub mod runtime;


/// Re-export the [`logger`] module.
pub use logger;
