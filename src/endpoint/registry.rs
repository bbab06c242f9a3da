//! The registry of [`Endpoint`]s, keyed by destination name.
//!
//! The registry is passed into every [`crate::Courier`] explicitly, so several
//! couriers (and several registries) can live side by side in one process.

use fxhash::FxHashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::Endpoint;
use crate::CourierError;

/// A map of destination names to their [`Endpoint`]s.
pub type EndpointMap = FxHashMap<String, Arc<dyn Endpoint>>;

/// The registry of live endpoints.
///
/// Lookups happen synchronously while a send is being dispatched, hence the
/// [`std::sync::RwLock`]: no lock is ever held across an `await` or a post.
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: RwLock<EndpointMap>,
}

impl EndpointRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new registry, and return the atomic reference to it.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Create a registry with the provided endpoints, each under its own name.
    pub fn from_endpoints(endpoints: impl IntoIterator<Item = Arc<dyn Endpoint>>) -> Self {
        Self {
            endpoints: RwLock::new(
                endpoints
                    .into_iter()
                    .map(|endpoint| (endpoint.name().to_owned(), endpoint))
                    .collect(),
            ),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, EndpointMap> {
        self.endpoints
            .read()
            .unwrap_or_else(ignore_poison!("the endpoint registry"))
    }

    fn write(&self) -> RwLockWriteGuard<'_, EndpointMap> {
        self.endpoints
            .write()
            .unwrap_or_else(ignore_poison!("the endpoint registry"))
    }

    /// Get the endpoint registered under `name`.
    ///
    /// # Errors
    ///
    /// [`CourierError::UnregisteredDestination`] if there is none. Callers pass
    /// this error on unchanged.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Endpoint>, CourierError> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| CourierError::UnregisteredDestination(name.to_owned()))
    }

    /// Check if an endpoint is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Register `endpoint` under `name`, returning the endpoint it replaced.
    pub fn set(&self, name: &str, endpoint: Arc<dyn Endpoint>) -> Option<Arc<dyn Endpoint>> {
        let replaced = self.write().insert(name.to_owned(), endpoint);
        if replaced.is_some() {
            logger::debug!("Replaced the endpoint registered as {name:?}.");
        }
        replaced
    }

    /// Register `endpoint` under its own name.
    pub fn register(&self, endpoint: Arc<dyn Endpoint>) -> Option<Arc<dyn Endpoint>> {
        let name = endpoint.name().to_owned();
        self.set(&name, endpoint)
    }

    /// Remove the endpoint registered under `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn Endpoint>> {
        self.write().remove(name)
    }

    /// Remove every endpoint.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// A snapshot of every registered endpoint, ordered by name.
    pub fn entries(&self) -> Vec<(String, Arc<dyn Endpoint>)> {
        let mut entries = self
            .read()
            .iter()
            .map(|(name, endpoint)| (name.clone(), Arc::clone(endpoint)))
            .collect::<Vec<_>>();
        entries.sort_by(|(left, _), (right, _)| left.cmp(right));
        entries
    }

    /// Get the number of registered endpoints.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Return if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
