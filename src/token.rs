//! Generation of request identifiers.
//!

use std::sync::atomic::{AtomicU64, Ordering};

/// A request identifier.
///
/// Opaque to everyone but the [`crate::Courier`] that issued it; only ever compared
/// for equality.
pub type RequestId = String;

/// The generator behind [`generate_id`].
static GENERATOR: IdGenerator = IdGenerator::new();

/// A source of request identifiers.
///
/// Each identifier is a monotonic sequence number followed by a random suffix, so
/// two generators in the same process (or two processes sharing an endpoint) do not
/// collide either.
#[derive(Debug, Default)]
pub struct IdGenerator {
    sequence: AtomicU64,
}

impl IdGenerator {
    /// Create a new generator starting at sequence zero.
    pub const fn new() -> Self {
        Self {
            sequence: AtomicU64::new(0),
        }
    }

    /// Generate the next identifier.
    pub fn next_id(&self) -> RequestId {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{sequence:x}-{suffix:016x}", suffix = rand::random::<u64>())
    }
}

/// Generate a new request identifier from the process-wide generator.
pub fn generate_id() -> RequestId {
    GENERATOR.next_id()
}
