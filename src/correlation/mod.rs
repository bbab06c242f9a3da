//! The correlation core: request identifiers, pending entries and the listeners
//! that settle them.

mod model;
pub use model::*;

mod reply;
pub use reply::*;

mod broadcast;
pub use broadcast::*;
