//! Version ids and the on-disk version store.

pub mod id;
pub mod store;

pub use id::{Clock, FixedClock, SystemClock, VersionId};
pub use store::VersionStore;
