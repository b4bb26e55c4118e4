//! Snapshot cache module.

mod manager;
mod snapshot;

pub use manager::{CacheManager, DEFAULT_TTL};
pub use snapshot::Snapshot;
