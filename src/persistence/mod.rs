//! Persistence layer: serialization helpers and the ground-truth cache.

pub mod serialization;
pub mod truth_cache;

pub use truth_cache::{CacheKey, GroundTruthCache};
