//! Inverted-file indexes.
//!
//! Both variants share the coarse quantizer and inverted lists in [`coarse`];
//! IVFFlat scans raw vectors in the probed lists while IVFPQ scores PQ codes
//! of the residuals through a lookup table.

pub mod coarse;
pub mod flat;
pub mod pq;
pub mod pq_index;
pub mod silhouette;

pub use coarse::{CoarseQuantizer, InvertedLists};
pub use flat::IvfFlatIndex;
pub use pq::{LookupTable, ProductQuantizer};
pub use pq_index::IvfPqIndex;
pub use silhouette::Silhouette;
