//! # annsearch
//!
//! Approximate nearest neighbor search over a fixed, in-memory dataset.
//!
//! This library provides:
//! - Five index variants behind one [`SearchAlgorithm`] trait: brute force,
//!   LSH, hypercube projection, IVF-Flat and IVF-PQ
//! - L1 and L2 metrics, frozen into each index at build time
//! - A parallel query runner with deterministic result order
//! - Evaluation against exact ground truth (recall@N, approximation factor, QPS)
//!
//! ## Example
//!
//! ```rust
//! use annsearch::{create_algorithm, AlgorithmConfig, AlgorithmKind, Metric, QueryParams, Vector};
//!
//! let dataset = vec![
//!     Vector::new(vec![0.0, 0.0]),
//!     Vector::new(vec![0.0, 1.0]),
//!     Vector::new(vec![5.0, 5.0]),
//! ];
//! let mut index = create_algorithm(AlgorithmKind::BruteForce, &AlgorithmConfig::default());
//! index.build_index(&dataset, Metric::L2).unwrap();
//!
//! let result = index.search(&Vector::new(vec![0.0, 0.4]), &QueryParams::top_n(2), 0);
//! assert_eq!(result.neighbor_ids, vec![0, 1]);
//! ```

pub mod brute_force;
pub mod config;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod evaluation;
pub mod hypercube;
pub mod index;
pub mod ivf;
pub mod lsh;
pub mod neighbor_queue;
pub mod persistence;
pub mod projection;
pub mod runner;
pub mod vector;

pub use brute_force::BruteForce;
pub use config::AlgorithmConfig;
pub use distance::Metric;
pub use error::{AnnError, Result};
pub use evaluation::{evaluate, EvaluationReport};
pub use hypercube::HypercubeIndex;
pub use index::{create_algorithm, AlgorithmKind, QueryParams, SearchAlgorithm, SearchResult};
pub use ivf::{IvfFlatIndex, IvfPqIndex};
pub use lsh::LshIndex;
pub use runner::run_parallel_search;
pub use vector::Vector;
