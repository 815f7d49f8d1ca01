//! Distance metrics for vector similarity

use std::fmt;
use std::str::FromStr;

use crate::error::AnnError;
use serde::{Deserialize, Serialize};

/// Distance metric used by an index.
///
/// The metric is handed to `build_index` and captured by value inside the
/// built index, so build-time structures and query-time distances always
/// agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Manhattan (L1) distance
    L1,
    /// Euclidean (L2) distance
    #[default]
    L2,
}

impl Metric {
    /// Compute the distance between two equal-length slices using this metric
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Metric::L1 => manhattan_distance(a, b),
            Metric::L2 => euclidean_distance(a, b),
        }
    }
}

impl FromStr for Metric {
    type Err = AnnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l1" | "manhattan" => Ok(Metric::L1),
            "l2" | "euclidean" => Ok(Metric::L2),
            other => Err(AnnError::config(format!("unknown metric '{}'", other))),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::L1 => write!(f, "l1"),
            Metric::L2 => write!(f, "l2"),
        }
    }
}

/// Compute Manhattan (L1) distance between two vectors
pub fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// Compute Euclidean (L2) distance between two vectors
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    squared_l2(a, b).sqrt()
}

/// Squared Euclidean distance; used by PQ codebooks and ADC lookup tables.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
