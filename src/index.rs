//! Search algorithm contract shared by every index variant

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::brute_force::BruteForce;
use crate::config::AlgorithmConfig;
use crate::distance::Metric;
use crate::error::{AnnError, Result};
use crate::hypercube::HypercubeIndex;
use crate::ivf::{IvfFlatIndex, IvfPqIndex, Silhouette};
use crate::lsh::LshIndex;
use crate::neighbor_queue::Neighbor;
use crate::vector::Vector;

/// Query-time parameters. Never mutate index state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Number of nearest neighbors requested.
    pub n: usize,
    /// Radius for range queries.
    pub radius: f32,
    /// Whether range neighbors are collected.
    pub enable_range: bool,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            n: 1,
            radius: 0.0,
            enable_range: false,
        }
    }
}

impl QueryParams {
    pub fn top_n(n: usize) -> Self {
        Self {
            n,
            ..Self::default()
        }
    }

    pub fn with_range(mut self, radius: f32) -> Self {
        self.radius = radius;
        self.enable_range = true;
        self
    }

    #[inline]
    pub(crate) fn in_range(&self, distance: f32) -> bool {
        self.enable_range && distance <= self.radius
    }
}

/// Outcome of one query.
///
/// `neighbor_ids` and `distances` are parallel and sorted ascending by
/// distance; range lists are parallel too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query_id: usize,
    pub neighbor_ids: Vec<usize>,
    pub distances: Vec<f32>,
    pub range_neighbor_ids: Vec<usize>,
    pub range_distances: Vec<f32>,
    pub elapsed: Duration,
}

impl SearchResult {
    /// An empty result for a query that could not be answered.
    pub fn empty(query_id: usize, started: Instant) -> Self {
        Self {
            query_id,
            elapsed: started.elapsed(),
            ..Self::default()
        }
    }

    pub(crate) fn from_neighbors(
        query_id: usize,
        nearest: Vec<Neighbor>,
        range: Vec<Neighbor>,
        started: Instant,
    ) -> Self {
        let (neighbor_ids, distances) = nearest.into_iter().map(|n| (n.id, n.distance)).unzip();
        let (range_neighbor_ids, range_distances) =
            range.into_iter().map(|n| (n.id, n.distance)).unzip();
        Self {
            query_id,
            neighbor_ids,
            distances,
            range_neighbor_ids,
            range_distances,
            elapsed: started.elapsed(),
        }
    }

    /// Distance to the nearest reported neighbor.
    pub fn nearest_distance(&self) -> Option<f32> {
        self.distances.first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbor_ids.is_empty()
    }
}

/// A nearest-neighbor index: configure, build once, then search concurrently.
///
/// `search` takes `&self` and must not fail: degenerate queries (empty or
/// unbuilt index, dimension mismatch) return an empty `SearchResult`.
pub trait SearchAlgorithm: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Copy the tunables this variant needs. Drops any built index.
    fn configure(&mut self, config: &AlgorithmConfig);

    /// Build the index over `dataset`, freezing `metric` into it.
    ///
    /// Replaces any previous index. On error no index is left queryable.
    fn build_index(&mut self, dataset: &[Vector], metric: Metric) -> Result<()>;

    /// Answer one query.
    fn search(&self, query: &Vector, params: &QueryParams, query_id: usize) -> SearchResult;

    /// Number of indexed points (0 before build).
    fn len(&self) -> usize;

    /// Dimension of indexed points, if built over a non-empty dataset.
    fn dimension(&self) -> Option<usize>;

    /// The metric frozen at build time.
    fn metric(&self) -> Option<Metric>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Centroid-based silhouette of the coarse clustering, for IVF variants.
    fn silhouette_fast(&self) -> Option<Silhouette> {
        None
    }

    /// Pairwise silhouette of the coarse clustering, for IVF variants.
    fn silhouette(&self) -> Option<Silhouette> {
        None
    }
}

/// The closed set of index variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmKind {
    #[serde(rename = "brute")]
    BruteForce,
    Lsh,
    Hypercube,
    IvfFlat,
    IvfPq,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 5] = [
        AlgorithmKind::BruteForce,
        AlgorithmKind::Lsh,
        AlgorithmKind::Hypercube,
        AlgorithmKind::IvfFlat,
        AlgorithmKind::IvfPq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmKind::BruteForce => "brute",
            AlgorithmKind::Lsh => "lsh",
            AlgorithmKind::Hypercube => "hypercube",
            AlgorithmKind::IvfFlat => "ivfflat",
            AlgorithmKind::IvfPq => "ivfpq",
        }
    }
}

impl FromStr for AlgorithmKind {
    type Err = AnnError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        AlgorithmKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lower)
            .ok_or_else(|| AnnError::config(format!("unknown algorithm '{}'", s)))
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create a configured, unbuilt index of the given kind.
pub fn create_algorithm(kind: AlgorithmKind, config: &AlgorithmConfig) -> Box<dyn SearchAlgorithm> {
    let mut algo: Box<dyn SearchAlgorithm> = match kind {
        AlgorithmKind::BruteForce => Box::new(BruteForce::new()),
        AlgorithmKind::Lsh => Box::new(LshIndex::new()),
        AlgorithmKind::Hypercube => Box::new(HypercubeIndex::new()),
        AlgorithmKind::IvfFlat => Box::new(IvfFlatIndex::new()),
        AlgorithmKind::IvfPq => Box::new(IvfPqIndex::new()),
    };
    algo.configure(config);
    algo
}

/// Exact scan over `dataset`; the fallback used when an approximate index finds no candidates.
pub(crate) fn exact_candidates(dataset: &[Vector], query: &[f32], metric: Metric) -> Vec<Neighbor> {
    dataset
        .iter()
        .enumerate()
        .map(|(id, v)| Neighbor::new(id, metric.distance(query, v.as_slice())))
        .collect()
}

/// Rank candidates (ids unique) and split them into top-N and range hits.
pub(crate) fn rank_candidates(
    candidates: Vec<Neighbor>,
    params: &QueryParams,
    query_id: usize,
    started: Instant,
) -> SearchResult {
    let mut candidates = candidates;
    candidates.sort_unstable();
    let range: Vec<Neighbor> = if params.enable_range {
        candidates
            .iter()
            .copied()
            .take_while(|c| params.in_range(c.distance))
            .collect()
    } else {
        Vec::new()
    };
    candidates.truncate(params.n);
    SearchResult::from_neighbors(query_id, candidates, range, started)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in AlgorithmKind::ALL {
            assert_eq!(kind.as_str().parse::<AlgorithmKind>().unwrap(), kind);
        }
        assert_eq!("IVFPQ".parse::<AlgorithmKind>().unwrap(), AlgorithmKind::IvfPq);
        assert!("dummy".parse::<AlgorithmKind>().is_err());
    }

    #[test]
    fn test_factory_names() {
        let config = AlgorithmConfig::default();
        let names: Vec<&str> = AlgorithmKind::ALL
            .iter()
            .map(|&kind| create_algorithm(kind, &config).name())
            .collect();
        assert_eq!(names, vec!["BruteForce", "LSH", "Hypercube", "IVFFlat", "IVFPQ"]);
    }

    #[test]
    fn test_rank_candidates_splits_range() {
        let candidates = vec![
            Neighbor::new(4, 3.0),
            Neighbor::new(1, 0.5),
            Neighbor::new(2, 1.5),
            Neighbor::new(3, 0.9),
        ];
        let params = QueryParams::top_n(2).with_range(1.0);
        let res = rank_candidates(candidates, &params, 9, Instant::now());

        assert_eq!(res.query_id, 9);
        assert_eq!(res.neighbor_ids, vec![1, 3]);
        assert_eq!(res.distances, vec![0.5, 0.9]);
        assert_eq!(res.range_neighbor_ids, vec![1, 3]);
    }

    #[test]
    fn test_unbuilt_indexes_return_empty() {
        let config = AlgorithmConfig::default();
        let query = Vector::new(vec![1.0, 2.0]);
        for kind in AlgorithmKind::ALL {
            let algo = create_algorithm(kind, &config);
            let res = algo.search(&query, &QueryParams::top_n(3), 5);
            assert!(res.is_empty(), "{} returned neighbors before build", kind);
            assert_eq!(res.query_id, 5);
            assert!(algo.metric().is_none());
        }
    }
}
