//! Brute-force flat index: exact O(n) k-NN search, also the evaluation oracle

use std::time::Instant;

use tracing::{debug, info};

use crate::config::AlgorithmConfig;
use crate::distance::Metric;
use crate::error::Result;
use crate::index::{QueryParams, SearchAlgorithm, SearchResult};
use crate::neighbor_queue::{MaxHeap, Neighbor};
use crate::vector::{uniform_dimension, Vector};

/// A flat index that computes the distance to every stored point.
#[derive(Debug, Default)]
pub struct BruteForce {
    vectors: Vec<Vector>,
    dimension: Option<usize>,
    metric: Option<Metric>,
}

impl BruteForce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact `k` nearest neighbors as `(id, distance)`, ascending.
    pub fn k_nearest(&self, query: &Vector, k: usize) -> Vec<(usize, f32)> {
        let Some(metric) = self.metric else {
            return Vec::new();
        };
        if Some(query.dimension()) != self.dimension {
            return Vec::new();
        }
        let mut best = MaxHeap::with_capacity(k);
        for (id, v) in self.vectors.iter().enumerate() {
            best.push_bounded(
                Neighbor::new(id, metric.distance(query.as_slice(), v.as_slice())),
                k,
            );
        }
        best.into_sorted_vec()
            .into_iter()
            .map(|n| (n.id, n.distance))
            .collect()
    }
}

impl SearchAlgorithm for BruteForce {
    fn name(&self) -> &'static str {
        "BruteForce"
    }

    fn configure(&mut self, _config: &AlgorithmConfig) {
        *self = Self::default();
    }

    fn build_index(&mut self, dataset: &[Vector], metric: Metric) -> Result<()> {
        *self = Self::default();
        let dimension = uniform_dimension(dataset)?;
        self.vectors = dataset.to_vec();
        self.dimension = dimension;
        self.metric = Some(metric);
        info!(
            points = self.vectors.len(),
            dim = dimension.unwrap_or(0),
            %metric,
            "brute force index built"
        );
        Ok(())
    }

    fn search(&self, query: &Vector, params: &QueryParams, query_id: usize) -> SearchResult {
        let started = Instant::now();
        let Some(metric) = self.metric else {
            return SearchResult::empty(query_id, started);
        };
        if self.vectors.is_empty() || Some(query.dimension()) != self.dimension {
            debug!(query_id, "brute force: empty index or dimension mismatch");
            return SearchResult::empty(query_id, started);
        }

        let mut best = MaxHeap::with_capacity(params.n);
        let mut range = Vec::new();
        for (id, v) in self.vectors.iter().enumerate() {
            let candidate = Neighbor::new(id, metric.distance(query.as_slice(), v.as_slice()));
            if params.in_range(candidate.distance) {
                range.push(candidate);
            }
            best.push_bounded(candidate, params.n);
        }

        SearchResult::from_neighbors(query_id, best.into_sorted_vec(), range, started)
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn metric(&self) -> Option<Metric> {
        self.metric
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> Vec<Vector> {
        vec![
            Vector::new(vec![0.0, 0.0]),
            Vector::new(vec![0.0, 1.0]),
            Vector::new(vec![5.0, 5.0]),
            Vector::new(vec![5.0, 6.0]),
        ]
    }

    #[test]
    fn test_nearest_pair() {
        let mut index = BruteForce::new();
        index.build_index(&square(), Metric::L2).unwrap();

        let res = index.search(&Vector::new(vec![0.0, 0.5]), &QueryParams::top_n(2), 0);
        assert_eq!(res.neighbor_ids, vec![0, 1]);
        assert_relative_eq!(res.distances[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(res.distances[1], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_result_length_is_min_of_n_and_size() {
        let mut index = BruteForce::new();
        index.build_index(&square(), Metric::L1).unwrap();
        let query = Vector::new(vec![1.0, 1.0]);

        for n in 0..7 {
            let res = index.search(&query, &QueryParams::top_n(n), 0);
            assert_eq!(res.neighbor_ids.len(), n.min(4));
            assert_eq!(res.distances.len(), n.min(4));
            assert!(res.distances.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_range_query() {
        let mut index = BruteForce::new();
        index.build_index(&square(), Metric::L2).unwrap();

        let params = QueryParams::top_n(1).with_range(1.5);
        let res = index.search(&Vector::new(vec![5.0, 5.5]), &params, 3);
        let mut ids = res.range_neighbor_ids.clone();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 3]);
        assert!(res.range_distances.iter().all(|&d| d <= 1.5));
        assert_eq!(res.neighbor_ids.len(), 1);
    }

    #[test]
    fn test_equal_distances_prefer_lower_index() {
        let data = vec![
            Vector::new(vec![1.0]),
            Vector::new(vec![-1.0]),
            Vector::new(vec![1.0]),
            Vector::new(vec![-1.0]),
        ];
        let mut index = BruteForce::new();
        index.build_index(&data, Metric::L2).unwrap();

        let res = index.search(&Vector::new(vec![0.0]), &QueryParams::top_n(3), 0);
        assert_eq!(res.neighbor_ids, vec![0, 1, 2]);
        assert_eq!(index.k_nearest(&Vector::new(vec![0.0]), 2), vec![(0, 1.0), (1, 1.0)]);
    }

    #[test]
    fn test_degenerate_queries() {
        let mut index = BruteForce::new();
        index.build_index(&[], Metric::L2).unwrap();
        assert!(index
            .search(&Vector::new(vec![1.0]), &QueryParams::top_n(1), 0)
            .is_empty());

        index.build_index(&square(), Metric::L2).unwrap();
        let res = index.search(&Vector::new(vec![1.0, 2.0, 3.0]), &QueryParams::top_n(2), 1);
        assert!(res.is_empty());
        assert_eq!(res.query_id, 1);
    }

    #[test]
    fn test_build_rejects_ragged_dataset() {
        let mut index = BruteForce::new();
        let ragged = vec![Vector::new(vec![1.0, 2.0]), Vector::new(vec![1.0])];
        assert!(index.build_index(&ragged, Metric::L2).is_err());
        assert!(index.metric().is_none());
        assert_eq!(index.len(), 0);
    }
}
