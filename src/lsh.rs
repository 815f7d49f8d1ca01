//! LSH index: `L` hash tables of amplified (k-wise AND) random-projection hashes.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::config::{AlgorithmConfig, LshParams};
use crate::distance::Metric;
use crate::error::Result;
use crate::index::{exact_candidates, rank_candidates, QueryParams, SearchAlgorithm, SearchResult};
use crate::neighbor_queue::Neighbor;
use crate::projection::RandomProjections;
use crate::vector::{uniform_dimension, Vector};

/// Combine per-function hash values into one bucket key.
///
/// Order-sensitive: permuting `cells` changes the key.
pub fn combine_hashes(cells: &[i64]) -> u64 {
    cells
        .iter()
        .fold(0u64, |key, &h| key.wrapping_mul(31).wrapping_add(h as u64))
}

#[derive(Debug)]
struct HashTable {
    functions: RandomProjections,
    buckets: HashMap<u64, Vec<usize>>,
}

impl HashTable {
    fn key(&self, x: &[f32]) -> u64 {
        combine_hashes(&self.functions.cells(x))
    }
}

#[derive(Debug)]
struct LshState {
    vectors: Vec<Vector>,
    dimension: Option<usize>,
    metric: Metric,
    tables: Vec<HashTable>,
}

/// Locality-sensitive hashing index.
#[derive(Debug)]
pub struct LshIndex {
    params: LshParams,
    seed: u64,
    state: Option<LshState>,
}

impl Default for LshIndex {
    fn default() -> Self {
        let config = AlgorithmConfig::default();
        Self {
            params: config.lsh(),
            seed: config.seed,
            state: None,
        }
    }
}

impl LshIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: LshParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            state: None,
        }
    }

    pub fn params(&self) -> LshParams {
        self.params
    }

    /// Bucket map of table `table`, if built.
    pub fn buckets(&self, table: usize) -> Option<&HashMap<u64, Vec<usize>>> {
        self.state
            .as_ref()
            .and_then(|s| s.tables.get(table))
            .map(|t| &t.buckets)
    }

    /// Deduplicated union of the query's buckets across all tables, ascending by id.
    pub fn candidates(&self, query: &Vector) -> Vec<usize> {
        let Some(state) = &self.state else {
            return Vec::new();
        };
        if Some(query.dimension()) != state.dimension {
            return Vec::new();
        }
        let mut ids: Vec<usize> = state
            .bucket_union(query.as_slice())
            .into_iter()
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl LshState {
    fn bucket_union(&self, query: &[f32]) -> HashSet<usize> {
        let mut seen = HashSet::new();
        for table in &self.tables {
            if let Some(bucket) = table.buckets.get(&table.key(query)) {
                seen.extend(bucket.iter().copied());
            }
        }
        seen
    }
}

impl SearchAlgorithm for LshIndex {
    fn name(&self) -> &'static str {
        "LSH"
    }

    fn configure(&mut self, config: &AlgorithmConfig) {
        self.params = config.lsh();
        self.seed = config.seed;
        self.state = None;
    }

    fn build_index(&mut self, dataset: &[Vector], metric: Metric) -> Result<()> {
        self.state = None;
        self.params.validate()?;
        let dimension = uniform_dimension(dataset)?;
        let dim = dimension.unwrap_or(0);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut tables = Vec::with_capacity(self.params.l);
        for _ in 0..self.params.l {
            let functions = RandomProjections::sample(self.params.k, dim, self.params.w, &mut rng);
            let mut table = HashTable {
                functions,
                buckets: HashMap::new(),
            };
            for (id, v) in dataset.iter().enumerate() {
                let key = table.key(v.as_slice());
                table.buckets.entry(key).or_default().push(id);
            }
            tables.push(table);
        }

        info!(
            tables = tables.len(),
            k = self.params.k,
            w = self.params.w,
            points = dataset.len(),
            dim,
            "LSH index built"
        );
        self.state = Some(LshState {
            vectors: dataset.to_vec(),
            dimension,
            metric,
            tables,
        });
        Ok(())
    }

    fn search(&self, query: &Vector, params: &QueryParams, query_id: usize) -> SearchResult {
        let started = Instant::now();
        let Some(state) = &self.state else {
            return SearchResult::empty(query_id, started);
        };
        if state.vectors.is_empty() || Some(query.dimension()) != state.dimension {
            debug!(query_id, "LSH: empty index or dimension mismatch");
            return SearchResult::empty(query_id, started);
        }

        let q = query.as_slice();
        let union = state.bucket_union(q);
        let candidates: Vec<Neighbor> = if union.is_empty() {
            debug!(query_id, "LSH: no bucket hits, scanning the full dataset");
            exact_candidates(&state.vectors, q, state.metric)
        } else {
            union
                .into_iter()
                .map(|id| Neighbor::new(id, state.metric.distance(q, state.vectors[id].as_slice())))
                .collect()
        };

        rank_candidates(candidates, params, query_id, started)
    }

    fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.vectors.len())
    }

    fn dimension(&self) -> Option<usize> {
        self.state.as_ref().and_then(|s| s.dimension)
    }

    fn metric(&self) -> Option<Metric> {
        self.state.as_ref().map(|s| s.metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnnError;
    use rand::Rng;

    fn random_points(n: usize, dim: usize, seed: u64) -> Vec<Vector> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| Vector::new((0..dim).map(|_| rng.gen_range(-10.0..10.0)).collect()))
            .collect()
    }

    #[test]
    fn test_combine_is_order_sensitive() {
        assert_ne!(combine_hashes(&[1, 2, 3]), combine_hashes(&[3, 2, 1]));
        assert_eq!(combine_hashes(&[1, 2, 3]), combine_hashes(&[1, 2, 3]));
        assert_ne!(combine_hashes(&[-1, 0]), combine_hashes(&[0, -1]));
    }

    #[test]
    fn test_every_point_in_one_bucket_per_table() {
        let data = random_points(200, 6, 1);
        let mut index = LshIndex::with_params(LshParams { k: 3, l: 4, w: 4.0 }, 9);
        index.build_index(&data, Metric::L2).unwrap();

        for t in 0..4 {
            let buckets = index.buckets(t).unwrap();
            let mut ids: Vec<usize> = buckets.values().flatten().copied().collect();
            ids.sort_unstable();
            assert_eq!(ids, (0..200).collect::<Vec<_>>());
        }
        assert!(index.buckets(4).is_none());
    }

    #[test]
    fn test_query_finds_itself() {
        let data = random_points(300, 8, 2);
        let mut index = LshIndex::with_params(LshParams { k: 4, l: 5, w: 4.0 }, 1);
        index.build_index(&data, Metric::L2).unwrap();

        for (i, v) in data.iter().enumerate().take(50) {
            let res = index.search(v, &QueryParams::top_n(1), i);
            assert_eq!(res.neighbor_ids, vec![i]);
            assert_eq!(res.distances, vec![0.0]);
        }
    }

    #[test]
    fn test_empty_union_falls_back_to_full_scan() {
        let data = vec![Vector::new(vec![0.0, 0.0]), Vector::new(vec![0.1, 0.0])];
        let mut index = LshIndex::with_params(LshParams { k: 8, l: 1, w: 0.01 }, 4);
        index.build_index(&data, Metric::L2).unwrap();

        let far = Vector::new(vec![1000.0, -1000.0]);
        assert!(index.candidates(&far).is_empty());
        let res = index.search(&far, &QueryParams::top_n(2), 0);
        assert_eq!(res.neighbor_ids.len(), 2);
    }

    #[test]
    fn test_same_seed_same_buckets() {
        let data = random_points(100, 5, 3);
        let params = LshParams { k: 3, l: 3, w: 2.0 };
        let mut a = LshIndex::with_params(params, 42);
        let mut b = LshIndex::with_params(params, 42);
        a.build_index(&data, Metric::L2).unwrap();
        b.build_index(&data, Metric::L2).unwrap();

        for t in 0..3 {
            assert_eq!(a.buckets(t), b.buckets(t));
        }
    }

    #[test]
    fn test_invalid_params_leave_no_index() {
        let data = random_points(10, 2, 4);
        let mut index = LshIndex::with_params(LshParams { k: 0, l: 2, w: 1.0 }, 1);
        assert!(matches!(
            index.build_index(&data, Metric::L2),
            Err(AnnError::InvalidConfig(_))
        ));
        assert!(index.metric().is_none());
    }

    #[test]
    fn test_infinite_window_is_a_config_error() {
        let data = random_points(10, 2, 5);
        let mut index = LshIndex::with_params(LshParams { k: 2, l: 2, w: f32::INFINITY }, 1);
        assert!(matches!(
            index.build_index(&data, Metric::L2),
            Err(AnnError::InvalidConfig(_))
        ));
        assert!(index.metric().is_none());
    }

    #[test]
    fn test_range_hits_are_the_bucket_union_within_radius() {
        let data = vec![
            Vector::new(vec![0.0, 0.0]),
            Vector::new(vec![0.5, 0.0]),
            Vector::new(vec![0.0, 2.0]),
            Vector::new(vec![3.0, 0.0]),
            Vector::new(vec![0.2, 0.2]),
        ];
        // A window far wider than the data puts every point in one bucket per table.
        let mut index = LshIndex::with_params(LshParams { k: 2, l: 2, w: 1.0e6 }, 8);
        index.build_index(&data, Metric::L1).unwrap();

        let query = Vector::new(vec![0.1, 0.0]);
        assert_eq!(index.candidates(&query), vec![0, 1, 2, 3, 4]);

        let res = index.search(&query, &QueryParams::top_n(1).with_range(0.5), 0);
        assert_eq!(res.neighbor_ids, vec![0]);
        assert_eq!(res.range_neighbor_ids, vec![0, 4, 1]);
        assert!(res.range_distances.windows(2).all(|w| w[0] <= w[1]));
        for (&id, &d) in res.range_neighbor_ids.iter().zip(&res.range_distances) {
            assert!((d - Metric::L1.distance(query.as_slice(), data[id].as_slice())).abs() < 1e-6);
        }
    }
}
