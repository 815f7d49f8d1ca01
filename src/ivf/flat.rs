//! IVFFlat: coarse clustering plus exact distances inside the probed lists.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use super::coarse::{CoarseQuantizer, InvertedLists};
use super::silhouette::{self, Silhouette};
use crate::config::{AlgorithmConfig, IvfParams};
use crate::distance::Metric;
use crate::error::Result;
use crate::index::{rank_candidates, QueryParams, SearchAlgorithm, SearchResult};
use crate::neighbor_queue::Neighbor;
use crate::vector::{uniform_dimension, Vector};

#[derive(Debug)]
struct FlatState {
    vectors: Vec<Vector>,
    dimension: Option<usize>,
    quantizer: CoarseQuantizer,
    lists: InvertedLists,
}

/// Inverted-file index storing raw vectors.
#[derive(Debug)]
pub struct IvfFlatIndex {
    params: IvfParams,
    seed: u64,
    state: Option<FlatState>,
}

impl Default for IvfFlatIndex {
    fn default() -> Self {
        let config = AlgorithmConfig::default();
        Self {
            params: config.ivf(),
            seed: config.seed,
            state: None,
        }
    }
}

impl IvfFlatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: IvfParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            state: None,
        }
    }

    pub fn params(&self) -> IvfParams {
        self.params
    }

    /// Change `nprobe` without rebuilding; it is only read at query time.
    pub fn set_nprobe(&mut self, nprobe: usize) {
        self.params.nprobe = nprobe;
    }

    pub fn centroids(&self) -> Option<&[Vec<f32>]> {
        self.state.as_ref().map(|s| s.quantizer.centroids())
    }

    pub fn inverted_lists(&self) -> Option<&[Vec<usize>]> {
        self.state.as_ref().map(|s| s.lists.lists())
    }
}

impl SearchAlgorithm for IvfFlatIndex {
    fn name(&self) -> &'static str {
        "IVFFlat"
    }

    fn configure(&mut self, config: &AlgorithmConfig) {
        self.params = config.ivf();
        self.seed = config.seed;
        self.state = None;
    }

    fn build_index(&mut self, dataset: &[Vector], metric: Metric) -> Result<()> {
        self.state = None;
        self.params.validate()?;
        let dimension = uniform_dimension(dataset)?;

        let quantizer = if dataset.is_empty() {
            CoarseQuantizer::from_centroids(Vec::new(), metric)
        } else {
            let mut rng = StdRng::seed_from_u64(self.seed);
            CoarseQuantizer::train(dataset, &self.params, metric, &mut rng)
        };
        let lists = InvertedLists::build(&quantizer, dataset);

        info!(
            points = dataset.len(),
            clusters = quantizer.len(),
            nprobe = self.params.nprobe,
            %metric,
            "IVFFlat index built"
        );
        self.state = Some(FlatState {
            vectors: dataset.to_vec(),
            dimension,
            quantizer,
            lists,
        });
        Ok(())
    }

    fn search(&self, query: &Vector, params: &QueryParams, query_id: usize) -> SearchResult {
        let started = Instant::now();
        let Some(state) = &self.state else {
            return SearchResult::empty(query_id, started);
        };
        if state.vectors.is_empty() || Some(query.dimension()) != state.dimension {
            debug!(query_id, "IVFFlat: empty index or dimension mismatch");
            return SearchResult::empty(query_id, started);
        }

        let q = query.as_slice();
        let metric = state.quantizer.metric();
        let candidates: Vec<Neighbor> = state
            .quantizer
            .probe(q, self.params.nprobe)
            .into_iter()
            .flat_map(|c| state.lists.list(c).iter().copied())
            .map(|id| Neighbor::new(id, metric.distance(q, state.vectors[id].as_slice())))
            .collect();

        rank_candidates(candidates, params, query_id, started)
    }

    fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.vectors.len())
    }

    fn dimension(&self) -> Option<usize> {
        self.state.as_ref().and_then(|s| s.dimension)
    }

    fn metric(&self) -> Option<Metric> {
        self.state.as_ref().map(|s| s.quantizer.metric())
    }

    fn silhouette_fast(&self) -> Option<Silhouette> {
        let s = self.state.as_ref()?;
        Some(silhouette::fast(&s.vectors, &s.quantizer, &s.lists))
    }

    fn silhouette(&self) -> Option<Silhouette> {
        let s = self.state.as_ref()?;
        Some(silhouette::exact(&s.vectors, &s.quantizer, &s.lists))
    }
}
