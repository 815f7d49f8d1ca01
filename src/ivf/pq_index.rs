//! IVFPQ: coarse clustering plus product-quantized residuals, searched with ADC.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use super::coarse::{CoarseQuantizer, InvertedLists};
use super::pq::ProductQuantizer;
use super::silhouette::{self, Silhouette};
use crate::config::{AlgorithmConfig, IvfParams, PqParams};
use crate::distance::Metric;
use crate::error::Result;
use crate::index::{exact_candidates, rank_candidates, QueryParams, SearchAlgorithm, SearchResult};
use crate::neighbor_queue::Neighbor;
use crate::vector::{uniform_dimension, Vector};

#[derive(Debug)]
struct PqState {
    vectors: Vec<Vector>,
    dimension: Option<usize>,
    quantizer: CoarseQuantizer,
    lists: InvertedLists,
    pq: ProductQuantizer,
    /// `codes[i]` encodes the residual of point `i` against its coarse centroid.
    codes: Vec<Vec<u8>>,
}

/// Inverted-file index storing PQ codes of residuals.
///
/// Reported distances are ADC approximations of L2 regardless of the build
/// metric; the metric only drives coarse clustering and the exact fallback.
#[derive(Debug)]
pub struct IvfPqIndex {
    ivf: IvfParams,
    pq: PqParams,
    seed: u64,
    state: Option<PqState>,
}

impl Default for IvfPqIndex {
    fn default() -> Self {
        let config = AlgorithmConfig::default();
        Self {
            ivf: config.ivf(),
            pq: config.pq(),
            seed: config.seed,
            state: None,
        }
    }
}

impl IvfPqIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(ivf: IvfParams, pq: PqParams, seed: u64) -> Self {
        Self {
            ivf,
            pq,
            seed,
            state: None,
        }
    }

    pub fn set_nprobe(&mut self, nprobe: usize) {
        self.ivf.nprobe = nprobe;
    }

    pub fn centroids(&self) -> Option<&[Vec<f32>]> {
        self.state.as_ref().map(|s| s.quantizer.centroids())
    }

    pub fn inverted_lists(&self) -> Option<&[Vec<usize>]> {
        self.state.as_ref().map(|s| s.lists.lists())
    }

    pub fn codebooks(&self) -> Option<&[Vec<Vec<f32>>]> {
        self.state.as_ref().map(|s| s.pq.codebooks())
    }

    /// PQ codes of point `id`.
    pub fn codes(&self, id: usize) -> Option<&[u8]> {
        self.state
            .as_ref()
            .and_then(|s| s.codes.get(id))
            .map(Vec::as_slice)
    }

    /// Coarse centroid plus decoded residual: the vector ADC sees for point `id`.
    pub fn reconstruct(&self, id: usize) -> Option<Vec<f32>> {
        let s = self.state.as_ref()?;
        let codes = s.codes.get(id)?;
        let centroid = s.quantizer.centroid(s.lists.assignment(id));
        Some(
            s.pq.decode(codes)
                .iter()
                .zip(centroid)
                .map(|(r, c)| r + c)
                .collect(),
        )
    }
}

impl SearchAlgorithm for IvfPqIndex {
    fn name(&self) -> &'static str {
        "IVFPQ"
    }

    fn configure(&mut self, config: &AlgorithmConfig) {
        self.ivf = config.ivf();
        self.pq = config.pq();
        self.seed = config.seed;
        self.state = None;
    }

    fn build_index(&mut self, dataset: &[Vector], metric: Metric) -> Result<()> {
        self.state = None;
        self.ivf.validate()?;
        let dimension = uniform_dimension(dataset)?;
        let dim = dimension.unwrap_or(0);
        self.pq.validate(dim)?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let quantizer = if dataset.is_empty() {
            CoarseQuantizer::from_centroids(Vec::new(), metric)
        } else {
            CoarseQuantizer::train(dataset, &self.ivf, metric, &mut rng)
        };
        let lists = InvertedLists::build(&quantizer, dataset);

        let residuals: Vec<Vec<f32>> = dataset
            .iter()
            .enumerate()
            .map(|(i, v)| v.residual(quantizer.centroid(lists.assignment(i))))
            .collect();
        let pq = ProductQuantizer::train(&residuals, dim, &self.pq, &mut rng);
        let codes: Vec<Vec<u8>> = residuals.iter().map(|r| pq.encode(r)).collect();

        info!(
            points = dataset.len(),
            clusters = quantizer.len(),
            m = self.pq.m,
            nbits = self.pq.nbits,
            %metric,
            "IVFPQ index built"
        );
        self.state = Some(PqState {
            vectors: dataset.to_vec(),
            dimension,
            quantizer,
            lists,
            pq,
            codes,
        });
        Ok(())
    }

    fn search(&self, query: &Vector, params: &QueryParams, query_id: usize) -> SearchResult {
        let started = Instant::now();
        let Some(state) = &self.state else {
            return SearchResult::empty(query_id, started);
        };
        if state.vectors.is_empty() || Some(query.dimension()) != state.dimension {
            debug!(query_id, "IVFPQ: empty index or dimension mismatch");
            return SearchResult::empty(query_id, started);
        }

        let mut candidates = Vec::new();
        for c in state.quantizer.probe(query.as_slice(), self.ivf.nprobe) {
            let ids = state.lists.list(c);
            if ids.is_empty() {
                continue;
            }
            let table = state.pq.lookup_table(&query.residual(state.quantizer.centroid(c)));
            // Lists partition the points, so each id is scored once.
            candidates.extend(
                ids.iter()
                    .map(|&id| Neighbor::new(id, table.adc(&state.codes[id]))),
            );
        }
        if candidates.is_empty() {
            debug!(query_id, "IVFPQ: probed lists are empty, scanning the full dataset");
            candidates = exact_candidates(&state.vectors, query.as_slice(), state.quantizer.metric());
        }

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
