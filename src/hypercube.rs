//! Hypercube index: each point maps to a vertex of a `kproj`-bit hypercube,
//! queries probe Hamming neighbors breadth-first.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::config::{AlgorithmConfig, HypercubeParams};
use crate::distance::Metric;
use crate::error::Result;
use crate::index::{QueryParams, SearchAlgorithm, SearchResult};
use crate::neighbor_queue::{MaxHeap, Neighbor};
use crate::projection::RandomProjections;
use crate::vector::{uniform_dimension, Vector};

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Deterministic bit for bucket `cell` of projection `function`.
pub fn coin_flip(function: usize, cell: i64, seed: u64) -> bool {
    let key = ((function as u64) << 32) ^ (cell as u64);
    splitmix64(key ^ seed) & 1 == 1
}

#[derive(Debug)]
struct CubeState {
    vectors: Vec<Vector>,
    dimension: Option<usize>,
    metric: Metric,
    projections: RandomProjections,
    vertices: HashMap<u32, Vec<usize>>,
}

impl CubeState {
    fn vertex_of(&self, x: &[f32], seed: u64) -> u32 {
        self.projections
            .cells(x)
            .into_iter()
            .enumerate()
            .filter(|&(i, cell)| coin_flip(i, cell, seed))
            .fold(0u32, |code, (i, _)| code | (1u32 << i))
    }
}

/// Random-projection hypercube index.
#[derive(Debug)]
pub struct HypercubeIndex {
    params: HypercubeParams,
    seed: u64,
    state: Option<CubeState>,
}

impl Default for HypercubeIndex {
    fn default() -> Self {
        let config = AlgorithmConfig::default();
        Self {
            params: config.hypercube(),
            seed: config.seed,
            state: None,
        }
    }
}

impl HypercubeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: HypercubeParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            state: None,
        }
    }

    /// Vertex code of `x`, if built with a matching dimension.
    pub fn vertex(&self, x: &Vector) -> Option<u32> {
        let state = self.state.as_ref()?;
        if Some(x.dimension()) != state.dimension {
            return None;
        }
        Some(state.vertex_of(x.as_slice(), self.seed))
    }

    /// Non-empty vertices and the points they hold.
    pub fn vertices(&self) -> Option<&HashMap<u32, Vec<usize>>> {
        self.state.as_ref().map(|s| &s.vertices)
    }

    /// Vertices visited for `x`, in breadth-first probe order.
    pub fn probe_sequence(&self, x: &Vector) -> Vec<u32> {
        let Some(start) = self.vertex(x) else {
            return Vec::new();
        };
        ProbeOrder::new(start, self.params.kproj)
            .take(self.params.max_probes)
            .collect()
    }
}

/// Breadth-first walk over single-bit flips, starting at the query vertex.
struct ProbeOrder {
    agenda: VecDeque<u32>,
    visited: HashSet<u32>,
    bits: usize,
}

impl ProbeOrder {
    fn new(start: u32, bits: usize) -> Self {
        Self {
            agenda: VecDeque::from([start]),
            visited: HashSet::from([start]),
            bits,
        }
    }
}

impl Iterator for ProbeOrder {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let current = self.agenda.pop_front()?;
        for bit in 0..self.bits {
            let neighbour = current ^ (1u32 << bit);
            if self.visited.insert(neighbour) {
                self.agenda.push_back(neighbour);
            }
        }
        Some(current)
    }
}

impl SearchAlgorithm for HypercubeIndex {
    fn name(&self) -> &'static str {
        "Hypercube"
    }

    fn configure(&mut self, config: &AlgorithmConfig) {
        self.params = config.hypercube();
        self.seed = config.seed;
        self.state = None;
    }

    fn build_index(&mut self, dataset: &[Vector], metric: Metric) -> Result<()> {
        self.state = None;
        self.params.validate()?;
        let dimension = uniform_dimension(dataset)?;
        let dim = dimension.unwrap_or(0);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let projections = RandomProjections::sample(self.params.kproj, dim, self.params.w, &mut rng);
        let mut state = CubeState {
            vectors: dataset.to_vec(),
            dimension,
            metric,
            projections,
            vertices: HashMap::new(),
        };
        for (id, v) in dataset.iter().enumerate() {
            let code = state.vertex_of(v.as_slice(), self.seed);
            state.vertices.entry(code).or_default().push(id);
        }

        info!(
            points = dataset.len(),
            dim,
            kproj = self.params.kproj,
            vertices = state.vertices.len(),
            "hypercube index built"
        );
        if metric != Metric::L2 {
            warn!(%metric, "hypercube random projections assume the L2 metric");
        }
        self.state = Some(state);
        Ok(())
    }

    fn search(&self, query: &Vector, params: &QueryParams, query_id: usize) -> SearchResult {
        let started = Instant::now();
        let Some(state) = &self.state else {
            return SearchResult::empty(query_id, started);
        };
        if state.vectors.is_empty() || Some(query.dimension()) != state.dimension {
            debug!(query_id, "hypercube: empty index or dimension mismatch");
            return SearchResult::empty(query_id, started);
        }

        let q = query.as_slice();
        let candidate_limit = match self.params.max_candidates {
            0 => usize::MAX,
            limit => limit,
        };
        let start = state.vertex_of(q, self.seed);

        let mut best = MaxHeap::with_capacity(params.n);
        let mut range = Vec::new();
        let mut examined = 0usize;
        'probe: for vertex in ProbeOrder::new(start, self.params.kproj).take(self.params.max_probes) {
            let Some(ids) = state.vertices.get(&vertex) else {
                continue;
            };
            // Vertices partition the points, so ids never repeat across probes.
            for &id in ids {
                let candidate = Neighbor::new(id, state.metric.distance(q, state.vectors[id].as_slice()));
                best.push_bounded(candidate, params.n);
                if params.in_range(candidate.distance) {
                    range.push(candidate);
                }
                examined += 1;
                if examined >= candidate_limit {
                    break 'probe;
                }
            }
        }

        range.sort_unstable();
        SearchResult::from_neighbors(query_id, best.into_sorted_vec(), range, started)
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
