//! Algorithm configuration: one flat set of named tunables shared by every variant.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AnnError, Result};

/// Flat parameter set handed to `SearchAlgorithm::configure`.
///
/// Each variant reads only the fields it needs. Loadable from JSON; missing
/// fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmConfig {
    /// Seed for the build-time RNG.
    pub seed: u64,
    /// LSH: hash functions per table.
    pub k: usize,
    /// LSH: number of tables.
    pub l: usize,
    /// LSH / Hypercube: bucket window width.
    pub w: f32,
    /// Hypercube: projection count (bits per vertex).
    pub kproj: usize,
    /// Hypercube: max points examined per query (0 = unlimited).
    pub max_candidates: usize,
    /// Hypercube: max vertices visited per query.
    pub max_probes: usize,
    /// IVF: number of coarse clusters.
    pub kclusters: usize,
    /// IVF: number of coarse clusters scanned per query.
    pub nprobe: usize,
    /// IVF: Lloyd iteration guard for coarse clustering.
    pub max_iterations: usize,
    /// IVFPQ: number of sub-vectors.
    pub pq_m: usize,
    /// IVFPQ: bits per sub-vector code.
    pub nbits: usize,
    /// IVFPQ: k-means rounds per codebook.
    pub pq_iterations: usize,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            k: 4,
            l: 5,
            w: 4.0,
            kproj: 14,
            max_candidates: 10,
            max_probes: 2,
            kclusters: 50,
            nprobe: 5,
            max_iterations: 10,
            pq_m: 16,
            nbits: 8,
            pq_iterations: 25,
        }
    }
}

impl AlgorithmConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| AnnError::SerializationError(e.to_string()))
    }

    pub fn lsh(&self) -> LshParams {
        LshParams {
            k: self.k,
            l: self.l,
            w: self.w,
        }
    }

    pub fn hypercube(&self) -> HypercubeParams {
        HypercubeParams {
            kproj: self.kproj,
            w: self.w,
            max_candidates: self.max_candidates,
            max_probes: self.max_probes,
        }
    }

    pub fn ivf(&self) -> IvfParams {
        IvfParams {
            kclusters: self.kclusters,
            nprobe: self.nprobe,
            max_iterations: self.max_iterations,
        }
    }

    pub fn pq(&self) -> PqParams {
        PqParams {
            m: self.pq_m,
            nbits: self.nbits,
            iterations: self.pq_iterations,
        }
    }
}

/// LSH tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LshParams {
    pub k: usize,
    pub l: usize,
    pub w: f32,
}

impl LshParams {
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 || self.l == 0 {
            return Err(AnnError::config("LSH k and L must be positive"));
        }
        if !(self.w.is_finite() && self.w > 0.0) {
            return Err(AnnError::config(format!(
                "window size w must be positive and finite, got {}",
                self.w
            )));
        }
        Ok(())
    }
}

/// Hypercube tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HypercubeParams {
    pub kproj: usize,
    pub w: f32,
    pub max_candidates: usize,
    pub max_probes: usize,
}

/// Vertex codes are `u32`.
pub const MAX_KPROJ: usize = 32;

impl HypercubeParams {
    pub fn validate(&self) -> Result<()> {
        if self.kproj == 0 || self.kproj > MAX_KPROJ {
            return Err(AnnError::config(format!(
                "kproj must be in 1..={}, got {}",
                MAX_KPROJ, self.kproj
            )));
        }
        if !(self.w.is_finite() && self.w > 0.0) {
            return Err(AnnError::config(format!(
                "window size w must be positive and finite, got {}",
                self.w
            )));
        }
        if self.max_probes == 0 {
            return Err(AnnError::config("max_probes must be at least 1"));
        }
        Ok(())
    }
}

/// Coarse quantizer tunables shared by IVFFlat and IVFPQ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IvfParams {
    pub kclusters: usize,
    pub nprobe: usize,
    pub max_iterations: usize,
}

impl IvfParams {
    pub fn validate(&self) -> Result<()> {
        if self.kclusters == 0 {
            return Err(AnnError::config("kclusters must be positive"));
        }
        if self.nprobe == 0 {
            return Err(AnnError::config("nprobe must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(AnnError::config("max_iterations must be positive"));
        }
        Ok(())
    }
}

/// Product quantization tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PqParams {
    pub m: usize,
    pub nbits: usize,
    pub iterations: usize,
}

impl PqParams {
    /// Number of codewords per sub-vector slot.
    pub fn codebook_size(&self) -> usize {
        1 << self.nbits
    }

    pub fn validate(&self, dimension: usize) -> Result<()> {
        if self.m == 0 {
            return Err(AnnError::config("sub-vector count M must be positive"));
        }
        if dimension % self.m != 0 {
            return Err(AnnError::config(format!(
                "dimension {} must be divisible by M {}",
                dimension, self.m
            )));
        }
        if self.nbits == 0 || self.nbits > 8 {
            return Err(AnnError::config(format!(
                "nbits must be in 1..=8, got {}",
                self.nbits
            )));
        }
        Ok(())
    }
}
