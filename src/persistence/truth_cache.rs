//! On-disk cache of brute-force ground truth for a query batch.
//!
//! File layout: `[magic: 4 bytes][version: u32][crc32: u32][payload: bincode(CachedTruth)]`.
//! A file that is truncated, fails its checksum or was computed for different
//! inputs is treated as a miss and logged, never as an error.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::distance::Metric;
use crate::error::Result;
use crate::index::{QueryParams, SearchResult};
use crate::persistence::serialization;
use crate::vector::Vector;

const MAGIC: &[u8; 4] = b"ANNT";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 12;

fn checksum(vectors: &[Vector]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for v in vectors {
        hasher.update(&(v.dimension() as u64).to_le_bytes());
        for x in v.as_slice() {
            hasher.update(&x.to_le_bytes());
        }
    }
    hasher.finalize()
}

/// Identity of a ground-truth batch: what was searched, how, and with which parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheKey {
    dataset_len: usize,
    dataset_crc: u32,
    queries_len: usize,
    queries_crc: u32,
    metric: Metric,
    params: QueryParams,
}

impl CacheKey {
    pub fn new(dataset: &[Vector], queries: &[Vector], metric: Metric, params: &QueryParams) -> Self {
        Self {
            dataset_len: dataset.len(),
            dataset_crc: checksum(dataset),
            queries_len: queries.len(),
            queries_crc: checksum(queries),
            metric,
            params: *params,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedTruth {
    key: CacheKey,
    results: Vec<SearchResult>,
}

/// A single-file ground-truth cache.
#[derive(Debug, Clone)]
pub struct GroundTruthCache {
    path: PathBuf,
}

impl GroundTruthCache {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached results for `key`, or `None` on any kind of miss.
    pub fn load(&self, key: &CacheKey) -> Result<Option<Vec<SearchResult>>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no ground truth cache file");
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        match decode(&bytes) {
            Ok(cached) if &cached.key == key => {
                info!(path = %self.path.display(), queries = cached.results.len(), "ground truth loaded from cache");
                Ok(Some(cached.results))
            }
            Ok(_) => {
                info!(path = %self.path.display(), "ground truth cache is for different inputs");
                Ok(None)
            }
            Err(reason) => {
                warn!(path = %self.path.display(), %reason, "ignoring unreadable ground truth cache");
                Ok(None)
            }
        }
    }

    /// Write `results` for `key`, replacing any previous cache file.
    pub fn store(&self, key: &CacheKey, results: &[SearchResult]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let payload = serialization::to_bincode(&CachedTruth {
            key: key.clone(),
            results: results.to_vec(),
        })?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        bytes.extend_from_slice(&payload);
        fs::write(&self.path, &bytes)?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "ground truth cached");
        Ok(())
    }
}

fn decode(bytes: &[u8]) -> std::result::Result<CachedTruth, String> {
    if bytes.len() < HEADER_LEN {
        return Err("file shorter than header".to_string());
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);
    if &header[0..4] != MAGIC {
        return Err("bad magic".to_string());
    }
    let word = |at: usize| u32::from_le_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]]);
    let version = word(4);
    if version != VERSION {
        return Err(format!("unsupported version {}", version));
    }
    if crc32fast::hash(payload) != word(8) {
        return Err("checksum mismatch".to_string());
    }
    serialization::from_bincode(payload).map_err(|e| e.to_string())
}
