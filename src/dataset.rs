//! Plain-text vector loader.
//!
//! One vector per line, components separated by commas and/or whitespace.
//! Blank lines and lines starting with `#` are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::error::{AnnError, Result};
use crate::vector::{uniform_dimension, Vector};

/// Parse vectors from any buffered reader. Line numbers in errors are 1-based.
pub fn read_vectors<R: BufRead>(reader: R) -> Result<Vec<Vector>> {
    let mut vectors = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let vector = Vector::from_str(trimmed).map_err(|e| match e {
            AnnError::Parse { reason, .. } => AnnError::Parse {
                line: index + 1,
                reason,
            },
            other => other,
        })?;
        vectors.push(vector);
    }
    uniform_dimension(&vectors)?;
    Ok(vectors)
}

/// Load every vector in the file at `path`.
pub fn load_vectors(path: impl AsRef<Path>) -> Result<Vec<Vector>> {
    let path = path.as_ref();
    let vectors = read_vectors(BufReader::new(File::open(path)?))?;
    info!(
        path = %path.display(),
        vectors = vectors.len(),
        dim = vectors.first().map_or(0, Vector::dimension),
        "vectors loaded"
    );
    Ok(vectors)
}
