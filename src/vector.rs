//! Point type shared by every index

use crate::error::{AnnError, Result};
use serde::{Deserialize, Serialize};

/// A point in n-dimensional space. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    /// Create a new vector from a Vec<f32>
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Get the dimension of the vector
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the underlying data as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Component-wise difference `self - other`, used for IVF residuals.
    pub fn residual(&self, other: &[f32]) -> Vec<f32> {
        self.data.iter().zip(other).map(|(a, b)| a - b).collect()
    }

    /// Parse a vector from a string of floats separated by commas and/or whitespace
    pub fn from_str(s: &str) -> Result<Self> {
        let data: Result<Vec<f32>> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|x| !x.is_empty())
            .map(|x| {
                x.parse::<f32>().map_err(|_| AnnError::Parse {
                    line: 0,
                    reason: format!("Invalid float: {}", x),
                })
            })
            .collect();
        Ok(Vector::new(data?))
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Vector::new(data)
    }
}

/// Check that every vector in `dataset` shares one non-zero dimension and return it.
///
/// Returns `Ok(None)` for an empty dataset.
pub fn uniform_dimension(dataset: &[Vector]) -> Result<Option<usize>> {
    let Some(first) = dataset.first() else {
        return Ok(None);
    };
    let dim = first.dimension();
    if dim == 0 {
        return Err(AnnError::config("dataset vectors have zero dimension"));
    }
    if let Some(bad) = dataset.iter().find(|v| v.dimension() != dim) {
        return Err(AnnError::DimensionMismatch {
            expected: dim,
            actual: bad.dimension(),
        });
    }
    Ok(Some(dim))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_creation() {
        let v = Vector::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(v.dimension(), 3);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_residual() {
        let v = Vector::new(vec![4.0, 5.0, 6.0]);
        assert_eq!(v.residual(&[1.0, 2.0, 3.0]), vec![3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_from_str() {
        let v = Vector::from_str("1.0, 2.0, 3.0").unwrap();
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0]);

        let v = Vector::from_str("  4 5\t6 ").unwrap();
        assert_eq!(v.as_slice(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        assert!(matches!(
            Vector::from_str("1.0, abc"),
            Err(AnnError::Parse { .. })
        ));
    }

    #[test]
    fn test_uniform_dimension() {
        assert_eq!(uniform_dimension(&[]).unwrap(), None);

        let ok = vec![Vector::new(vec![1.0, 2.0]), Vector::new(vec![3.0, 4.0])];
        assert_eq!(uniform_dimension(&ok).unwrap(), Some(2));

        let ragged = vec![Vector::new(vec![1.0, 2.0]), Vector::new(vec![3.0])];
        assert!(matches!(
            uniform_dimension(&ragged),
            Err(AnnError::DimensionMismatch { expected: 2, actual: 1 })
        ));

        let zero = vec![Vector::new(vec![])];
        assert!(matches!(
            uniform_dimension(&zero),
            Err(AnnError::InvalidConfig(_))
        ));
    }
}
