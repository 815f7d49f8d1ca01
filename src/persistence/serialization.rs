//! Serialization utilities: bincode for cache payloads, JSON for reports and config.

use crate::error::{AnnError, Result};
use serde::{Deserialize, Serialize};

/// Encode data to bincode bytes.
pub fn to_bincode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| AnnError::SerializationError(e.to_string()))
}

/// Decode data from bincode bytes.
pub fn from_bincode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| AnnError::SerializationError(e.to_string()))
}

/// Encode data to indented JSON bytes, for files meant to be read by people.
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| AnnError::SerializationError(e.to_string()))
}

/// Decode data from JSON bytes.
pub fn from_json<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| AnnError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SearchResult;
    use std::time::Duration;

    fn sample() -> SearchResult {
        SearchResult {
            query_id: 7,
            neighbor_ids: vec![3, 1],
            distances: vec![0.25, 1.5],
            range_neighbor_ids: vec![3],
            range_distances: vec![0.25],
            elapsed: Duration::from_micros(1234),
        }
    }

    #[test]
    fn test_search_result_survives_bincode() {
        let bytes = to_bincode(&sample()).unwrap();
        let decoded: SearchResult = from_bincode(&bytes).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_search_result_survives_json() {
        let bytes = to_json_pretty(&vec![sample()]).unwrap();
        let decoded: Vec<SearchResult> = from_json(&bytes).unwrap();
        assert_eq!(decoded, vec![sample()]);
    }

    #[test]
    fn test_garbage_is_a_serialization_error() {
        let err = from_json::<SearchResult>(b"{not json").unwrap_err();
        assert!(matches!(err, AnnError::SerializationError(_)));
        assert!(from_bincode::<SearchResult>(&[1, 2]).is_err());
    }
}
