//! Quality and throughput of an approximate batch against exact ground truth.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::index::SearchResult;

/// Aggregate metrics for one query batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Number of queries evaluated.
    pub queries: usize,
    /// Mean of approx-nearest / true-nearest distance over queries where it is defined.
    pub average_af: f64,
    /// Queries that contributed to `average_af`.
    pub af_queries: usize,
    /// Mean recall@N over the batch; 0 when N is 0.
    pub recall_at_n: f64,
    /// Queries per second over the batch wall time.
    pub qps: f64,
    pub avg_approx_ms: f64,
    pub avg_true_ms: f64,
    pub p50_approx_ms: f64,
    pub p99_approx_ms: f64,
}

/// Approximation factor of one query.
///
/// `None` when either side is empty, or when the true nearest distance is 0
/// but the approximate one is not.
pub fn approximation_factor(approx: &SearchResult, truth: &SearchResult) -> Option<f64> {
    let a = approx.nearest_distance()? as f64;
    let t = truth.nearest_distance()? as f64;
    if t == 0.0 {
        return (a == 0.0).then_some(1.0);
    }
    Some(a / t)
}

/// `|approx[..n] ∩ truth[..n]| / n`. `None` when `n` is 0.
pub fn recall_at(approx: &SearchResult, truth: &SearchResult, n: usize) -> Option<f64> {
    if n == 0 {
        return None;
    }
    let expected: HashSet<usize> = truth.neighbor_ids.iter().take(n).copied().collect();
    let hits = approx
        .neighbor_ids
        .iter()
        .take(n)
        .filter(|id| expected.contains(id))
        .count();
    Some(hits as f64 / n as f64)
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Nearest-rank percentile of `values` (e.g. 50.0, 99.0).
pub fn percentile(values: &[f64], percentile: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let index = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Compare `approx[i]` with `truth[i]` for every query and summarize.
///
/// `batch_elapsed` is the wall time of the whole approximate batch.
pub fn evaluate(
    approx: &[SearchResult],
    truth: &[SearchResult],
    n: usize,
    batch_elapsed: Duration,
) -> EvaluationReport {
    let queries = approx.len().min(truth.len());
    if queries == 0 {
        return EvaluationReport::default();
    }
    let pairs = || approx.iter().zip(truth);

    let afs: Vec<f64> = pairs().filter_map(|(a, t)| approximation_factor(a, t)).collect();
    let recalls: Vec<f64> = pairs().filter_map(|(a, t)| recall_at(a, t, n)).collect();
    let approx_ms: Vec<f64> = approx[..queries].iter().map(|r| millis(r.elapsed)).collect();
    let true_ms: Vec<f64> = truth[..queries].iter().map(|r| millis(r.elapsed)).collect();

    let seconds = batch_elapsed.as_secs_f64();
    let report = EvaluationReport {
        queries,
        average_af: mean(&afs),
        af_queries: afs.len(),
        recall_at_n: mean(&recalls),
        qps: if seconds > 0.0 { queries as f64 / seconds } else { 0.0 },
        avg_approx_ms: mean(&approx_ms),
        avg_true_ms: mean(&true_ms),
        p50_approx_ms: percentile(&approx_ms, 50.0),
        p99_approx_ms: percentile(&approx_ms, 99.0),
    };
    info!(
        queries,
        af = report.average_af,
        recall = report.recall_at_n,
        qps = report.qps,
        "evaluation complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn result(ids: &[usize], distances: &[f32], ms: u64) -> SearchResult {
        SearchResult {
            neighbor_ids: ids.to_vec(),
            distances: distances.to_vec(),
            elapsed: Duration::from_millis(ms),
            ..SearchResult::default()
        }
    }

    #[test]
    fn test_af_rules() {
        let truth = result(&[0], &[2.0], 1);
        assert_eq!(approximation_factor(&result(&[1], &[3.0], 1), &truth), Some(1.5));

        let exact_zero = result(&[0], &[0.0], 1);
        assert_eq!(approximation_factor(&result(&[0], &[0.0], 1), &exact_zero), Some(1.0));
        assert_eq!(approximation_factor(&result(&[4], &[1.0], 1), &exact_zero), None);
        assert_eq!(approximation_factor(&SearchResult::default(), &truth), None);
    }

    #[test]
    fn test_recall_denominator() {
        let truth = result(&[1, 2, 3, 4], &[1.0, 2.0, 3.0, 4.0], 1);
        assert_eq!(recall_at(&result(&[1, 9], &[1.0, 5.0], 1), &truth, 2), Some(0.5));
        assert_eq!(recall_at(&result(&[3, 1], &[3.0, 1.0], 1), &truth, 2), Some(0.5));

        // A dataset smaller than N caps the achievable recall below 1.
        let short_truth = result(&[7, 8, 9], &[1.0, 2.0, 3.0], 1);
        assert_eq!(recall_at(&short_truth, &short_truth, 5), Some(0.6));
        assert_eq!(recall_at(&SearchResult::default(), &short_truth, 5), Some(0.0));
        assert_eq!(recall_at(&short_truth, &SearchResult::default(), 5), Some(0.0));
        assert_eq!(recall_at(&short_truth, &short_truth, 0), None);
    }

    #[test]
    fn test_evaluate_small_dataset_recall() {
        let truth = vec![result(&[2, 0, 1], &[0.5, 1.0, 2.0], 1)];
        let report = evaluate(&truth, &truth, 5, Duration::from_millis(10));
        assert_relative_eq!(report.recall_at_n, 0.6);
        assert_relative_eq!(report.average_af, 1.0);
    }

    #[test]
    fn test_evaluate_batch() {
        let approx = vec![
            result(&[0, 1], &[1.0, 2.0], 2),
            result(&[5, 6], &[4.0, 5.0], 4),
            SearchResult::default(),
        ];
        let truth = vec![
            result(&[0, 1], &[1.0, 2.0], 10),
            result(&[5, 7], &[2.0, 3.0], 10),
            result(&[8, 9], &[1.0, 1.5], 10),
        ];
        let report = evaluate(&approx, &truth, 2, Duration::from_millis(500));

        assert_eq!(report.queries, 3);
        assert_eq!(report.af_queries, 2);
        assert_relative_eq!(report.average_af, 1.5);
        assert_relative_eq!(report.recall_at_n, 0.5);
        assert_relative_eq!(report.qps, 6.0);
        assert_relative_eq!(report.avg_approx_ms, 2.0);
        assert_relative_eq!(report.avg_true_ms, 10.0);
        assert_relative_eq!(report.p50_approx_ms, 2.0);
        assert_relative_eq!(report.p99_approx_ms, 4.0);
    }

    #[test]
    fn test_evaluate_empty_batch() {
        assert_eq!(evaluate(&[], &[], 5, Duration::from_secs(1)), EvaluationReport::default());
    }

    #[test]
    fn test_percentile() {
        let latencies = [300.0, 100.0, 200.0];
        assert_eq!(percentile(&latencies, 50.0), 200.0);
        assert_eq!(percentile(&latencies, 99.0), 300.0);
        assert_eq!(percentile(&[], 99.0), 0.0);
    }
}
