//! Parallel query execution over a built index.
//!
//! Workers pull query positions from a shared atomic counter, so uneven query
//! costs balance themselves. Each result lands in the slot of its query, which
//! keeps the output in input order no matter which worker answered it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use tracing::info;

use crate::error::{AnnError, Result};
use crate::index::{QueryParams, SearchAlgorithm, SearchResult};
use crate::vector::Vector;

/// Answer every query in `queries` using `threads` workers (0 = one per core).
///
/// Result `i` belongs to `queries[i]` and carries `query_id == i`.
pub fn run_parallel_search(
    algo: &dyn SearchAlgorithm,
    queries: &[Vector],
    threads: usize,
    params: &QueryParams,
) -> Result<Vec<SearchResult>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| AnnError::ThreadPool(e.to_string()))?;
    let workers = pool.current_num_threads().min(queries.len()).max(1);

    let started = Instant::now();
    let slots: Vec<OnceLock<SearchResult>> = (0..queries.len()).map(|_| OnceLock::new()).collect();
    let next = AtomicUsize::new(0);

    pool.scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|_| loop {
                let i = next.fetch_add(1, Ordering::Relaxed);
                let Some(query) = queries.get(i) else {
                    break;
                };
                let _ = slots[i].set(algo.search(query, params, i));
            });
        }
    });

    let results: Vec<SearchResult> = slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.into_inner().unwrap_or_else(|| SearchResult {
            query_id: i,
            ..SearchResult::default()
        }))
        .collect();

    info!(
        algorithm = algo.name(),
        queries = results.len(),
        workers,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "parallel search finished"
    );
    Ok(results)
}
