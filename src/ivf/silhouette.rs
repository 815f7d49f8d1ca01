//! Silhouette diagnostics for the coarse clustering.
//!
//! `s(i) = (b - a) / max(a, b)`, averaged per cluster and overall. Both
//! variants score each point against its assigned coarse cluster.

use serde::{Deserialize, Serialize};

use super::coarse::{CoarseQuantizer, InvertedLists};
use crate::vector::Vector;

/// Per-cluster mean silhouette plus the mean over all points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Silhouette {
    pub per_cluster: Vec<f64>,
    pub overall: f64,
}

fn score(a: f64, b: f64) -> f64 {
    let max = a.max(b);
    if max > 0.0 {
        (b - a) / max
    } else {
        0.0
    }
}

fn average(scores: impl Iterator<Item = (usize, f64)>, clusters: usize, points: usize) -> Silhouette {
    let mut sums = vec![0.0f64; clusters];
    let mut counts = vec![0usize; clusters];
    let mut total = 0.0;
    for (c, s) in scores {
        sums[c] += s;
        counts[c] += 1;
        total += s;
    }
    let per_cluster = sums
        .into_iter()
        .zip(counts)
        .map(|(sum, count)| if count > 0 { sum / count as f64 } else { 0.0 })
        .collect();
    Silhouette {
        per_cluster,
        overall: if points > 0 { total / points as f64 } else { 0.0 },
    }
}

/// Centroid approximation: `a` is the distance to the own centroid, `b` the
/// distance to the nearest other centroid. With a single cluster every score is 0.
pub fn fast(data: &[Vector], quantizer: &CoarseQuantizer, lists: &InvertedLists) -> Silhouette {
    let metric = quantizer.metric();
    let scores = data.iter().enumerate().map(|(i, v)| {
        let own = lists.assignment(i);
        let x = v.as_slice();
        let a = metric.distance(x, quantizer.centroid(own)) as f64;
        let b = (0..quantizer.len())
            .filter(|&c| c != own)
            .map(|c| metric.distance(x, quantizer.centroid(c)) as f64)
            .reduce(f64::min);
        (own, b.map_or(0.0, |b| score(a, b)))
    });
    average(scores, quantizer.len(), data.len())
}

/// Pairwise definition: `a` is the mean distance to the other members of the
/// own cluster, `b` the mean distance to the members of the second-nearest
/// centroid's cluster. Singleton clusters score 0.
pub fn exact(data: &[Vector], quantizer: &CoarseQuantizer, lists: &InvertedLists) -> Silhouette {
    let metric = quantizer.metric();
    let mean_distance = |x: &[f32], members: &[usize], skip: Option<usize>| -> f64 {
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for &j in members.iter().filter(|&&j| Some(j) != skip) {
            sum += metric.distance(x, data[j].as_slice()) as f64;
            count += 1;
        }
        if count > 0 {
            sum / count as f64
        } else {
            0.0
        }
    };

    let scores = data.iter().enumerate().map(|(i, v)| {
        let own = lists.assignment(i);
        let cluster = lists.list(own);
        let x = v.as_slice();
        if cluster.len() <= 1 {
            return (own, 0.0);
        }
        let Some(second) = quantizer.second_nearest(x) else {
            return (own, 0.0);
        };
        let a = mean_distance(x, cluster, Some(i));
        let b = mean_distance(x, lists.list(second), None);
        (own, score(a, b))
    });
    average(scores, quantizer.len(), data.len())
}
