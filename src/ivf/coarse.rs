//! Coarse quantizer shared by IVFFlat and IVFPQ.
//!
//! Training runs on a random subset of the dataset: k-means++ seeding, then
//! Lloyd iterations whose update step takes the per-dimension median of each
//! cluster (k-medians). Every dataset point is then assigned to its nearest
//! centroid to form the inverted lists.

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::config::IvfParams;
use crate::distance::Metric;
use crate::neighbor_queue::Neighbor;
use crate::vector::Vector;

/// Lloyd iteration stops once at most this many subset points change cluster.
pub const REASSIGNMENT_THRESHOLD: usize = 1;

/// Size of the training subset for `n` points and `kclusters` clusters.
///
/// `⌈√n⌉`, raised to `2·kclusters` (capped at `n`) so small datasets still
/// offer every cluster distinct seeds.
pub fn subset_size(n: usize, kclusters: usize) -> usize {
    let sqrt = (n as f64).sqrt().ceil() as usize;
    sqrt.max(n.min(kclusters.saturating_mul(2))).min(n)
}

/// Median of `values`; the mean of the two middle values for even lengths.
///
/// Reorders `values`. Returns `None` when empty.
pub fn median(values: &mut [f32]) -> Option<f32> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    let mid = n / 2;
    let (lower, upper, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let upper = *upper;
    if n % 2 == 1 {
        return Some(upper);
    }
    let lower_max = lower.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    Some((lower_max + upper) / 2.0)
}

/// Trained coarse centroids plus the metric they were trained under.
#[derive(Debug, Clone, PartialEq)]
pub struct CoarseQuantizer {
    centroids: Vec<Vec<f32>>,
    metric: Metric,
}

impl CoarseQuantizer {
    /// Train on a random subset of `data`. Expects a non-empty, uniform-dimension dataset.
    pub fn train(data: &[Vector], params: &IvfParams, metric: Metric, rng: &mut StdRng) -> Self {
        let n = data.len();
        let amount = subset_size(n, params.kclusters);
        let subset: Vec<&[f32]> = rand::seq::index::sample(rng, n, amount)
            .into_iter()
            .map(|i| data[i].as_slice())
            .collect();

        let mut quantizer = Self {
            centroids: Self::seed_plus_plus(&subset, params.kclusters, metric, rng),
            metric,
        };
        debug!(
            subset = subset.len(),
            requested = params.kclusters,
            seeded = quantizer.centroids.len(),
            "k-means++ seeding complete"
        );
        quantizer.lloyd_medians(&subset, params.max_iterations);
        quantizer
    }

    /// Build directly from known centroids.
    pub fn from_centroids(centroids: Vec<Vec<f32>>, metric: Metric) -> Self {
        Self { centroids, metric }
    }

    /// k-means++: first centroid uniform, each next one drawn with probability
    /// proportional to the squared distance to its nearest chosen centroid.
    fn seed_plus_plus(subset: &[&[f32]], k: usize, metric: Metric, rng: &mut StdRng) -> Vec<Vec<f32>> {
        let m = subset.len();
        let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k.min(m));
        if m == 0 || k == 0 {
            return centroids;
        }
        centroids.push(subset[rng.gen_range(0..m)].to_vec());

        let mut nearest = vec![f64::INFINITY; m];
        while centroids.len() < k {
            let newest = &centroids[centroids.len() - 1];
            let mut cumulative = Vec::with_capacity(m);
            let mut total = 0.0f64;
            for (i, point) in subset.iter().enumerate() {
                let d = metric.distance(point, newest) as f64;
                nearest[i] = nearest[i].min(d);
                total += nearest[i] * nearest[i];
                cumulative.push(total);
            }
            if total == 0.0 {
                break;
            }
            let x = rng.gen_range(0.0..total);
            let picked = cumulative.partition_point(|&p| p <= x).min(m - 1);
            centroids.push(subset[picked].to_vec());
        }
        centroids
    }

    fn lloyd_medians(&mut self, subset: &[&[f32]], max_iterations: usize) {
        let mut assignment = vec![usize::MAX; subset.len()];
        for iteration in 1..=max_iterations {
            let mut changed = 0usize;
            for (slot, point) in assignment.iter_mut().zip(subset) {
                let nearest = self.nearest(point);
                if *slot != nearest {
                    *slot = nearest;
                    changed += 1;
                }
            }
            self.update_medians(subset, &assignment);
            debug!(iteration, changed, "coarse clustering iteration");
            if changed <= REASSIGNMENT_THRESHOLD {
                return;
            }
        }
        debug!(max_iterations, "coarse clustering hit the iteration guard, keeping current centroids");
    }

    fn update_medians(&mut self, subset: &[&[f32]], assignment: &[usize]) {
        let mut members: Vec<Vec<&[f32]>> = vec![Vec::new(); self.centroids.len()];
        for (point, &c) in subset.iter().zip(assignment) {
            members[c].push(*point);
        }
        let mut component = Vec::new();
        for (centroid, cluster) in self.centroids.iter_mut().zip(&members) {
            // Empty clusters keep their centroid.
            if cluster.is_empty() {
                continue;
            }
            for (d, value) in centroid.iter_mut().enumerate() {
                component.clear();
                component.extend(cluster.iter().map(|p| p[d]));
                if let Some(m) = median(&mut component) {
                    *value = m;
                }
            }
        }
    }

    pub fn centroids(&self) -> &[Vec<f32>] {
        &self.centroids
    }

    pub fn centroid(&self, c: usize) -> &[f32] {
        &self.centroids[c]
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Index of the nearest centroid; ties go to the lower index.
    pub fn nearest(&self, x: &[f32]) -> usize {
        let mut best = 0;
        let mut best_dist = f32::INFINITY;
        for (c, centroid) in self.centroids.iter().enumerate() {
            let d = self.metric.distance(x, centroid);
            if d < best_dist {
                best_dist = d;
                best = c;
            }
        }
        best
    }

    /// Nearest centroid other than [`nearest`](Self::nearest), if there are at least two.
    pub fn second_nearest(&self, x: &[f32]) -> Option<usize> {
        let nearest = self.nearest(x);
        let mut second = None;
        let mut best_dist = f32::INFINITY;
        for (c, centroid) in self.centroids.iter().enumerate() {
            if c == nearest {
                continue;
            }
            let d = self.metric.distance(x, centroid);
            if second.is_none() || d < best_dist {
                best_dist = d;
                second = Some(c);
            }
        }
        second
    }

    /// The `nprobe` centroids nearest to `query` (at least one). Order is unspecified.
    pub fn probe(&self, query: &[f32], nprobe: usize) -> Vec<usize> {
        let mut scored: Vec<Neighbor> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(c, centroid)| Neighbor::new(c, self.metric.distance(query, centroid)))
            .collect();
        let keep = nprobe.max(1).min(scored.len());
        if keep < scored.len() {
            scored.select_nth_unstable(keep);
            scored.truncate(keep);
        }
        scored.into_iter().map(|n| n.id).collect()
    }
}

/// Inverted lists: the dataset partitioned by nearest coarse centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct InvertedLists {
    lists: Vec<Vec<usize>>,
    assignments: Vec<usize>,
}

impl InvertedLists {
    pub fn build(quantizer: &CoarseQuantizer, data: &[Vector]) -> Self {
        let mut lists = vec![Vec::new(); quantizer.len()];
        let assignments: Vec<usize> = data
            .iter()
            .enumerate()
            .map(|(id, v)| {
                let c = quantizer.nearest(v.as_slice());
                lists[c].push(id);
                c
            })
            .collect();
        Self { lists, assignments }
    }

    pub fn list(&self, c: usize) -> &[usize] {
        &self.lists[c]
    }

    pub fn lists(&self) -> &[Vec<usize>] {
        &self.lists
    }

    /// Coarse cluster of dataset point `id`.
    pub fn assignment(&self, id: usize) -> usize {
        self.assignments[id]
    }

    /// Total number of entries across all lists.
    pub fn total_len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn square() -> Vec<Vector> {
        vec![
            Vector::new(vec![0.0, 0.0]),
            Vector::new(vec![0.0, 1.0]),
            Vector::new(vec![5.0, 5.0]),
            Vector::new(vec![5.0, 6.0]),
        ]
    }

    fn params(kclusters: usize) -> IvfParams {
        IvfParams {
            kclusters,
            nprobe: 1,
            max_iterations: 10,
        }
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&mut [7.0]), Some(7.0));
    }

    #[test]
    fn test_subset_size() {
        assert_eq!(subset_size(10_000, 50), 100);
        assert_eq!(subset_size(10, 1), 4);
        assert_eq!(subset_size(4, 2), 4);
        assert_eq!(subset_size(4, 50), 4);
        assert_eq!(subset_size(9, usize::MAX), 9);
    }

    #[test]
    fn test_two_clusters_on_square() {
        for seed in 0..20 {
            let data = square();
            let mut rng = StdRng::seed_from_u64(seed);
            let quantizer = CoarseQuantizer::train(&data, &params(2), Metric::L2, &mut rng);
            let lists = InvertedLists::build(&quantizer, &data);

            assert_eq!(quantizer.len(), 2);
            let mut sizes: Vec<usize> = lists.lists().iter().map(Vec::len).collect();
            sizes.sort_unstable();
            assert_eq!(sizes, vec![2, 2], "seed {}", seed);
            assert_eq!(lists.assignment(0), lists.assignment(1));
            assert_eq!(lists.assignment(2), lists.assignment(3));
        }
    }

    #[test]
    fn test_identical_points_stop_seeding_early() {
        let data = vec![Vector::new(vec![1.0, 1.0]); 9];
        let mut rng = StdRng::seed_from_u64(1);
        let quantizer = CoarseQuantizer::train(&data, &params(3), Metric::L2, &mut rng);
        assert_eq!(quantizer.len(), 1);
        assert_eq!(InvertedLists::build(&quantizer, &data).total_len(), 9);
    }

    #[test]
    fn test_huge_cluster_count_is_capped_by_data() {
        let data = square();
        let mut rng = StdRng::seed_from_u64(3);
        let quantizer = CoarseQuantizer::train(&data, &params(usize::MAX), Metric::L2, &mut rng);
        assert!(quantizer.len() <= data.len());
        assert_eq!(InvertedLists::build(&quantizer, &data).total_len(), 4);
    }

    #[test]
    fn test_nearest_and_second_nearest() {
        let q = CoarseQuantizer::from_centroids(
            vec![vec![0.0], vec![10.0], vec![3.0]],
            Metric::L1,
        );
        assert_eq!(q.nearest(&[1.0]), 0);
        assert_eq!(q.second_nearest(&[1.0]), Some(2));
        assert_eq!(q.nearest(&[9.0]), 1);
        assert_eq!(q.second_nearest(&[9.0]), Some(2));

        let single = CoarseQuantizer::from_centroids(vec![vec![0.0]], Metric::L2);
        assert_eq!(single.second_nearest(&[4.0]), None);
    }

    #[test]
    fn test_probe_membership() {
        let q = CoarseQuantizer::from_centroids(
            (0..10).map(|i| vec![i as f32 * 10.0]).collect(),
            Metric::L2,
        );
        let mut probed = q.probe(&[31.0], 3);
        probed.sort_unstable();
        assert_eq!(probed, vec![2, 3, 4]);
        assert_eq!(q.probe(&[31.0], 0), vec![3]);
        assert_eq!(q.probe(&[31.0], 50).len(), 10);
    }
}
