//! Product quantization of coarse residuals.
//!
//! A residual of dimension `D` is split into `M` contiguous sub-vectors of
//! `D / M` components. Each slot gets its own codebook of `2^nbits` codewords
//! trained by k-means, and a residual is stored as `M` one-byte codes.
//! Distances are computed asymmetrically (ADC) through a per-query lookup table.

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::config::PqParams;
use crate::distance::squared_l2;

/// Trained per-slot codebooks.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuantizer {
    sub_dim: usize,
    /// `codebooks[m][h]` is codeword `h` of slot `m`.
    codebooks: Vec<Vec<Vec<f32>>>,
}

/// Squared sub-distances from one query residual to every codeword, `M × 2^nbits`.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    table: Vec<Vec<f32>>,
}

impl LookupTable {
    /// Approximate distance to the point encoded by `codes`.
    #[inline]
    pub fn adc(&self, codes: &[u8]) -> f32 {
        codes
            .iter()
            .zip(&self.table)
            .map(|(&code, row)| row[code as usize])
            .sum::<f32>()
            .sqrt()
    }
}

impl ProductQuantizer {
    /// Train codebooks on `residuals`, all of dimension `dimension`.
    ///
    /// `params` must already be validated against `dimension`.
    pub fn train(residuals: &[Vec<f32>], dimension: usize, params: &PqParams, rng: &mut StdRng) -> Self {
        let sub_dim = dimension / params.m;
        let k = params.codebook_size();
        let codebooks = (0..params.m)
            .map(|slot| {
                let offset = slot * sub_dim;
                let training: Vec<&[f32]> = residuals
                    .iter()
                    .map(|r| &r[offset..offset + sub_dim])
                    .collect();
                let codebook = kmeans(&training, k, sub_dim, params.iterations, rng);
                debug!(slot, codewords = codebook.len(), "PQ codebook trained");
                codebook
            })
            .collect();
        Self { sub_dim, codebooks }
    }

    /// Number of sub-vector slots `M`.
    pub fn slots(&self) -> usize {
        self.codebooks.len()
    }

    pub fn sub_dimension(&self) -> usize {
        self.sub_dim
    }

    pub fn codebooks(&self) -> &[Vec<Vec<f32>>] {
        &self.codebooks
    }

    fn sub_vectors<'a>(&self, x: &'a [f32]) -> impl Iterator<Item = &'a [f32]> {
        x.chunks_exact(self.sub_dim.max(1))
    }

    /// Code of each sub-vector: the index of its nearest codeword (lowest on ties).
    pub fn encode(&self, residual: &[f32]) -> Vec<u8> {
        self.sub_vectors(residual)
            .zip(&self.codebooks)
            .map(|(sub, codebook)| {
                let mut best = 0usize;
                let mut best_dist = f32::INFINITY;
                for (h, codeword) in codebook.iter().enumerate() {
                    let d = squared_l2(sub, codeword);
                    if d < best_dist {
                        best_dist = d;
                        best = h;
                    }
                }
                best as u8
            })
            .collect()
    }

    /// Concatenate the codewords selected by `codes`.
    pub fn decode(&self, codes: &[u8]) -> Vec<f32> {
        codes
            .iter()
            .zip(&self.codebooks)
            .flat_map(|(&code, codebook)| codebook[code as usize].iter().copied())
            .collect()
    }

    pub fn lookup_table(&self, residual: &[f32]) -> LookupTable {
        let table = self
            .sub_vectors(residual)
            .zip(&self.codebooks)
            .map(|(sub, codebook)| codebook.iter().map(|c| squared_l2(sub, c)).collect())
            .collect();
        LookupTable { table }
    }
}

/// Squared-L2 k-means with k-means++ seeding and mean updates.
///
/// Stops early once no assignment changes. Empty clusters are reseeded from a
/// random training point. With fewer distinct points than `k`, the trained
/// centers are repeated cyclically to fill the codebook; with no points at all
/// the codebook is zero vectors.
fn kmeans(points: &[&[f32]], k: usize, dim: usize, iterations: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    if points.is_empty() {
        return vec![vec![0.0; dim]; k];
    }
    let mut centers = seed_plus_plus(points, k.min(points.len()), rng);
    let actual = centers.len();

    let mut assignment = vec![usize::MAX; points.len()];
    for _ in 0..iterations {
        let mut changed = false;
        for (slot, point) in assignment.iter_mut().zip(points) {
            let nearest = centers
                .iter()
                .enumerate()
                .map(|(c, center)| (c, squared_l2(point, center)))
                .fold((0usize, f32::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
                .0;
            if *slot != nearest {
                *slot = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![vec![0.0f64; dim]; actual];
        let mut counts = vec![0usize; actual];
        for (point, &c) in points.iter().zip(&assignment) {
            counts[c] += 1;
            for (acc, &x) in sums[c].iter_mut().zip(point.iter()) {
                *acc += x as f64;
            }
        }
        for (c, center) in centers.iter_mut().enumerate() {
            if counts[c] == 0 {
                *center = points[rng.gen_range(0..points.len())].to_vec();
                continue;
            }
            for (value, &sum) in center.iter_mut().zip(&sums[c]) {
                *value = (sum / counts[c] as f64) as f32;
            }
        }
    }

    let trained = centers.len();
    for i in trained..k {
        let repeat = centers[i % trained].clone();
        centers.push(repeat);
    }
    centers
}

/// k-means++ seeding over squared distances. May return fewer than `k`
/// centers when the remaining points coincide with chosen ones.
fn seed_plus_plus(points: &[&[f32]], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let mut centers = vec![points[rng.gen_range(0..points.len())].to_vec()];
    let mut nearest = vec![f64::INFINITY; points.len()];
    while centers.len() < k {
        let newest = &centers[centers.len() - 1];
        let mut total = 0.0f64;
        for (slot, point) in nearest.iter_mut().zip(points) {
            *slot = slot.min(squared_l2(point, newest) as f64);
            total += *slot;
        }
        if total == 0.0 {
            break;
        }
        let target = rng.gen_range(0.0..total);
        let mut cumulative = 0.0;
        let mut picked = points.len() - 1;
        for (i, &d) in nearest.iter().enumerate() {
            cumulative += d;
            if cumulative > target {
                picked = i;
                break;
            }
        }
        centers.push(points[picked].to_vec());
    }
    centers
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    fn params(m: usize, nbits: usize) -> PqParams {
        PqParams {
            m,
            nbits,
            iterations: 25,
        }
    }

    fn grid() -> Vec<Vec<f32>> {
        let mut out = Vec::new();
        for a in 0..4 {
            for b in 0..4 {
                out.push(vec![a as f32, a as f32 + 0.1, b as f32 * 2.0, b as f32 * 2.0 - 0.1]);
            }
        }
        out
    }

    #[test]
    fn test_codebook_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let pq = ProductQuantizer::train(&grid(), 4, &params(2, 3), &mut rng);
        assert_eq!(pq.slots(), 2);
        assert_eq!(pq.sub_dimension(), 2);
        for codebook in pq.codebooks() {
            assert_eq!(codebook.len(), 8);
            assert!(codebook.iter().all(|c| c.len() == 2));
        }
    }

    #[test]
    fn test_exact_codes_when_codebook_covers_data() {
        // Four distinct values per slot and four codewords: quantization is lossless.
        let data = grid();
        let mut rng = StdRng::seed_from_u64(2);
        let pq = ProductQuantizer::train(&data, 4, &params(2, 2), &mut rng);
        for x in &data {
            let codes = pq.encode(x);
            assert_eq!(codes.len(), 2);
            assert!(codes.iter().all(|&c| c < 4));
            let decoded = pq.decode(&codes);
            for (a, b) in decoded.iter().zip(x) {
                assert_relative_eq!(*a, *b, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_adc_matches_decoded_distance() {
        let data = grid();
        let mut rng = StdRng::seed_from_u64(3);
        let pq = ProductQuantizer::train(&data, 4, &params(2, 1), &mut rng);

        let query = [0.5, 0.7, 3.0, 2.2];
        let table = pq.lookup_table(&query);
        for x in &data {
            let codes = pq.encode(x);
            let expected = squared_l2(&query, &pq.decode(&codes)).sqrt();
            assert_relative_eq!(table.adc(&codes), expected, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_small_training_set_repeats_centers() {
        let training = vec![vec![1.0, 1.0], vec![3.0, 3.0]];
        let mut rng = StdRng::seed_from_u64(4);
        let pq = ProductQuantizer::train(&training, 2, &params(1, 2), &mut rng);
        let codebook = &pq.codebooks()[0];
        assert_eq!(codebook.len(), 4);
        assert_eq!(codebook[2], codebook[0]);
        assert_eq!(codebook[3], codebook[1]);
    }

    #[test]
    fn test_empty_training_set_gives_zero_codebooks() {
        let mut rng = StdRng::seed_from_u64(5);
        let pq = ProductQuantizer::train(&[], 4, &params(2, 1), &mut rng);
        assert!(pq.codebooks().iter().flatten().flatten().all(|&x| x == 0.0));
    }
}
