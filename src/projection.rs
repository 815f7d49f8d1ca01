//! Windowed Gaussian random projections shared by LSH and Hypercube hashing.

use ndarray::{Array1, Array2, ArrayView1};
use ndarray_rand::rand_distr::{StandardNormal, Uniform};
use ndarray_rand::RandomExt;
use rand::Rng;

/// `count` hash functions `h_i(x) = floor((a_i · x + b_i) / w)` with
/// `a_i ~ N(0, 1)^dim` and `b_i ~ U[0, w)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomProjections {
    directions: Array2<f32>,
    offsets: Array1<f32>,
    w: f32,
}

impl RandomProjections {
    /// Draw `count` projections from `rng`. Directions are drawn before offsets.
    pub fn sample<R: Rng + ?Sized>(count: usize, dim: usize, w: f32, rng: &mut R) -> Self {
        let directions = Array2::random_using((count, dim), StandardNormal, rng);
        let offsets = Array1::random_using(count, Uniform::new(0.0f32, w), rng);
        Self {
            directions,
            offsets,
            w,
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// The bucket index of `x` under each projection, in projection order.
    pub fn cells(&self, x: &[f32]) -> Vec<i64> {
        let dots = self.directions.dot(&ArrayView1::from(x));
        dots.iter()
            .zip(self.offsets.iter())
            .map(|(dot, b)| ((dot + b) / self.w).floor() as i64)
            .collect()
    }
}
