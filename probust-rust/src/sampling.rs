// src/sampling.rs

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};

/// Produces `count × dimensions` designs with entries in `[0, 1]` whose
/// columns are each stratified over the unit interval.
pub trait StratifiedSampler {
    fn sample(&mut self, dimensions: usize, count: usize) -> DMatrix<f64>;
}

/// Latin hypercube design.
///
/// For every column the unit interval is cut into `count` strata
/// `[i/count, (i+1)/count)`. One point is drawn uniformly inside each
/// stratum and the column is then shuffled independently of the others,
/// so each marginal covers its range evenly while the joint design stays
/// random.
pub struct LatinHypercube {
    rng: StdRng,
}

impl LatinHypercube {
    /// Seeded from system entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::new, Self::with_seed)
    }
}

impl Default for LatinHypercube {
    fn default() -> Self {
        Self::new()
    }
}

impl StratifiedSampler for LatinHypercube {
    fn sample(&mut self, dimensions: usize, count: usize) -> DMatrix<f64> {
        let mut design = DMatrix::zeros(count, dimensions);
        if count == 0 {
            return design;
        }
        let unit = Uniform::new(0.0, 1.0);
        let width = 1.0 / count as f64;
        let mut column = vec![0.0; count];
        for dim in 0..dimensions {
            for (i, value) in column.iter_mut().enumerate() {
                *value = ((i as f64 + unit.sample(&mut self.rng)) * width).min(1.0);
            }
            column.shuffle(&mut self.rng);
            design.column_mut(dim).copy_from_slice(&column);
        }
        design
    }
}
