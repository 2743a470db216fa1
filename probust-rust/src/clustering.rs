//! Clustering primitive used by the reduction tree.
//!
//! Points are the rows of a `p × d` matrix. A fit returns one label per
//! point and the inertia (within-cluster sum of squared distances to the
//! assigned centroid), which is also how a node's WCSS is measured.

use nalgebra::{DMatrix, RowDVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, WeightedIndex};

use crate::config::KMeansOptions;
use crate::error::{ProbustError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterFit {
    /// Cluster index in `0..k` for every point.
    pub labels: Vec<usize>,
    pub inertia: f64,
}

impl ClusterFit {
    /// Positions of the points carrying `label`, in point order.
    pub fn members(&self, label: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(i, &l)| (l == label).then_some(i))
            .collect()
    }
}

pub trait ClusteringPrimitive {
    /// Partitions the rows of `points` into `k` clusters. Asking for more
    /// clusters than points, or for none, is a structural violation.
    fn fit(&self, points: &DMatrix<f64>, k: usize) -> Result<ClusterFit>;

    /// Single-cluster inertia of `points`.
    fn wcss(&self, points: &DMatrix<f64>) -> Result<f64> {
        Ok(self.fit(points, 1)?.inertia)
    }
}

/// Lloyd's k-means with k-means++ seeding and restarts.
///
/// Every call reseeds from `options.seed`, so a fit depends only on its
/// input, regardless of which thread runs it or what ran before.
#[derive(Debug, Clone, Default)]
pub struct KMeans {
    options: KMeansOptions,
}

impl KMeans {
    pub fn new(options: KMeansOptions) -> Self {
        Self { options }
    }

    fn single_run(&self, points: &DMatrix<f64>, k: usize, rng: &mut StdRng) -> ClusterFit {
        let tol = self.options.tol * mean_variance(points);
        let mut centroids = plus_plus_init(points, k, rng);

        for _ in 0..self.options.max_iter {
            let (labels, distances) = assign(points, &centroids);
            let updated = update_centroids(points, &labels, &distances, &centroids);
            let shift: f64 = (0..k)
                .map(|c| (updated.row(c) - centroids.row(c)).norm_squared())
                .sum();
            centroids = updated;
            if shift <= tol {
                break;
            }
        }

        let (labels, distances) = assign(points, &centroids);
        ClusterFit {
            labels,
            inertia: distances.iter().sum(),
        }
    }
}

impl ClusteringPrimitive for KMeans {
    fn fit(&self, points: &DMatrix<f64>, k: usize) -> Result<ClusterFit> {
        let p = points.nrows();
        if k == 0 || k > p {
            return Err(ProbustError::StructuralViolation(format!(
                "cannot fit {k} clusters over {p} points"
            )));
        }

        if k == 1 {
            let centroid = points.row_mean();
            let inertia = points
                .row_iter()
                .map(|row| (row - &centroid).norm_squared())
                .sum();
            return Ok(ClusterFit {
                labels: vec![0; p],
                inertia,
            });
        }

        let mut rng = StdRng::seed_from_u64(self.options.seed);
        let mut best = self.single_run(points, k, &mut rng);
        for _ in 1..self.options.n_init {
            let fit = self.single_run(points, k, &mut rng);
            if fit.inertia < best.inertia {
                best = fit;
            }
        }
        Ok(best)
    }
}

fn mean_variance(points: &DMatrix<f64>) -> f64 {
    if points.ncols() == 0 {
        return 0.0;
    }
    points.row_variance().mean()
}

/// k-means++: first centroid uniform, every further one drawn with
/// probability proportional to its squared distance from the nearest
/// centroid picked so far.
fn plus_plus_init(points: &DMatrix<f64>, k: usize, rng: &mut StdRng) -> DMatrix<f64> {
    let p = points.nrows();
    let mut centroids = DMatrix::zeros(k, points.ncols());
    let first = rng.gen_range(0..p);
    centroids.row_mut(0).copy_from(&points.row(first));

    let mut nearest: Vec<f64> = points
        .row_iter()
        .map(|row| (row - centroids.row(0)).norm_squared())
        .collect();

    for c in 1..k {
        let next = match WeightedIndex::new(&nearest) {
            Ok(weights) => weights.sample(rng),
            // Every point coincides with a centroid already.
            Err(_) => rng.gen_range(0..p),
        };
        centroids.row_mut(c).copy_from(&points.row(next));
        for (i, row) in points.row_iter().enumerate() {
            let d = (row - centroids.row(c)).norm_squared();
            if d < nearest[i] {
                nearest[i] = d;
            }
        }
    }
    centroids
}

/// Nearest centroid per point (lowest index on ties) and the squared
/// distance to it.
fn assign(points: &DMatrix<f64>, centroids: &DMatrix<f64>) -> (Vec<usize>, Vec<f64>) {
    points
        .row_iter()
        .map(|row| {
            let mut best = (0, f64::INFINITY);
            for (c, centroid) in centroids.row_iter().enumerate() {
                let d = (row - centroid).norm_squared();
                if d < best.1 {
                    best = (c, d);
                }
            }
            best
        })
        .unzip()
}

/// Moves each centroid to the mean of its points. A centroid that lost all
/// of its points is re-seeded on the point currently farthest from its own
/// centroid.
fn update_centroids(
    points: &DMatrix<f64>,
    labels: &[usize],
    distances: &[f64],
    previous: &DMatrix<f64>,
) -> DMatrix<f64> {
    let k = previous.nrows();
    let mut sums = DMatrix::zeros(k, points.ncols());
    let mut counts = vec![0usize; k];
    for (row, &label) in points.row_iter().zip(labels) {
        let mut target = sums.row_mut(label);
        target += row;
        counts[label] += 1;
    }

    let mut by_distance: Vec<usize> = (0..points.nrows()).collect();
    by_distance.sort_by(|&a, &b| distances[b].total_cmp(&distances[a]));
    let mut donors = by_distance.into_iter();

    let mut updated = previous.clone();
    for c in 0..k {
        if counts[c] > 0 {
            let mean: RowDVector<f64> = sums.row(c) / counts[c] as f64;
            updated.row_mut(c).copy_from(&mean);
        } else if let Some(donor) = donors.next() {
            updated.row_mut(c).copy_from(&points.row(donor));
        }
    }
    updated
}
