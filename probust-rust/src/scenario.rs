//! Concrete realizations of the interval problem.
//!
//! Scenario `i` is `A_i = lbA + (ubA − lbA) ⊙ Δ_i` and
//! `b_i = lbb + (ubb − lbb) ⊙ δ_i`, where `Δ_i` (`m × n`) and `δ_i` (`m`)
//! are row `i` of two independent stratified designs reshaped row-major.

use nalgebra::{DMatrix, DVector};
use std::time::Instant;
use tracing::debug;

use crate::coefficients::CoefficientSet;
use crate::sampling::StratifiedSampler;

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub index: usize,
    pub constraint: DMatrix<f64>,
    pub rhs: DVector<f64>,
}

pub struct ScenarioGenerator;

impl ScenarioGenerator {
    /// Draws `count` scenarios inside the bounds. The constraint matrices
    /// and the rhs vectors come from separate designs of the same size.
    pub fn generate(
        bounds: &CoefficientSet,
        count: usize,
        sampler: &mut dyn StratifiedSampler,
    ) -> Vec<Scenario> {
        let (m, n) = bounds.lb_constraint.shape();

        let start = Instant::now();
        let constraint_design = sampler.sample(m * n, count);
        let rhs_design = sampler.sample(m, count);
        debug!(
            count,
            dimensions = m * n + m,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "stratified designs drawn"
        );

        let a_width = &bounds.ub_constraint - &bounds.lb_constraint;
        let b_width = &bounds.ub_rhs - &bounds.lb_rhs;

        (0..count)
            .map(|index| {
                let delta_a =
                    DMatrix::from_row_iterator(m, n, constraint_design.row(index).iter().copied());
                let delta_b = DVector::from_iterator(m, rhs_design.row(index).iter().copied());
                Scenario {
                    index,
                    constraint: &bounds.lb_constraint + a_width.component_mul(&delta_a),
                    rhs: &bounds.lb_rhs + b_width.component_mul(&delta_b),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::LatinHypercube;
    use proptest::prelude::*;

    fn bounds() -> CoefficientSet {
        CoefficientSet {
            objective: DVector::from_vec(vec![-3.0, -4.0]),
            lb_constraint: DMatrix::from_row_slice(
                5,
                2,
                &[1.0, 1.0, 1.0, 0.0, 0.0, 1.0, -1.0, 0.0, 0.0, -1.0],
            ),
            ub_constraint: DMatrix::from_row_slice(
                5,
                2,
                &[2.0, 2.0, 2.0, 1.0, 1.0, 2.0, -1.0, 0.0, 0.0, -1.0],
            ),
            lb_rhs: DVector::from_vec(vec![2.0, 1.0, 2.0, 0.0, 0.0]),
            ub_rhs: DVector::from_vec(vec![3.0, 2.0, 3.0, 0.0, 0.0]),
        }
    }

    #[test]
    fn test_count_and_indices() {
        let mut sampler = LatinHypercube::with_seed(1);
        let scenarios = ScenarioGenerator::generate(&bounds(), 10, &mut sampler);
        assert_eq!(scenarios.len(), 10);
        for (i, s) in scenarios.iter().enumerate() {
            assert_eq!(s.index, i);
            assert_eq!(s.constraint.shape(), (5, 2));
            assert_eq!(s.rhs.len(), 5);
        }
    }

    #[test]
    fn test_degenerate_intervals_are_fixed() {
        let bounds = bounds();
        let mut sampler = LatinHypercube::with_seed(5);
        let scenarios = ScenarioGenerator::generate(&bounds, 25, &mut sampler);
        for s in &scenarios {
            assert_eq!(s.constraint[(3, 0)], -1.0);
            assert_eq!(s.constraint[(3, 1)], 0.0);
            assert_eq!(s.constraint[(4, 1)], -1.0);
            assert_eq!(s.rhs[3], 0.0);
            assert_eq!(s.rhs[4], 0.0);
        }
    }

    #[test]
    fn test_reshape_is_row_major() {
        struct Ramp;
        impl StratifiedSampler for Ramp {
            fn sample(&mut self, dimensions: usize, count: usize) -> DMatrix<f64> {
                DMatrix::from_fn(count, dimensions, |_, c| c as f64 / dimensions as f64)
            }
        }

        let bounds = CoefficientSet {
            objective: DVector::from_vec(vec![1.0, 1.0, 1.0]),
            lb_constraint: DMatrix::zeros(2, 3),
            ub_constraint: DMatrix::from_element(2, 3, 6.0),
            lb_rhs: DVector::zeros(2),
            ub_rhs: DVector::from_element(2, 2.0),
        };
        let scenarios = ScenarioGenerator::generate(&bounds, 1, &mut Ramp);
        let a = &scenarios[0].constraint;
        assert_eq!(a[(0, 0)], 0.0);
        assert_eq!(a[(0, 1)], 1.0);
        assert_eq!(a[(0, 2)], 2.0);
        assert_eq!(a[(1, 0)], 3.0);
        assert_eq!(scenarios[0].rhs[1], 1.0);
    }

    proptest! {
        #[test]
        fn prop_entries_stay_inside_bounds(seed in any::<u64>(), count in 1usize..40) {
            let bounds = bounds();
            let mut sampler = LatinHypercube::with_seed(seed);
            let scenarios = ScenarioGenerator::generate(&bounds, count, &mut sampler);
            prop_assert_eq!(scenarios.len(), count);
            for s in &scenarios {
                for ((v, lo), hi) in s.constraint.iter().zip(bounds.lb_constraint.iter()).zip(bounds.ub_constraint.iter()) {
                    prop_assert!(*v >= *lo && *v <= *hi);
                }
                for ((v, lo), hi) in s.rhs.iter().zip(bounds.lb_rhs.iter()).zip(bounds.ub_rhs.iter()) {
                    prop_assert!(*v >= *lo && *v <= *hi);
                }
            }
        }
    }
}
