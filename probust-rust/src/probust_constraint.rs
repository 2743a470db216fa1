// src/probust_constraint.rs

use nalgebra::DVector;
use rayon::prelude::*;
use std::time::Instant;
use tracing::info;

use crate::coefficients::CoefficientSet;
use crate::error::{ProbustError, Result};
use crate::sampling::StratifiedSampler;
use crate::scenario::{Scenario, ScenarioGenerator};
use crate::solution::{RecordId, ResultStore};

/// Out-of-sample feasibility check for candidate decisions.
///
/// A decision x ≥ 0 is kept against a fresh set of N scenarios (Aₖ, bₖ),
/// k = 1, …, N, drawn from the same bounds as the training scenarios but
/// from an independent stratified design. Its feasibility probability is
/// estimated as
///    φ(x) = #{ k | max_i (Aₖ·x − bₖ)ᵢ ≤ tol } / N,
/// so φ(x) ∈ [0, 1], with tol = 0 giving the strict reading Aₖ·x ≤ bₖ.
pub struct ProbustConstraint {
    /// Fresh scenarios, never used for training.
    pub scenarios: Vec<Scenario>,
    /// Largest residual still counted as satisfied.
    pub feasibility_tol: f64,
}

impl ProbustConstraint {
    /// Wraps an existing fresh scenario set. The set must not be empty.
    pub fn new(scenarios: Vec<Scenario>, feasibility_tol: f64) -> Result<Self> {
        if scenarios.is_empty() {
            return Err(ProbustError::StructuralViolation(
                "feasibility probability needs at least one fresh scenario".to_string(),
            ));
        }
        Ok(ProbustConstraint {
            scenarios,
            feasibility_tol,
        })
    }

    /// Draws `fresh` new scenarios inside `bounds`.
    pub fn draw(
        bounds: &CoefficientSet,
        fresh: usize,
        sampler: &mut dyn StratifiedSampler,
        feasibility_tol: f64,
    ) -> Result<Self> {
        Self::new(ScenarioGenerator::generate(bounds, fresh, sampler), feasibility_tol)
    }

    /// Evaluates φ(x) for one decision vector.
    ///
    /// Each fresh scenario counts as a success when no residual of
    /// Aₖ·x − bₖ exceeds the tolerance.
    pub fn evaluate_probability(&self, decision: &[f64]) -> Result<f64> {
        let x = DVector::from_column_slice(decision);
        let mut success_count = 0;
        for scenario in &self.scenarios {
            if scenario.constraint.ncols() != x.len() {
                return Err(ProbustError::Dimension {
                    context: "decision length".to_string(),
                    expected: scenario.constraint.ncols(),
                    found: x.len(),
                });
            }
            let residuals = &scenario.constraint * &x - &scenario.rhs;
            if residuals.iter().all(|&r| r <= self.feasibility_tol) {
                success_count += 1;
            }
        }
        Ok(success_count as f64 / self.scenarios.len() as f64)
    }

    /// Sets the feasibility probability of every record that carries a
    /// decision; records without one are left untouched. Returns how many
    /// records were measured.
    pub fn evaluate(&self, results: &mut ResultStore, parallel: bool) -> Result<usize> {
        let start = Instant::now();
        let candidates: Vec<(RecordId, &[f64])> = results
            .iter()
            .filter_map(|r| r.point.as_ref().map(|p| (r.id, p.variables.as_slice())))
            .collect();

        let measure = |&(id, decision): &(RecordId, &[f64])| -> Result<(RecordId, f64)> {
            Ok((id, self.evaluate_probability(decision)?))
        };
        let measured: Vec<(RecordId, f64)> = if parallel {
            candidates.par_iter().map(measure).collect::<Result<_>>()?
        } else {
            candidates.iter().map(measure).collect::<Result<_>>()?
        };

        for &(id, probability) in &measured {
            results.set_feasibility_probability(id, probability);
        }
        info!(
            records = measured.len(),
            fresh = self.scenarios.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "feasibility probabilities measured"
        );
        Ok(measured.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::constraint_optimizer::{LpOutcome, OptimalPoint, SolveStatus};
    use crate::sampling::LatinHypercube;
    use crate::solution::RecordOrigin;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use proptest::prelude::*;

    /// x ≤ b with b ∈ [1, 3].
    fn bounds() -> CoefficientSet {
        CoefficientSet {
            objective: DVector::from_vec(vec![-1.0]),
            lb_constraint: DMatrix::from_element(1, 1, 1.0),
            ub_constraint: DMatrix::from_element(1, 1, 1.0),
            lb_rhs: DVector::from_vec(vec![1.0]),
            ub_rhs: DVector::from_vec(vec![3.0]),
        }
    }

    fn default_tol() -> f64 {
        PipelineConfig::default().feasibility_tol
    }

    fn push_decision(store: &mut ResultStore, x: f64) -> RecordId {
        store.push(
            RecordOrigin::Scenario(store.len()),
            LpOutcome {
                status: SolveStatus::Optimal,
                point: Some(OptimalPoint {
                    variables: vec![x],
                    objective_value: -x,
                    residuals: vec![0.0],
                }),
            },
        )
    }

    #[test]
    fn test_probability_extremes() {
        let mut sampler = LatinHypercube::with_seed(11);
        let check = ProbustConstraint::draw(&bounds(), 200, &mut sampler, default_tol()).unwrap();
        // below every rhs
        assert_eq!(check.evaluate_probability(&[0.5]).unwrap(), 1.0);
        // above every rhs
        assert_eq!(check.evaluate_probability(&[3.5]).unwrap(), 0.0);
        // stratified rhs: half of the design lies above 2
        assert_relative_eq!(check.evaluate_probability(&[2.0]).unwrap(), 0.5, epsilon = 1e-2);
    }

    #[test]
    fn test_tight_bounds_give_certainty() {
        let mut tight = bounds();
        tight.ub_rhs = tight.lb_rhs.clone();
        let mut sampler = LatinHypercube::with_seed(3);
        let check = ProbustConstraint::draw(&tight, 100, &mut sampler, default_tol()).unwrap();
        // the training optimum sits exactly on the only possible rhs
        assert_eq!(check.evaluate_probability(&[1.0]).unwrap(), 1.0);
    }

    #[test]
    fn test_strict_tolerance() {
        let scenarios = vec![Scenario {
            index: 0,
            constraint: DMatrix::from_element(1, 1, 1.0),
            rhs: DVector::from_vec(vec![1.0]),
        }];
        let strict = ProbustConstraint::new(scenarios.clone(), 0.0).unwrap();
        assert_eq!(strict.evaluate_probability(&[1.0]).unwrap(), 1.0);
        assert_eq!(strict.evaluate_probability(&[1.0 + 1e-12]).unwrap(), 0.0);
        let loose = ProbustConstraint::new(scenarios, 1e-9).unwrap();
        assert_eq!(loose.evaluate_probability(&[1.0 + 1e-12]).unwrap(), 1.0);
    }

    #[test]
    fn test_default_tolerance_is_strict() {
        let scenarios = vec![Scenario {
            index: 0,
            constraint: DMatrix::from_element(1, 1, 1.0),
            rhs: DVector::from_vec(vec![1.0]),
        }];
        let check = ProbustConstraint::new(scenarios, default_tol()).unwrap();
        assert_eq!(check.evaluate_probability(&[1.0]).unwrap(), 1.0);
        // residual of 5e-10
        assert_eq!(check.evaluate_probability(&[1.0 + 5e-10]).unwrap(), 0.0);
    }

    #[test]
    fn test_empty_fresh_set_rejected() {
        assert!(ProbustConstraint::new(Vec::new(), 0.0).is_err());
    }

    #[test]
    fn test_wrong_decision_length() {
        let mut sampler = LatinHypercube::with_seed(1);
        let check = ProbustConstraint::draw(&bounds(), 5, &mut sampler, 0.0).unwrap();
        assert!(matches!(
            check.evaluate_probability(&[1.0, 2.0]),
            Err(ProbustError::Dimension { .. })
        ));
    }

    #[test]
    fn test_evaluate_skips_records_without_decision() {
        let mut store = ResultStore::new();
        let a = push_decision(&mut store, 0.0);
        let b = store.push(RecordOrigin::Scenario(1), LpOutcome::failed(SolveStatus::Infeasible));
        let c = push_decision(&mut store, 10.0);

        let mut sampler = LatinHypercube::with_seed(5);
        let check = ProbustConstraint::draw(&bounds(), 50, &mut sampler, default_tol()).unwrap();
        assert_eq!(check.evaluate(&mut store, true).unwrap(), 2);
        assert_eq!(store.get(a).unwrap().feasibility_probability, Some(1.0));
        assert_eq!(store.get(b).unwrap().feasibility_probability, None);
        assert_eq!(store.get(c).unwrap().feasibility_probability, Some(0.0));
    }

    proptest! {
        #[test]
        fn prop_probability_in_unit_interval(x in 0.0f64..5.0, seed in any::<u64>()) {
            let mut sampler = LatinHypercube::with_seed(seed);
            let check = ProbustConstraint::draw(&bounds(), 20, &mut sampler, default_tol()).unwrap();
            let p = check.evaluate_probability(&[x]).unwrap();
            prop_assert!((0.0..=1.0).contains(&p));
        }
    }
}
