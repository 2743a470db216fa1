//! Per-scenario solve loop.

use nalgebra::DVector;
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

use crate::constraint_optimizer::{LinearProgram, LinearProgramAdapter, LpOutcome};
use crate::error::Result;
use crate::scenario::Scenario;
use crate::solution::{RecordId, RecordOrigin, ResultStore};

pub struct ScenarioSolveBatch;

impl ScenarioSolveBatch {
    /// Solves every scenario against the shared objective and appends one
    /// record per scenario to `results`, in scenario order. Non-optimal
    /// scenarios still get a record, carrying only their status.
    ///
    /// With `parallel` set the solves fan out over rayon; the collected
    /// outcomes keep scenario order, so the history is identical either way.
    pub fn solve_all<A>(
        objective: &DVector<f64>,
        scenarios: &[Scenario],
        adapter: &A,
        results: &mut ResultStore,
        parallel: bool,
    ) -> Result<Vec<RecordId>>
    where
        A: LinearProgramAdapter + Sync,
    {
        let start = Instant::now();
        let solve_one = |scenario: &Scenario| -> Result<LpOutcome> {
            let tic = Instant::now();
            let lp = LinearProgram::new(
                objective.clone(),
                scenario.constraint.clone(),
                scenario.rhs.clone(),
            )?;
            let outcome = adapter.solve(&lp);
            debug!(
                scenario = scenario.index,
                status = ?outcome.status,
                elapsed_us = tic.elapsed().as_micros() as u64,
                "scenario solved"
            );
            Ok(outcome)
        };

        let outcomes: Vec<LpOutcome> = if parallel {
            scenarios.par_iter().map(solve_one).collect::<Result<_>>()?
        } else {
            scenarios.iter().map(solve_one).collect::<Result<_>>()?
        };

        let ids: Vec<RecordId> = scenarios
            .iter()
            .zip(outcomes)
            .map(|(scenario, outcome)| results.push(RecordOrigin::Scenario(scenario.index), outcome))
            .collect();

        let optimal = ids
            .iter()
            .filter_map(|&id| results.get(id))
            .filter(|r| r.is_optimal())
            .count();
        info!(
            scenarios = scenarios.len(),
            optimal,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "scenario batch solved"
        );
        Ok(ids)
    }
}
