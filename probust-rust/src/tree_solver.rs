//! Stacked re-solve of every tree node.

use nalgebra::DVector;
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

use crate::constraint_optimizer::{LinearProgram, LinearProgramAdapter, LpOutcome};
use crate::error::{ProbustError, Result};
use crate::scenario::Scenario;
use crate::solution::{RecordOrigin, ResultStore};
use crate::tree::{ClusterReductionTree, NodeId};

pub struct TreeSolver;

impl TreeSolver {
    /// For each node, stacks the constraint blocks of all its scenarios into
    /// one program under the shared objective and solves it. The outcome is
    /// appended to `results` (in node id order) and linked from the node.
    ///
    /// `scenarios` is indexed by scenario index. The tree is only read while
    /// the programs are solved and annotated once all of them are done.
    pub fn solve_tree<A>(
        tree: &mut ClusterReductionTree,
        scenarios: &[Scenario],
        objective: &DVector<f64>,
        adapter: &A,
        results: &mut ResultStore,
        parallel: bool,
    ) -> Result<()>
    where
        A: LinearProgramAdapter + Sync,
    {
        let start = Instant::now();
        let ids: Vec<NodeId> = tree.nodes().map(|n| n.id).collect();

        let solve_node = |&id: &NodeId| -> Result<LpOutcome> {
            let node = tree.node(id).ok_or_else(|| {
                ProbustError::StructuralViolation(format!("unknown tree node {}", id.0))
            })?;
            if node.scenario_ids.is_empty() {
                return Err(ProbustError::StructuralViolation(format!(
                    "tree node {} has no scenarios",
                    id.0
                )));
            }
            let blocks = node
                .scenario_ids
                .iter()
                .map(|&i| {
                    scenarios
                        .get(i)
                        .map(|s| (&s.constraint, &s.rhs))
                        .ok_or_else(|| {
                            ProbustError::StructuralViolation(format!(
                                "tree node {} references missing scenario {i}",
                                id.0
                            ))
                        })
                })
                .collect::<Result<Vec<_>>>()?;

            let tic = Instant::now();
            let lp = LinearProgram::stack(objective, blocks)?;
            let outcome = adapter.solve(&lp);
            debug!(
                node = id.0,
                rows = lp.m(),
                status = ?outcome.status,
                elapsed_us = tic.elapsed().as_micros() as u64,
                "node solved"
            );
            Ok(outcome)
        };

        let outcomes: Vec<LpOutcome> = if parallel {
            ids.par_iter().map(solve_node).collect::<Result<_>>()?
        } else {
            ids.iter().map(solve_node).collect::<Result<_>>()?
        };

        let mut optimal = 0;
        for (id, outcome) in ids.iter().zip(outcomes) {
            if outcome.status.is_optimal() {
                optimal += 1;
            }
            let record = results.push(RecordOrigin::Node(*id), outcome);
            tree.set_solution(*id, record);
        }

        info!(
            nodes = ids.len(),
            optimal,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "cluster tree solved"
        );
        Ok(())
    }
}
