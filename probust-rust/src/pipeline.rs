//! End-to-end robust optimization batch.
//!
//! A [`RobustBatch`] owns everything one run produces: the status trail,
//! the validated coefficients, the training scenarios, the result history
//! and the cluster tree. Each stage checks the status first and refuses to
//! run (appending a "skipped" error) once anything upstream has failed.
//! Repeating an already finished solve stage is a no-op noted at info
//! severity.

use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::info;

use crate::batch::ScenarioSolveBatch;
use crate::clustering::KMeans;
use crate::coefficients::{validate_scenario_count, CoefficientModel, CoefficientSet, RawCount};
use crate::config::PipelineConfig;
use crate::constraint_optimizer::SimplexSolver;
use crate::probust_constraint::ProbustConstraint;
use crate::problem::ProblemDefinition;
use crate::sampling::{LatinHypercube, StratifiedSampler};
use crate::scenario::{Scenario, ScenarioGenerator};
use crate::solution::ResultStore;
use crate::status::{StatusCode, StatusLog};
use crate::tree::ClusterReductionTree;
use crate::tree_solver::TreeSolver;

pub struct RobustBatch {
    status: StatusLog,
    config: PipelineConfig,
    sampler: Box<dyn StratifiedSampler + Send>,
    solver: SimplexSolver,
    clusterer: KMeans,
    coefficients: Option<CoefficientSet>,
    scenarios: Vec<Scenario>,
    results: ResultStore,
    tree: Option<ClusterReductionTree>,
    started_at: DateTime<Utc>,
}

impl RobustBatch {
    /// Validates the definition and, when it is sound, draws the training
    /// scenarios. A definition without a scenario count uses
    /// `config.scenarios`.
    pub fn new(definition: &ProblemDefinition, config: PipelineConfig) -> Self {
        let sampler = LatinHypercube::from_optional_seed(config.seed);
        Self::with_sampler(definition, config, Box::new(sampler))
    }

    pub fn with_sampler(
        definition: &ProblemDefinition,
        config: PipelineConfig,
        mut sampler: Box<dyn StratifiedSampler + Send>,
    ) -> Self {
        let started_at = Utc::now();
        let model = CoefficientModel::validate(&definition.coefficients);
        let coefficients = model.coefficients().cloned();
        let mut status = model.status;

        let requested = definition
            .scenarios
            .or_else(|| i64::try_from(config.scenarios).ok().map(RawCount::Integer));
        let count = validate_scenario_count(&mut status, requested);

        let mut scenarios = Vec::new();
        let coefficients = match (coefficients, count) {
            (Some(set), Some(count)) if !status.has_error() => {
                status.ok(
                    StatusCode::BatchCreated,
                    "Optimization batch creation succeeded",
                );
                scenarios = ScenarioGenerator::generate(&set, count, sampler.as_mut());
                status.ok(
                    StatusCode::ScenariosGenerated,
                    format!("Generated {count} scenarios"),
                );
                Some(set)
            }
            _ => {
                status.error(
                    StatusCode::BatchCreationFailed,
                    "Optimization batch creation failed",
                );
                None
            }
        };

        info!(
            valid = !status.has_error(),
            scenarios = scenarios.len(),
            "optimization batch created"
        );
        Self {
            status,
            solver: SimplexSolver::new(config.lp.clone()),
            clusterer: KMeans::new(config.kmeans.clone()),
            config,
            sampler,
            coefficients,
            scenarios,
            results: ResultStore::new(),
            tree: None,
            started_at,
        }
    }

    /// Appends a skip entry and returns false when the batch cannot run
    /// `stage`.
    fn ready(&mut self, stage: &str) -> bool {
        if self.status.has_error() {
            self.status.error(
                StatusCode::StageSkipped,
                format!("{stage} skipped: batch status holds an error"),
            );
            return false;
        }
        true
    }

    /// Solves every training scenario on its own. Runs at most once per
    /// batch; a repeated call leaves the history untouched.
    pub fn solve(&mut self) {
        if !self.ready("Solve") {
            return;
        }
        if self.results.scenario_records().next().is_some() {
            self.status.info(
                StatusCode::StageSkipped,
                "Solve skipped: scenarios already solved",
            );
            return;
        }
        let Some(coefficients) = self.coefficients.as_ref() else {
            return;
        };
        let start = Instant::now();
        match ScenarioSolveBatch::solve_all(
            &coefficients.objective,
            &self.scenarios,
            &self.solver,
            &mut self.results,
            self.config.parallel,
        ) {
            Ok(ids) => {
                let optimal = ids
                    .iter()
                    .filter_map(|&id| self.results.get(id))
                    .filter(|r| r.is_optimal())
                    .count();
                self.status.ok(
                    StatusCode::ScenariosSolved,
                    format!("Solved {} scenarios, {optimal} optimal", ids.len()),
                );
                if optimal < ids.len() {
                    self.status.info(
                        StatusCode::ScenariosSolved,
                        format!(
                            "{} scenarios without an optimal solution are left out of clustering",
                            ids.len() - optimal
                        ),
                    );
                }
            }
            Err(e) => self
                .status
                .error(StatusCode::StageFailed, format!("Solve failed: {e}")),
        }
        info!(stage = "solve", elapsed_ms = start.elapsed().as_millis() as u64, "stage finished");
    }

    /// Seeds the reduction tree from the optimal scenario records and
    /// divides it until no node is divisible.
    pub fn cluster_and_select(&mut self) {
        if !self.ready("Clustering") {
            return;
        }
        if self.results.scenario_records().next().is_none() {
            self.status.error(
                StatusCode::StageSkipped,
                "Clustering skipped: no solved scenarios",
            );
            return;
        }
        let start = Instant::now();
        let built = ClusterReductionTree::build(&self.results, self.config.clusters, &self.clusterer)
            .and_then(|mut tree| {
                let rounds = tree.divide(&self.clusterer, self.config.parallel)?;
                Ok((tree, rounds))
            });
        match built {
            Ok((tree, rounds)) => {
                self.status.ok(
                    StatusCode::TreeBuilt,
                    format!(
                        "Built cluster tree: {} nodes, {} leaves, {rounds} division rounds",
                        tree.len(),
                        tree.leaves().len()
                    ),
                );
                self.tree = Some(tree);
            }
            Err(e) => self
                .status
                .error(StatusCode::StageFailed, format!("Clustering failed: {e}")),
        }
        info!(stage = "cluster", elapsed_ms = start.elapsed().as_millis() as u64, "stage finished");
    }

    /// Re-solves every tree node against the stacked constraints of its
    /// scenarios.
    pub fn solve_cluster_tree(&mut self) {
        if !self.ready("Tree solve") {
            return;
        }
        let (Some(tree), Some(coefficients)) = (self.tree.as_mut(), self.coefficients.as_ref())
        else {
            self.status.error(
                StatusCode::StageSkipped,
                "Tree solve skipped: no cluster tree",
            );
            return;
        };
        if tree.nodes().any(|n| n.solution.is_some()) {
            self.status.info(
                StatusCode::StageSkipped,
                "Tree solve skipped: tree already solved",
            );
            return;
        }
        let start = Instant::now();
        match TreeSolver::solve_tree(
            tree,
            &self.scenarios,
            &coefficients.objective,
            &self.solver,
            &mut self.results,
            self.config.parallel,
        ) {
            Ok(()) => {
                let nodes = tree.len();
                self.status
                    .ok(StatusCode::TreeSolved, format!("Solved {nodes} tree nodes"));
            }
            Err(e) => self
                .status
                .error(StatusCode::StageFailed, format!("Tree solve failed: {e}")),
        }
        info!(stage = "tree_solve", elapsed_ms = start.elapsed().as_millis() as u64, "stage finished");
    }

    /// Estimates the feasibility probability of every record with a decision
    /// against `fresh` newly drawn scenarios.
    pub fn apply_quality_measure(&mut self, fresh: usize) {
        if !self.ready("Quality measure") {
            return;
        }
        if fresh == 0 {
            self.status.error(
                StatusCode::FreshScenarioCountInvalid,
                "Undefined number of fresh scenarios",
            );
            return;
        }
        let Some(coefficients) = self.coefficients.as_ref() else {
            return;
        };
        let start = Instant::now();
        let measured = ProbustConstraint::draw(
            coefficients,
            fresh,
            self.sampler.as_mut(),
            self.config.feasibility_tol,
        )
        .and_then(|check| check.evaluate(&mut self.results, self.config.parallel));
        match measured {
            Ok(records) => self.status.ok(
                StatusCode::QualityMeasured,
                format!("Measured {records} records against {fresh} fresh scenarios"),
            ),
            Err(e) => self
                .status
                .error(StatusCode::StageFailed, format!("Quality measure failed: {e}")),
        }
        info!(stage = "quality", elapsed_ms = start.elapsed().as_millis() as u64, "stage finished");
    }

    /// All stages in order, with `config.fresh_scenarios` for the quality
    /// measure.
    pub fn run(&mut self) {
        self.solve();
        self.cluster_and_select();
        self.solve_cluster_tree();
        self.apply_quality_measure(self.config.fresh_scenarios);
    }

    pub fn status(&self) -> &StatusLog {
        &self.status
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn coefficients(&self) -> Option<&CoefficientSet> {
        self.coefficients.as_ref()
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn tree(&self) -> Option<&ClusterReductionTree> {
        self.tree.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
