//! Serializable run report.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::RobustBatch;
use crate::solution::{RecordId, SolutionRecord};
use crate::status::StatusEntry;
use crate::tree::{ClusterReductionTree, NodeId};

#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,
    pub scenario_ids: Vec<usize>,
    pub point_count: usize,
    pub wcss: f64,
    pub divisible: bool,
    pub solution: Option<RecordId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeSummary {
    pub clusters: usize,
    pub depth: usize,
    pub leaves: Vec<NodeId>,
    pub nodes: Vec<NodeSummary>,
}

impl TreeSummary {
    pub fn from_tree(tree: &ClusterReductionTree) -> Self {
        let nodes = tree
            .depth_first()
            .into_iter()
            .filter_map(|id| tree.node(id))
            .map(|node| NodeSummary {
                id: node.id,
                parent: node.parent,
                children: node.children.clone(),
                depth: node.depth,
                scenario_ids: node.scenario_ids.clone(),
                point_count: node.point_count(),
                wcss: node.wcss,
                divisible: node.divisible,
                solution: node.solution,
            })
            .collect();
        Self {
            clusters: tree.clusters(),
            depth: tree.depth(),
            leaves: tree.leaves(),
            nodes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: bool,
    pub status: Vec<StatusEntry>,
    pub scenarios: usize,
    pub records: Vec<SolutionRecord>,
    pub tree: Option<TreeSummary>,
    /// Records on the objective / feasibility-probability trade-off curve.
    pub pareto_frontier: Vec<RecordId>,
}

impl BatchReport {
    pub fn from_batch(batch: &RobustBatch) -> Self {
        let records: Vec<SolutionRecord> = batch.results().iter().cloned().collect();
        let pareto_frontier = pareto_frontier(&records);
        Self {
            started_at: batch.started_at(),
            finished_at: Utc::now(),
            succeeded: !batch.status().has_error(),
            status: batch.status().entries().to_vec(),
            scenarios: batch.scenarios().len(),
            tree: batch.tree().map(TreeSummary::from_tree),
            records,
            pareto_frontier,
        }
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Records that carry both an objective value and a feasibility
/// probability and are not dominated by another such record. Dominating
/// means an objective value no larger and a probability no smaller, with at
/// least one of the two strictly better. Sorted by objective value, then
/// record id; exact duplicates all stay on the frontier.
pub fn pareto_frontier(records: &[SolutionRecord]) -> Vec<RecordId> {
    let mut candidates: Vec<(RecordId, f64, f64)> = records
        .iter()
        .filter_map(|r| Some((r.id, r.objective_value()?, r.feasibility_probability?)))
        .collect();
    candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let dominates = |a: &(RecordId, f64, f64), b: &(RecordId, f64, f64)| {
        a.1 <= b.1 && a.2 >= b.2 && (a.1 < b.1 || a.2 > b.2)
    };
    candidates
        .iter()
        .filter(|&c| !candidates.iter().any(|other| dominates(other, c)))
        .map(|c| c.0)
        .collect()
}
