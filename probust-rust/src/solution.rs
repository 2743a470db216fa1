//! Solved records and the append-only result history.

use serde::Serialize;

use crate::constraint_optimizer::{LpOutcome, OptimalPoint, SolveStatus};
use crate::tree::NodeId;

/// Stable identity of a record inside a [`ResultStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordId(pub usize);

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrigin {
    /// A single sampled scenario.
    Scenario(usize),
    /// The stacked re-solve of a tree node.
    Node(NodeId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolutionRecord {
    pub id: RecordId,
    pub origin: RecordOrigin,
    pub status: SolveStatus,
    /// Present iff `status` is optimal.
    pub point: Option<OptimalPoint>,
    /// Fraction of fresh scenarios this point satisfies. Set by the
    /// quality measure; `None` until then and for records without a point.
    pub feasibility_probability: Option<f64>,
}

impl SolutionRecord {
    pub fn is_optimal(&self) -> bool {
        self.status.is_optimal()
    }

    pub fn objective_value(&self) -> Option<f64> {
        self.point.as_ref().map(|p| p.objective_value)
    }

    /// `[objective] ++ residuals`, the record's position in outcome space.
    pub fn outcome_coordinates(&self) -> Option<Vec<f64>> {
        self.point.as_ref().map(|p| {
            std::iter::once(p.objective_value)
                .chain(p.residuals.iter().copied())
                .collect()
        })
    }
}

/// Append-only history shared by the batch solve and the tree solve.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ResultStore {
    records: Vec<SolutionRecord>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, origin: RecordOrigin, outcome: LpOutcome) -> RecordId {
        let id = RecordId(self.records.len());
        self.records.push(SolutionRecord {
            id,
            origin,
            status: outcome.status,
            point: outcome.point,
            feasibility_probability: None,
        });
        id
    }

    pub fn get(&self, id: RecordId) -> Option<&SolutionRecord> {
        self.records.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SolutionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records produced by single-scenario solves, in push order.
    pub fn scenario_records(&self) -> impl Iterator<Item = (usize, &SolutionRecord)> {
        self.records.iter().filter_map(|r| match r.origin {
            RecordOrigin::Scenario(index) => Some((index, r)),
            RecordOrigin::Node(_) => None,
        })
    }

    /// Records produced by tree-node re-solves, in push order.
    pub fn node_records(&self) -> impl Iterator<Item = (NodeId, &SolutionRecord)> {
        self.records.iter().filter_map(|r| match r.origin {
            RecordOrigin::Node(node) => Some((node, r)),
            RecordOrigin::Scenario(_) => None,
        })
    }

    /// The only mutation allowed after a record is pushed.
    pub(crate) fn set_feasibility_probability(&mut self, id: RecordId, probability: f64) {
        if let Some(record) = self.records.get_mut(id.0) {
            record.feasibility_probability = Some(probability);
        }
    }
}
