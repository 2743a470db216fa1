//! Cluster reduction tree.
//!
//! The root holds every scenario that solved to optimality, positioned in
//! outcome space (objective value followed by the constraint residuals).
//! Division rounds then split each divisible node into `K` groups with the
//! clustering primitive. Of the children created by one division only two
//! may keep refining: the one with the most points and the one with the
//! largest WCSS (possibly the same child). Children with `K` points or fewer
//! are leaves from the start. Division stops once no node is divisible.
//!
//! Nodes live in an arena and are never removed; a [`NodeId`] is the node's
//! position in that arena.

use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

use crate::clustering::ClusteringPrimitive;
use crate::error::{ProbustError, Result};
use crate::solution::{RecordId, ResultStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
pub struct ClusterNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,
    /// Indices of the scenarios assigned to this node.
    pub scenario_ids: Vec<usize>,
    /// Outcome-space coordinates, one row per entry of `scenario_ids`.
    pub coordinates: DMatrix<f64>,
    pub divisible: bool,
    pub wcss: f64,
    /// The node's stacked re-solve, once the tree solver has run.
    pub solution: Option<RecordId>,
}

impl ClusterNode {
    pub fn point_count(&self) -> usize {
        self.scenario_ids.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A child produced by one division, before it is attached to the tree.
#[derive(Debug, Clone)]
pub(crate) struct Partition {
    pub scenario_ids: Vec<usize>,
    pub coordinates: DMatrix<f64>,
    pub wcss: f64,
    pub divisible: bool,
}

#[derive(Debug, Clone)]
pub struct ClusterReductionTree {
    nodes: Vec<ClusterNode>,
    root: NodeId,
    clusters: usize,
}

impl ClusterReductionTree {
    /// Seeds the root from every optimal single-scenario record in
    /// `results`.
    pub fn build<C>(results: &ResultStore, clusters: usize, clusterer: &C) -> Result<Self>
    where
        C: ClusteringPrimitive,
    {
        if clusters == 0 {
            return Err(ProbustError::StructuralViolation(
                "cluster count must be at least 1".to_string(),
            ));
        }

        let mut scenario_ids = Vec::new();
        let mut rows = Vec::new();
        for (index, record) in results.scenario_records() {
            if let Some(coordinates) = record.outcome_coordinates() {
                scenario_ids.push(index);
                rows.push(coordinates);
            }
        }
        if scenario_ids.is_empty() {
            return Err(ProbustError::StructuralViolation(
                "no optimal scenario to seed the root".to_string(),
            ));
        }

        let dims = rows[0].len();
        let coordinates =
            DMatrix::from_row_iterator(rows.len(), dims, rows.iter().flatten().copied());
        let wcss = clusterer.wcss(&coordinates)?;
        let divisible = scenario_ids.len() > clusters;

        info!(points = scenario_ids.len(), dims, wcss, "cluster tree seeded");
        Ok(Self {
            nodes: vec![ClusterNode {
                id: NodeId(0),
                parent: None,
                children: Vec::new(),
                depth: 0,
                scenario_ids,
                coordinates,
                divisible,
                wcss,
                solution: None,
            }],
            root: NodeId(0),
            clusters,
        })
    }

    /// Runs division rounds until no node is divisible. Returns the number
    /// of rounds.
    ///
    /// A round partitions every node that is divisible when the round
    /// starts; the partitions are independent, so with `parallel` set they
    /// run on rayon. Children are attached afterwards in parent order, which
    /// keeps node ids identical between sequential and parallel runs.
    pub fn divide<C>(&mut self, clusterer: &C, parallel: bool) -> Result<usize>
    where
        C: ClusteringPrimitive + Sync,
    {
        let mut rounds = 0;
        loop {
            let frontier = self.divisible_nodes();
            if frontier.is_empty() {
                break;
            }
            let start = Instant::now();

            let partitions: Vec<Vec<Partition>> = if parallel {
                frontier
                    .par_iter()
                    .map(|&id| self.partition(id, clusterer))
                    .collect::<Result<_>>()?
            } else {
                frontier
                    .iter()
                    .map(|&id| self.partition(id, clusterer))
                    .collect::<Result<_>>()?
            };

            let before = self.nodes.len();
            for (&parent, children) in frontier.iter().zip(partitions) {
                self.attach(parent, children);
            }
            rounds += 1;

            info!(
                round = rounds,
                divided = frontier.len(),
                created = self.nodes.len() - before,
                next = self.divisible_nodes().len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "division round finished"
            );
        }
        Ok(rounds)
    }

    fn partition<C>(&self, id: NodeId, clusterer: &C) -> Result<Vec<Partition>>
    where
        C: ClusteringPrimitive,
    {
        let node = &self.nodes[id.0];
        let fit = clusterer.fit(&node.coordinates, self.clusters)?;

        let mut children = Vec::with_capacity(self.clusters);
        for label in 0..self.clusters {
            let members = fit.members(label);
            if members.is_empty() {
                continue;
            }
            let coordinates = node.coordinates.select_rows(members.iter());
            let wcss = clusterer.wcss(&coordinates)?;
            let count = members.len();
            children.push(Partition {
                scenario_ids: members.iter().map(|&i| node.scenario_ids[i]).collect(),
                coordinates,
                wcss,
                // A child that did not shrink (all points landed in one
                // group) would be divided forever.
                divisible: count > self.clusters && count < node.point_count(),
            });
        }
        close_nodes(&mut children);

        debug!(
            node = id.0,
            points = node.point_count(),
            children = children.len(),
            divisible = children.iter().filter(|c| c.divisible).count(),
            "node partitioned"
        );
        Ok(children)
    }

    fn attach(&mut self, parent: NodeId, children: Vec<Partition>) {
        let depth = self.nodes[parent.0].depth + 1;
        for child in children {
            let id = NodeId(self.nodes.len());
            self.nodes.push(ClusterNode {
                id,
                parent: Some(parent),
                children: Vec::new(),
                depth,
                scenario_ids: child.scenario_ids,
                coordinates: child.coordinates,
                divisible: child.divisible,
                wcss: child.wcss,
                solution: None,
            });
            self.nodes[parent.0].children.push(id);
        }
        self.nodes[parent.0].divisible = false;
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn clusters(&self) -> usize {
        self.clusters
    }

    pub fn node(&self, id: NodeId) -> Option<&ClusterNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ClusterNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map_or(&[][..], |n| n.children.as_slice())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn divisible_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.divisible)
            .map(|n| n.id)
            .collect()
    }

    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.id)
            .collect()
    }

    /// Deepest level reached; the root is level 0.
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Pre-order walk from the root down to the leaves, children visited in
    /// creation order.
    pub fn depth_first(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    pub(crate) fn set_solution(&mut self, id: NodeId, record: RecordId) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.solution = Some(record);
        }
    }
}

/// Among freshly created siblings, only the one with strictly the most
/// points and the one with strictly the largest WCSS may stay divisible.
/// Ties keep the first sibling; both maxima start from zero. The rule only
/// clears flags, so a sibling already marked as a leaf stays one.
pub(crate) fn close_nodes(children: &mut [Partition]) {
    let mut most_points: Option<usize> = None;
    let mut best_points = 0;
    let mut most_spread: Option<usize> = None;
    let mut best_wcss = 0.0;

    for (i, child) in children.iter().enumerate() {
        if child.scenario_ids.len() > best_points {
            best_points = child.scenario_ids.len();
            most_points = Some(i);
        }
        if child.wcss > best_wcss {
            best_wcss = child.wcss;
            most_spread = Some(i);
        }
    }

    for (i, child) in children.iter_mut().enumerate() {
        if Some(i) != most_points && Some(i) != most_spread {
            child.divisible = false;
        }
    }
}
