//! Pipeline configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config
//! file. The binary overrides individual fields from the command line.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

pub const DEFAULT_SCENARIOS: usize = 100;
pub const DEFAULT_FRESH_SCENARIOS: usize = 100;
pub const DEFAULT_CLUSTERS: usize = 3;

/// Options for the simplex solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LpOptions {
    /// Pivot budget across both phases.
    pub max_iter: usize,
    /// Pivot and feasibility tolerance.
    pub tol: f64,
}

impl Default for LpOptions {
    fn default() -> Self {
        Self {
            max_iter: 50_000,
            tol: 1e-9,
        }
    }
}

/// Options for k-means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansOptions {
    pub max_iter: usize,
    /// Convergence tolerance on total centroid movement (squared).
    pub tol: f64,
    /// Number of restarts; the lowest inertia wins.
    pub n_init: usize,
    pub seed: u64,
}

impl Default for KMeansOptions {
    fn default() -> Self {
        Self {
            max_iter: 300,
            tol: 1e-4,
            n_init: 10,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Scenario count used when the problem definition does not carry one.
    pub scenarios: usize,
    /// Size of the independent sample used by the quality measure.
    pub fresh_scenarios: usize,
    /// Cluster count `K` used at every division.
    pub clusters: usize,
    /// Seed for the stratified sampler; entropy when absent.
    pub seed: Option<u64>,
    /// Fan scenario solves, node re-solves and quality checks out over rayon.
    pub parallel: bool,
    /// Residuals above this value count as violated constraints. Zero by
    /// default, so any positive residual is a violation.
    pub feasibility_tol: f64,
    pub lp: LpOptions,
    pub kmeans: KMeansOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scenarios: DEFAULT_SCENARIOS,
            fresh_scenarios: DEFAULT_FRESH_SCENARIOS,
            clusters: DEFAULT_CLUSTERS,
            seed: None,
            parallel: true,
            feasibility_tol: 0.0,
            lp: LpOptions::default(),
            kmeans: KMeansOptions::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}
