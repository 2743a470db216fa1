//! Robust linear optimization under interval uncertainty.
//!
//! Scenarios are sampled inside the coefficient bounds and solved one by
//! one. The population of solutions is then reduced with a clustering tree
//! whose nodes are re-solved against the stacked constraints of their
//! scenarios. Every candidate's feasibility probability is measured against
//! freshly drawn scenarios.

pub mod batch;
pub mod clustering;
pub mod coefficients;
pub mod config;
pub mod constraint_optimizer;
pub mod error;
pub mod pipeline;
pub mod probust_constraint;
pub mod problem;
pub mod report;
pub mod sampling;
pub mod scenario;
pub mod solution;
pub mod status;
pub mod tree;
pub mod tree_solver;

pub use config::PipelineConfig;
pub use error::{ProbustError, Result};
pub use pipeline::RobustBatch;
pub use problem::ProblemDefinition;
pub use report::BatchReport;
