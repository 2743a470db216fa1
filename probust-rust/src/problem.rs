//! Serialized problem definition: the five coefficient tables plus the
//! requested number of scenarios, read from a JSON file or a REST endpoint.
//!
//! ```json
//! {
//!   "objective": [-3, -4],
//!   "lb_constraint": [[1, 1], [1, 0], [0, 1], [-1, 0], [0, -1]],
//!   "ub_constraint": [[2, 2], [2, 1], [1, 2], [-1, 0], [0, -1]],
//!   "lb_rhs": [2, 1, 2, 0, 0],
//!   "ub_rhs": [3, 2, 3, 0, 0],
//!   "scenarios": 10
//! }
//! ```
//!
//! Nothing is validated here; a definition with missing or malformed parts
//! still loads and is reported on by the batch status.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::coefficients::{CoefficientInput, RawCount};
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemDefinition {
    #[serde(flatten)]
    pub coefficients: CoefficientInput,
    /// Number of training scenarios. Falls back to the configured default
    /// when absent.
    #[serde(default)]
    pub scenarios: Option<RawCount>,
}

impl ProblemDefinition {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// GETs the definition from a REST endpoint serving the JSON layout
    /// above.
    pub fn fetch(client: &Client, url: &str) -> Result<Self> {
        let definition: ProblemDefinition = client.get(url).send()?.error_for_status()?.json()?;
        info!(url, "problem definition fetched");
        Ok(definition)
    }

    /// Loads from `source`, treating `http://` and `https://` prefixes as
    /// URLs and anything else as a file path.
    pub fn load(source: &str) -> Result<Self> {
        if source.starts_with("http://") || source.starts_with("https://") {
            Self::fetch(&Client::new(), source)
        } else {
            Self::from_file(source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::RawTable;

    #[test]
    fn test_parse_full_definition() {
        let raw = r#"{
            "objective": [-3, -4],
            "lb_constraint": [[1, 1], [1, 0], [0, 1], [-1, 0], [0, -1]],
            "ub_constraint": [[2, 2], [2, 1], [1, 2], [-1, 0], [0, -1]],
            "lb_rhs": [2, 1, 2, 0, 0],
            "ub_rhs": [3, 2, 3, 0, 0],
            "scenarios": 10
        }"#;
        let definition = ProblemDefinition::from_json_str(raw).unwrap();
        assert_eq!(definition.scenarios, Some(RawCount::Integer(10)));
        assert_eq!(
            definition.coefficients.objective,
            Some(RawTable::Vector(vec![-3.0, -4.0]))
        );
        match definition.coefficients.lb_constraint {
            Some(RawTable::Matrix(rows)) => assert_eq!(rows.len(), 5),
            other => panic!("unexpected lb_constraint: {other:?}"),
        }
    }

    #[test]
    fn test_missing_parts_still_load() {
        let definition = ProblemDefinition::from_json_str(r#"{"objective": [1]}"#).unwrap();
        assert!(definition.coefficients.lb_constraint.is_none());
        assert!(definition.scenarios.is_none());
    }

    #[test]
    fn test_fractional_and_negative_counts() {
        let definition = ProblemDefinition::from_json_str(r#"{"scenarios": 2.5}"#).unwrap();
        assert_eq!(definition.scenarios, Some(RawCount::Fractional(2.5)));
        let definition = ProblemDefinition::from_json_str(r#"{"scenarios": -4}"#).unwrap();
        assert_eq!(definition.scenarios, Some(RawCount::Integer(-4)));
    }

    #[test]
    fn test_missing_file() {
        assert!(ProblemDefinition::load("/nonexistent/problem.json").is_err());
    }
}
