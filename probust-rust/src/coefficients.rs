//! Interval-bounded problem definition.
//!
//! The problem is `min c·x  s.t.  [lbA, ubA]·x ≤ [lbb, ubb]`, where every
//! entry of the constraint matrix and right-hand side is only known to lie
//! in a closed interval. Validation never aborts: each check appends to a
//! [`StatusLog`] and the model is built either way, with
//! [`CoefficientModel::coefficients`] left empty when anything failed.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::status::{StatusCode, StatusLog};

/// A numeric table as it arrives from the outside world: either a flat
/// vector (read as a single column) or a list of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTable {
    Matrix(Vec<Vec<f64>>),
    Vector(Vec<f64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableError {
    Empty,
    Malformed,
}

impl RawTable {
    fn is_empty(&self) -> bool {
        match self {
            Self::Matrix(rows) => rows.iter().all(|r| r.is_empty()),
            Self::Vector(values) => values.is_empty(),
        }
    }

    fn to_matrix(&self) -> Result<DMatrix<f64>, TableError> {
        if self.is_empty() {
            return Err(TableError::Empty);
        }
        let matrix = match self {
            Self::Vector(values) => DMatrix::from_column_slice(values.len(), 1, values),
            Self::Matrix(rows) => {
                let ncols = rows[0].len();
                if rows.iter().any(|r| r.len() != ncols) {
                    return Err(TableError::Malformed);
                }
                DMatrix::from_row_iterator(rows.len(), ncols, rows.iter().flatten().copied())
            }
        };
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(TableError::Malformed);
        }
        Ok(matrix)
    }
}

impl From<Vec<f64>> for RawTable {
    fn from(values: Vec<f64>) -> Self {
        Self::Vector(values)
    }
}

impl From<Vec<Vec<f64>>> for RawTable {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        Self::Matrix(rows)
    }
}

/// A scenario count as it arrives from the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCount {
    Integer(i64),
    Fractional(f64),
}

impl From<i64> for RawCount {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

/// The five raw inputs of the interval problem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoefficientInput {
    pub objective: Option<RawTable>,
    pub lb_constraint: Option<RawTable>,
    pub ub_constraint: Option<RawTable>,
    pub lb_rhs: Option<RawTable>,
    pub ub_rhs: Option<RawTable>,
}

/// Validated interval problem. `n` variables, `m` constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientSet {
    pub objective: DVector<f64>,
    pub lb_constraint: DMatrix<f64>,
    pub ub_constraint: DMatrix<f64>,
    pub lb_rhs: DVector<f64>,
    pub ub_rhs: DVector<f64>,
}

impl CoefficientSet {
    /// Number of decision variables.
    pub fn n(&self) -> usize {
        self.objective.len()
    }

    /// Number of constraints.
    pub fn m(&self) -> usize {
        self.lb_rhs.len()
    }
}

#[derive(Debug, Clone)]
pub struct CoefficientModel {
    pub status: StatusLog,
    coefficients: Option<CoefficientSet>,
}

impl CoefficientModel {
    pub fn validate(input: &CoefficientInput) -> Self {
        let mut status = StatusLog::new();

        let objective = acquire(&mut status, input.objective.as_ref(), "objective");
        let lb_a = acquire(&mut status, input.lb_constraint.as_ref(), "lb_constraint");
        let ub_a = acquire(&mut status, input.ub_constraint.as_ref(), "ub_constraint");
        let lb_b = acquire(&mut status, input.lb_rhs.as_ref(), "lb_rhs");
        let ub_b = acquire(&mut status, input.ub_rhs.as_ref(), "ub_rhs");

        let tables = match (objective, lb_a, ub_a, lb_b, ub_b) {
            (Some(c), Some(lb_a), Some(ub_a), Some(lb_b), Some(ub_b)) if !status.has_error() => {
                Some((c, lb_a, ub_a, lb_b, ub_b))
            }
            _ => {
                status.error(
                    StatusCode::CoefficientNotDefined,
                    "Coefficient cannot be defined",
                );
                None
            }
        };

        let coefficients = match tables {
            None => {
                status.error(
                    StatusCode::DimensionNotEvaluated,
                    "Dimension can not be evaluated",
                );
                None
            }
            Some((c, lb_a, ub_a, lb_b, ub_b)) => {
                if dimensions_agree(&c, &lb_a, &ub_a, &lb_b, &ub_b) {
                    check_bounds(&mut status, &lb_a, &ub_a, "constraint");
                    check_bounds(&mut status, &lb_b, &ub_b, "rhs");
                    Some(CoefficientSet {
                        objective: c.column(0).into_owned(),
                        lb_constraint: lb_a,
                        ub_constraint: ub_a,
                        lb_rhs: lb_b.column(0).into_owned(),
                        ub_rhs: ub_b.column(0).into_owned(),
                    })
                } else {
                    status.error(
                        StatusCode::DimensionInconsistent,
                        "Dimension inconsistency detected",
                    );
                    None
                }
            }
        };

        Self {
            coefficients: coefficients.filter(|_| !status.has_error()),
            status,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.status.has_error()
    }

    /// The validated coefficients; `None` whenever validation failed.
    pub fn coefficients(&self) -> Option<&CoefficientSet> {
        self.coefficients.as_ref()
    }
}

fn acquire(status: &mut StatusLog, table: Option<&RawTable>, name: &str) -> Option<DMatrix<f64>> {
    match table.map(RawTable::to_matrix) {
        None | Some(Err(TableError::Empty)) => {
            status.error(
                StatusCode::CoefficientUndefined,
                format!("Undefined {name} coefficient"),
            );
            None
        }
        Some(Err(TableError::Malformed)) => {
            status.error(
                StatusCode::CoefficientMalformed,
                format!("Failed acquiring {name} coefficient"),
            );
            None
        }
        Some(Ok(matrix)) => {
            status.ok(
                StatusCode::CoefficientAcquired,
                format!("Successfully acquired {name} coefficient"),
            );
            Some(matrix)
        }
    }
}

/// All shape equalities must hold at once: the objective is an `n × 1`
/// column, both constraint bounds are `m × n`, both rhs bounds `m × 1`.
fn dimensions_agree(
    c: &DMatrix<f64>,
    lb_a: &DMatrix<f64>,
    ub_a: &DMatrix<f64>,
    lb_b: &DMatrix<f64>,
    ub_b: &DMatrix<f64>,
) -> bool {
    c.nrows() == lb_a.ncols()
        && lb_a.ncols() == ub_a.ncols()
        && lb_a.nrows() == ub_a.nrows()
        && ub_a.nrows() == ub_b.nrows()
        && lb_b.nrows() == ub_b.nrows()
        && lb_b.ncols() == ub_b.ncols()
        && c.ncols() == 1
        && ub_b.ncols() == 1
}

fn check_bounds(status: &mut StatusLog, lb: &DMatrix<f64>, ub: &DMatrix<f64>, name: &str) {
    let inverted = lb.iter().zip(ub.iter()).filter(|(l, u)| l > u).count();
    if inverted > 0 {
        status.error(
            StatusCode::InvertedBounds,
            format!("Inverted bounds on {inverted} {name} entries"),
        );
    }
}

/// Validates the requested scenario count. Zero scenarios is not a usable
/// batch, so it is treated like an absent count.
pub fn validate_scenario_count(status: &mut StatusLog, raw: Option<RawCount>) -> Option<usize> {
    match raw {
        None | Some(RawCount::Integer(0)) => {
            status.error(
                StatusCode::ScenarioCountUndefined,
                "Undefined number of scenarios",
            );
            None
        }
        Some(RawCount::Integer(n)) if n > 0 => {
            status.ok(
                StatusCode::ScenarioCountAcquired,
                "Successfully acquired number of scenarios",
            );
            Some(n as usize)
        }
        Some(_) => {
            status.error(
                StatusCode::ScenarioCountInvalid,
                "Failed acquiring number of scenarios",
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> CoefficientInput {
        CoefficientInput {
            objective: Some(vec![-3.0, -4.0].into()),
            lb_constraint: Some(
                vec![
                    vec![1.0, 1.0],
                    vec![1.0, 0.0],
                    vec![0.0, 1.0],
                    vec![-1.0, 0.0],
                    vec![0.0, -1.0],
                ]
                .into(),
            ),
            ub_constraint: Some(
                vec![
                    vec![2.0, 2.0],
                    vec![2.0, 1.0],
                    vec![1.0, 2.0],
                    vec![-1.0, 0.0],
                    vec![0.0, -1.0],
                ]
                .into(),
            ),
            lb_rhs: Some(vec![2.0, 1.0, 2.0, 0.0, 0.0].into()),
            ub_rhs: Some(vec![3.0, 2.0, 3.0, 0.0, 0.0].into()),
        }
    }

    #[test]
    fn test_valid_input() {
        let model = CoefficientModel::validate(&sample_input());
        assert!(model.is_valid());
        let set = model.coefficients().unwrap();
        assert_eq!(set.n(), 2);
        assert_eq!(set.m(), 5);
        assert_eq!(set.lb_constraint[(1, 0)], 1.0);
        assert_eq!(set.ub_rhs[2], 3.0);
        assert_eq!(
            model
                .status
                .entries()
                .iter()
                .filter(|e| e.code == StatusCode::CoefficientAcquired)
                .count(),
            5
        );
    }

    #[test]
    fn test_missing_objective() {
        let mut input = sample_input();
        input.objective = None;
        let model = CoefficientModel::validate(&input);
        assert!(!model.is_valid());
        assert!(model.coefficients().is_none());
        assert!(model.status.contains_error(StatusCode::CoefficientUndefined));
        assert!(model.status.contains_error(StatusCode::DimensionNotEvaluated));
    }

    #[test]
    fn test_empty_is_undefined_not_malformed() {
        let mut input = sample_input();
        input.lb_rhs = Some(RawTable::Vector(vec![]));
        let model = CoefficientModel::validate(&input);
        assert!(model.status.contains_error(StatusCode::CoefficientUndefined));
        assert!(!model.status.contains_error(StatusCode::CoefficientMalformed));
    }

    #[test]
    fn test_ragged_rows_are_malformed() {
        let mut input = sample_input();
        input.ub_constraint = Some(vec![vec![1.0, 2.0], vec![1.0]].into());
        let model = CoefficientModel::validate(&input);
        assert!(model.status.contains_error(StatusCode::CoefficientMalformed));
        assert!(model.coefficients().is_none());
    }

    #[test]
    fn test_non_finite_is_malformed() {
        let mut input = sample_input();
        input.objective = Some(vec![f64::NAN, 1.0].into());
        let model = CoefficientModel::validate(&input);
        assert!(model.status.contains_error(StatusCode::CoefficientMalformed));
    }

    #[test]
    fn test_objective_length_mismatch() {
        let mut input = sample_input();
        input.objective = Some(vec![1.0].into());
        let model = CoefficientModel::validate(&input);
        assert!(model.status.contains_error(StatusCode::DimensionInconsistent));
        assert!(model.coefficients().is_none());
    }

    #[test]
    fn test_objective_as_row_is_rejected() {
        let mut input = sample_input();
        input.objective = Some(vec![vec![-3.0, -4.0]].into());
        let model = CoefficientModel::validate(&input);
        assert!(model.status.contains_error(StatusCode::DimensionInconsistent));
    }

    #[test]
    fn test_rhs_row_count_mismatch() {
        let mut input = sample_input();
        input.ub_rhs = Some(vec![3.0, 2.0, 3.0, 0.0].into());
        let model = CoefficientModel::validate(&input);
        assert!(model.status.contains_error(StatusCode::DimensionInconsistent));
    }

    #[test]
    fn test_rhs_must_be_single_column() {
        let mut input = sample_input();
        let two_cols: Vec<Vec<f64>> = (0..5).map(|_| vec![1.0, 2.0]).collect();
        input.lb_rhs = Some(two_cols.clone().into());
        input.ub_rhs = Some(two_cols.into());
        let model = CoefficientModel::validate(&input);
        assert!(model.status.contains_error(StatusCode::DimensionInconsistent));
    }

    #[test]
    fn test_inverted_bounds() {
        let mut input = sample_input();
        input.lb_rhs = Some(vec![4.0, 1.0, 2.0, 0.0, 0.0].into());
        let model = CoefficientModel::validate(&input);
        assert!(model.status.contains_error(StatusCode::InvertedBounds));
        assert!(model.coefficients().is_none());
    }

    #[test]
    fn test_scenario_count() {
        let mut status = StatusLog::new();
        assert_eq!(validate_scenario_count(&mut status, Some(10.into())), Some(10));
        assert!(!status.has_error());

        let mut status = StatusLog::new();
        assert_eq!(validate_scenario_count(&mut status, Some(0.into())), None);
        assert!(status.contains_error(StatusCode::ScenarioCountUndefined));

        let mut status = StatusLog::new();
        assert_eq!(validate_scenario_count(&mut status, Some((-4).into())), None);
        assert!(status.contains_error(StatusCode::ScenarioCountInvalid));

        let mut status = StatusLog::new();
        assert_eq!(
            validate_scenario_count(&mut status, Some(RawCount::Fractional(2.5))),
            None
        );
        assert!(status.contains_error(StatusCode::ScenarioCountInvalid));

        let mut status = StatusLog::new();
        assert_eq!(validate_scenario_count(&mut status, None), None);
        assert!(status.contains_error(StatusCode::ScenarioCountUndefined));
    }

    #[test]
    fn test_raw_table_deserialize() {
        let vector: RawTable = serde_json::from_str("[1.0, 2.5]").unwrap();
        assert_eq!(vector, RawTable::Vector(vec![1.0, 2.5]));
        let matrix: RawTable = serde_json::from_str("[[1, 2], [3, 4]]").unwrap();
        assert_eq!(matrix, RawTable::Matrix(vec![vec![1.0, 2.0], vec![3.0, 4.0]]));
    }
}
