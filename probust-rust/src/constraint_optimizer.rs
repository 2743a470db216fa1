// src/constraint_optimizer.rs

// Tableau code indexes rows and columns directly
#![allow(clippy::needless_range_loop)]

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::config::LpOptions;
use crate::error::{ProbustError, Result};

/// One concrete linear program:
///    min cᵀx  s.t.  A·x ≤ b,  x ≥ 0.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProgram {
    pub objective: DVector<f64>,
    pub matrix: DMatrix<f64>,
    pub rhs: DVector<f64>,
}

impl LinearProgram {
    pub fn new(objective: DVector<f64>, matrix: DMatrix<f64>, rhs: DVector<f64>) -> Result<Self> {
        if matrix.ncols() != objective.len() {
            return Err(ProbustError::Dimension {
                context: "constraint matrix columns".to_string(),
                expected: objective.len(),
                found: matrix.ncols(),
            });
        }
        if matrix.nrows() != rhs.len() {
            return Err(ProbustError::Dimension {
                context: "rhs length".to_string(),
                expected: matrix.nrows(),
                found: rhs.len(),
            });
        }
        Ok(Self {
            objective,
            matrix,
            rhs,
        })
    }

    /// Row-concatenates several `(A, b)` blocks under one objective, so that
    /// a point feasible for the result is feasible for every block.
    pub fn stack<'a>(
        objective: &DVector<f64>,
        parts: impl IntoIterator<Item = (&'a DMatrix<f64>, &'a DVector<f64>)>,
    ) -> Result<Self> {
        let parts: Vec<_> = parts.into_iter().collect();
        if parts.is_empty() {
            return Err(ProbustError::StructuralViolation(
                "cannot stack an empty set of constraint blocks".to_string(),
            ));
        }
        let n = objective.len();
        let total_rows: usize = parts.iter().map(|(a, _)| a.nrows()).sum();
        let mut matrix = DMatrix::zeros(total_rows, n);
        let mut rhs = DVector::zeros(total_rows);
        let mut offset = 0;
        for (a, b) in parts {
            if a.ncols() != n {
                return Err(ProbustError::Dimension {
                    context: "stacked constraint block columns".to_string(),
                    expected: n,
                    found: a.ncols(),
                });
            }
            if b.len() != a.nrows() {
                return Err(ProbustError::Dimension {
                    context: "stacked rhs block length".to_string(),
                    expected: a.nrows(),
                    found: b.len(),
                });
            }
            matrix.view_mut((offset, 0), (a.nrows(), n)).copy_from(a);
            rhs.rows_mut(offset, b.len()).copy_from(b);
            offset += a.nrows();
        }
        Ok(Self {
            objective: objective.clone(),
            matrix,
            rhs,
        })
    }

    pub fn n(&self) -> usize {
        self.objective.len()
    }

    pub fn m(&self) -> usize {
        self.rhs.len()
    }
}

/// Solver status. `Unbounded` and `IterationLimit` are the "other" outcomes:
/// neither optimal nor proven infeasible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
}

impl SolveStatus {
    pub fn is_optimal(self) -> bool {
        self == Self::Optimal
    }
}

/// Solution data, present only for optimal solves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalPoint {
    pub variables: Vec<f64>,
    pub objective_value: f64,
    /// `A·x − b`, one entry per constraint row.
    pub residuals: Vec<f64>,
}

impl OptimalPoint {
    pub fn evaluate(lp: &LinearProgram, x: DVector<f64>) -> Self {
        let residuals = &lp.matrix * &x - &lp.rhs;
        Self {
            objective_value: lp.objective.dot(&x),
            residuals: residuals.iter().copied().collect(),
            variables: x.iter().copied().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpOutcome {
    pub status: SolveStatus,
    pub point: Option<OptimalPoint>,
}

impl LpOutcome {
    pub fn optimal(lp: &LinearProgram, x: DVector<f64>) -> Self {
        Self {
            status: SolveStatus::Optimal,
            point: Some(OptimalPoint::evaluate(lp, x)),
        }
    }

    pub fn failed(status: SolveStatus) -> Self {
        Self {
            status,
            point: None,
        }
    }
}

/// Anything that can minimize a [`LinearProgram`] over `x ≥ 0`.
pub trait LinearProgramAdapter {
    fn solve(&self, lp: &LinearProgram) -> LpOutcome;
}

/// Dense two-phase tableau simplex.
///
/// Rows with a negative right-hand side are negated and given a surplus
/// column plus an artificial column; phase 1 minimizes the sum of the
/// artificials, phase 2 the real objective. Pivots follow Bland's rule
/// (lowest entering index, lowest leaving basic index among ratio ties),
/// which rules out cycling on the degenerate rows `−x ≤ 0` that interval
/// problems tend to carry.
#[derive(Debug, Clone, Default)]
pub struct SimplexSolver {
    options: LpOptions,
}

enum Phase {
    Optimal,
    Unbounded,
    IterationLimit,
}

struct Tableau {
    t: DMatrix<f64>,
    basis: Vec<usize>,
    /// Number of constraint rows; row `m` holds reduced costs.
    m: usize,
    rhs: usize,
}

impl Tableau {
    fn pivot(&mut self, row: usize, col: usize) {
        let width = self.rhs + 1;
        let p = self.t[(row, col)];
        for j in 0..width {
            self.t[(row, j)] /= p;
        }
        for i in 0..=self.m {
            if i == row {
                continue;
            }
            let factor = self.t[(i, col)];
            if factor != 0.0 {
                for j in 0..width {
                    self.t[(i, j)] -= factor * self.t[(row, j)];
                }
            }
        }
        self.basis[row] = col;
    }

    /// Runs pivots over columns `0..allowed` until no reduced cost is
    /// negative.
    fn iterate(&mut self, allowed: usize, budget: &mut usize, tol: f64) -> Phase {
        loop {
            let entering = match (0..allowed).find(|&j| self.t[(self.m, j)] < -tol) {
                Some(j) => j,
                None => return Phase::Optimal,
            };

            let mut leaving: Option<(usize, f64)> = None;
            for i in 0..self.m {
                let a = self.t[(i, entering)];
                if a <= tol {
                    continue;
                }
                let ratio = self.t[(i, self.rhs)] / a;
                leaving = match leaving {
                    None => Some((i, ratio)),
                    Some((best, best_ratio)) => {
                        if ratio < best_ratio - tol
                            || ((ratio - best_ratio).abs() <= tol
                                && self.basis[i] < self.basis[best])
                        {
                            Some((i, ratio))
                        } else {
                            Some((best, best_ratio))
                        }
                    }
                };
            }

            let Some((row, _)) = leaving else {
                return Phase::Unbounded;
            };
            if *budget == 0 {
                return Phase::IterationLimit;
            }
            *budget -= 1;
            self.pivot(row, entering);
        }
    }
}

impl SimplexSolver {
    pub fn new(options: LpOptions) -> Self {
        Self { options }
    }

    fn minimize(&self, lp: &LinearProgram) -> std::result::Result<DVector<f64>, SolveStatus> {
        let (m, n) = lp.matrix.shape();
        let tol = self.options.tol;

        if m == 0 {
            // Only x ≥ 0: optimal at the origin unless some cost is negative.
            return if lp.objective.iter().any(|&c| c < -tol) {
                Err(SolveStatus::Unbounded)
            } else {
                Ok(DVector::zeros(n))
            };
        }

        let negative: Vec<bool> = lp.rhs.iter().map(|&b| b < 0.0).collect();
        let n_art = negative.iter().filter(|&&neg| neg).count();
        let n_struct = n + m;
        let cols = n_struct + n_art;

        let mut tab = Tableau {
            t: DMatrix::zeros(m + 1, cols + 1),
            basis: vec![0; m],
            m,
            rhs: cols,
        };

        let mut art = n_struct;
        for i in 0..m {
            let sign = if negative[i] { -1.0 } else { 1.0 };
            for j in 0..n {
                tab.t[(i, j)] = sign * lp.matrix[(i, j)];
            }
            tab.t[(i, n + i)] = sign;
            tab.t[(i, cols)] = sign * lp.rhs[i];
            if negative[i] {
                tab.t[(i, art)] = 1.0;
                tab.basis[i] = art;
                art += 1;
            } else {
                tab.basis[i] = n + i;
            }
        }

        let mut budget = self.options.max_iter;

        if n_art > 0 {
            // Phase 1: minimize the sum of artificials.
            for j in n_struct..cols {
                tab.t[(m, j)] = 1.0;
            }
            for i in 0..m {
                if tab.basis[i] >= n_struct {
                    for j in 0..=cols {
                        tab.t[(m, j)] -= tab.t[(i, j)];
                    }
                }
            }
            match tab.iterate(cols, &mut budget, tol) {
                Phase::Optimal => {}
                Phase::Unbounded => return Err(SolveStatus::IterationLimit),
                Phase::IterationLimit => return Err(SolveStatus::IterationLimit),
            }

            let scale = 1.0 + lp.rhs.amax();
            if -tab.t[(m, cols)] > 1e-7 * scale {
                return Err(SolveStatus::Infeasible);
            }

            // Drive zero-level artificials out of the basis. A row with no
            // usable pivot is redundant and keeps its artificial at zero.
            for i in 0..m {
                if tab.basis[i] >= n_struct {
                    if let Some(j) = (0..n_struct).find(|&j| tab.t[(i, j)].abs() > tol) {
                        tab.pivot(i, j);
                    }
                }
            }
        }

        // Phase 2: real objective, artificial columns barred from entering.
        for j in 0..=cols {
            tab.t[(m, j)] = if j < n { lp.objective[j] } else { 0.0 };
        }
        for i in 0..m {
            let k = tab.basis[i];
            if k < n {
                let cost = lp.objective[k];
                if cost != 0.0 {
                    for j in 0..=cols {
                        tab.t[(m, j)] -= cost * tab.t[(i, j)];
                    }
                }
            }
        }
        match tab.iterate(n_struct, &mut budget, tol) {
            Phase::Optimal => {}
            Phase::Unbounded => return Err(SolveStatus::Unbounded),
            Phase::IterationLimit => return Err(SolveStatus::IterationLimit),
        }

        let mut x = DVector::zeros(n);
        for i in 0..m {
            if tab.basis[i] < n {
                x[tab.basis[i]] = tab.t[(i, cols)].max(0.0);
            }
        }
        Ok(x)
    }
}

impl LinearProgramAdapter for SimplexSolver {
    fn solve(&self, lp: &LinearProgram) -> LpOutcome {
        match self.minimize(lp) {
            Ok(x) => LpOutcome::optimal(lp, x),
            Err(status) => LpOutcome::failed(status),
        }
    }
}
