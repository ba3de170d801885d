//! Primal active-set method for box-constrained quadratic programs with a
//! single linear equality:
//!
//! ```text
//! minimize    0.5 x'Qx - c'x
//! subject to  a'x = b
//!             lower <= x <= upper
//! ```
//!
//! Each iteration fixes a working set of variables at their bounds and solves
//! the equality-constrained subproblem on the free variables exactly through
//! its KKT system. All portfolio problems in this crate reduce to this form.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use super::linalg::{mat_vec_multiply, solve_linear_system};
use crate::error::FrontierError;
use crate::FrontierResult;

/// Steps and multipliers smaller than this count as zero.
const TOLERANCE: Decimal = dec!(0.000000000000001);

/// Where a variable sits relative to its bounds in the working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoundState {
    Free,
    AtLower,
    AtUpper,
}

#[derive(Debug, Clone)]
pub(crate) struct QuadraticProgram<'a> {
    pub quadratic: &'a [Vec<Decimal>],
    pub linear: Vec<Decimal>,
    pub constraint: Vec<Decimal>,
    pub target: Decimal,
    pub lower: Vec<Decimal>,
    /// `None` means unbounded above.
    pub upper: Vec<Option<Decimal>>,
}

#[derive(Debug, Clone)]
pub(crate) struct QpSolution {
    pub x: Vec<Decimal>,
    pub states: Vec<BoundState>,
    pub iterations: u32,
}

impl QuadraticProgram<'_> {
    pub fn dimension(&self) -> usize {
        self.linear.len()
    }

    fn is_feasible(&self, x: &[Decimal]) -> bool {
        let residual: Decimal = self
            .constraint
            .iter()
            .zip(x.iter())
            .map(|(a, xi)| *a * *xi)
            .sum::<Decimal>()
            - self.target;
        if residual.abs() > dec!(0.000000001) {
            return false;
        }
        x.iter().enumerate().all(|(i, xi)| {
            *xi >= self.lower[i] - TOLERANCE
                && self.upper[i].map_or(true, |hi| *xi <= hi + TOLERANCE)
        })
    }

    /// Gradient of the objective: Qx - c.
    fn gradient(&self, x: &[Decimal]) -> Vec<Decimal> {
        mat_vec_multiply(self.quadratic, x)
            .into_iter()
            .zip(self.linear.iter())
            .map(|(qx, c)| qx - *c)
            .collect()
    }
}

/// Minimise the subproblem with every non-free variable held at its current
/// value. Returns the minimiser and the multiplier of the equality constraint.
pub(crate) fn solve_working_set(
    qp: &QuadraticProgram<'_>,
    states: &[BoundState],
    x: &[Decimal],
) -> FrontierResult<(Vec<Decimal>, Decimal)> {
    let free: Vec<usize> = (0..qp.dimension())
        .filter(|&i| states[i] == BoundState::Free)
        .collect();
    if free.is_empty() {
        return Ok((x.to_vec(), Decimal::ZERO));
    }

    let m = free.len();
    let mut kkt = vec![vec![Decimal::ZERO; m + 1]; m + 1];
    let mut rhs = vec![Decimal::ZERO; m + 1];

    let mut fixed_constraint = Decimal::ZERO;
    for (j, state) in states.iter().enumerate() {
        if *state != BoundState::Free {
            fixed_constraint += qp.constraint[j] * x[j];
        }
    }

    for (r, &i) in free.iter().enumerate() {
        for (s, &k) in free.iter().enumerate() {
            kkt[r][s] = qp.quadratic[i][k];
        }
        kkt[r][m] = qp.constraint[i];
        kkt[m][r] = qp.constraint[i];

        let mut coupling = Decimal::ZERO;
        for (j, state) in states.iter().enumerate() {
            if *state != BoundState::Free {
                coupling += qp.quadratic[i][j] * x[j];
            }
        }
        rhs[r] = qp.linear[i] - coupling;
    }
    rhs[m] = qp.target - fixed_constraint;

    let solution = solve_linear_system(&kkt, &rhs)?;
    let mut candidate = x.to_vec();
    for (r, &i) in free.iter().enumerate() {
        candidate[i] = solution[r];
    }
    Ok((candidate, solution[m]))
}

/// Solve `qp` starting from the feasible point `start`.
pub(crate) fn solve(
    qp: &QuadraticProgram<'_>,
    start: Vec<Decimal>,
    max_iterations: u32,
) -> FrontierResult<QpSolution> {
    let n = qp.dimension();
    if start.len() != n || !qp.is_feasible(&start) {
        return Err(FrontierError::Infeasible(
            "active-set solver needs a feasible starting point".into(),
        ));
    }

    let mut x = start;
    let mut states = vec![BoundState::Free; n];

    for iteration in 1..=max_iterations {
        let (candidate, lambda) = solve_working_set(qp, &states, &x)?;
        let step: Vec<Decimal> = candidate
            .iter()
            .zip(x.iter())
            .map(|(c, xi)| *c - *xi)
            .collect();
        let step_size = step
            .iter()
            .map(|s| s.abs())
            .max()
            .unwrap_or(Decimal::ZERO);

        if step_size <= TOLERANCE {
            x = candidate;
            // Stationary on the working set: a bound multiplier with the
            // wrong sign means that variable should leave its bound.
            let gradient = qp.gradient(&x);
            let mut release: Option<(usize, Decimal)> = None;
            for i in 0..n {
                let g = gradient[i] + qp.constraint[i] * lambda;
                let violation = match states[i] {
                    BoundState::Free => continue,
                    BoundState::AtLower => -g,
                    BoundState::AtUpper => g,
                };
                if violation > TOLERANCE && release.map_or(true, |(_, v)| violation > v) {
                    release = Some((i, violation));
                }
            }
            match release {
                None => {
                    debug!(iterations = iteration, dimension = n, "active-set converged");
                    return Ok(QpSolution {
                        x,
                        states,
                        iterations: iteration,
                    });
                }
                Some((i, _)) => states[i] = BoundState::Free,
            }
            continue;
        }

        // Ratio test: longest feasible step toward the candidate
        let mut alpha = Decimal::ONE;
        let mut blocking: Option<(usize, BoundState)> = None;
        for i in 0..n {
            if states[i] != BoundState::Free {
                continue;
            }
            let s = step[i];
            if s < -TOLERANCE {
                let room = (qp.lower[i] - x[i]) / s;
                if room < alpha {
                    alpha = room;
                    blocking = Some((i, BoundState::AtLower));
                }
            } else if s > TOLERANCE {
                if let Some(hi) = qp.upper[i] {
                    let room = (hi - x[i]) / s;
                    if room < alpha {
                        alpha = room;
                        blocking = Some((i, BoundState::AtUpper));
                    }
                }
            }
        }
        if alpha < Decimal::ZERO {
            alpha = Decimal::ZERO;
        }

        for i in 0..n {
            x[i] += alpha * step[i];
        }
        if let Some((i, state)) = blocking {
            x[i] = match state {
                BoundState::AtUpper => qp.upper[i].unwrap_or(x[i]),
                _ => qp.lower[i],
            };
            states[i] = state;
        }
    }

    Err(FrontierError::ConvergenceFailure {
        function: "active_set::solve".into(),
        iterations: max_iterations,
    })
}
