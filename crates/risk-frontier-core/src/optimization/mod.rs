//! Mean-variance optimization behind a narrow interface.
//!
//! Callers describe the asset universe with an [`OptimizationProblem`] and ask
//! a [`PortfolioOptimizer`] for one of the classic portfolios. The default
//! implementation, [`ActiveSetOptimizer`], solves every request exactly with
//! decimal arithmetic.

pub(crate) mod active_set;
pub mod efficient_frontier;
pub(crate) mod linalg;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::FrontierError;
use crate::types::{Rate, Weight};
use crate::FrontierResult;

pub use efficient_frontier::ActiveSetOptimizer;

/// Uniform bounds applied to every asset weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightBounds {
    pub lower: Weight,
    pub upper: Weight,
}

impl WeightBounds {
    pub fn new(lower: Weight, upper: Weight) -> Self {
        WeightBounds { lower, upper }
    }

    /// Long-only and fully invested, no asset above 100%.
    pub fn long_only() -> Self {
        WeightBounds {
            lower: Decimal::ZERO,
            upper: Decimal::ONE,
        }
    }
}

impl Default for WeightBounds {
    fn default() -> Self {
        Self::long_only()
    }
}

/// Expected returns and covariance over a fixed asset universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationProblem {
    pub expected_returns: Vec<Rate>,
    pub covariance_matrix: Vec<Vec<Decimal>>,
    #[serde(default)]
    pub weight_bounds: WeightBounds,
}

/// Weights and ex-ante performance of a solved portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPerformance {
    pub weights: Vec<Weight>,
    pub expected_return: Rate,
    pub volatility: Rate,
    /// Only reported by `max_sharpe`, which knows the risk-free rate.
    pub sharpe_ratio: Option<Decimal>,
}

/// The operations the frontier derivation needs from an optimizer.
pub trait PortfolioOptimizer {
    /// Fully invested portfolio with the lowest variance.
    fn min_volatility(&self, problem: &OptimizationProblem)
        -> FrontierResult<PortfolioPerformance>;

    /// Tangency portfolio: highest `(return - rf) / volatility`.
    fn max_sharpe(
        &self,
        problem: &OptimizationProblem,
        risk_free_rate: Rate,
    ) -> FrontierResult<PortfolioPerformance>;

    /// Maximise `w'mu - 0.5 * risk_aversion * w'Sigma w` within the weight bounds.
    fn max_quadratic_utility(
        &self,
        problem: &OptimizationProblem,
        risk_aversion: Decimal,
    ) -> FrontierResult<PortfolioPerformance>;

    /// Highest-return portfolio whose volatility does not exceed the target.
    fn efficient_risk(
        &self,
        problem: &OptimizationProblem,
        target_volatility: Rate,
    ) -> FrontierResult<PortfolioPerformance>;
}

impl OptimizationProblem {
    pub fn new(expected_returns: Vec<Rate>, covariance_matrix: Vec<Vec<Decimal>>) -> Self {
        OptimizationProblem {
            expected_returns,
            covariance_matrix,
            weight_bounds: WeightBounds::default(),
        }
    }

    pub fn with_bounds(mut self, bounds: WeightBounds) -> Self {
        self.weight_bounds = bounds;
        self
    }

    pub fn n_assets(&self) -> usize {
        self.expected_returns.len()
    }

    /// Standard deviation of each asset on its own.
    pub fn asset_volatilities(&self) -> Vec<Rate> {
        self.covariance_matrix
            .iter()
            .enumerate()
            .map(|(i, row)| linalg::sqrt_non_negative(row[i]))
            .collect()
    }

    /// Build the performance record for a weight vector.
    pub fn performance(&self, weights: Vec<Weight>) -> PortfolioPerformance {
        let expected_return = linalg::vec_dot(&weights, &self.expected_returns);
        let volatility = linalg::portfolio_std(&weights, &self.covariance_matrix);
        PortfolioPerformance {
            weights,
            expected_return,
            volatility,
            sharpe_ratio: None,
        }
    }

    pub fn validate(&self) -> FrontierResult<()> {
        let n = self.n_assets();
        if n == 0 {
            return Err(FrontierError::InsufficientData(
                "At least one asset required".into(),
            ));
        }
        validate_covariance_matrix(&self.covariance_matrix, n)?;
        for (i, row) in self.covariance_matrix.iter().enumerate() {
            if row[i] < Decimal::ZERO {
                return Err(FrontierError::InvalidInput {
                    field: "covariance_matrix".into(),
                    reason: format!("Negative variance {} on diagonal {}", row[i], i),
                });
            }
        }
        let WeightBounds { lower, upper } = self.weight_bounds;
        if lower > upper {
            return Err(FrontierError::InvalidInput {
                field: "weight_bounds".into(),
                reason: format!("lower {} exceeds upper {}", lower, upper),
            });
        }
        Ok(())
    }

    /// A fully invested weight vector inside the bounds: start everyone at the
    /// lower bound and fill the remaining budget in asset order.
    pub(crate) fn feasible_budget_start(&self) -> FrontierResult<Vec<Weight>> {
        self.fill_budget(0..self.n_assets())
    }

    /// Highest-return fully invested portfolio: fill the budget in descending
    /// expected return, lower variance first among equal returns.
    pub(crate) fn max_return_weights(&self) -> FrontierResult<Vec<Weight>> {
        let mut order: Vec<usize> = (0..self.n_assets()).collect();
        order.sort_by(|&a, &b| {
            self.expected_returns[b]
                .cmp(&self.expected_returns[a])
                .then(self.covariance_matrix[a][a].cmp(&self.covariance_matrix[b][b]))
        });
        self.fill_budget(order.into_iter())
    }

    fn fill_budget(&self, order: impl Iterator<Item = usize>) -> FrontierResult<Vec<Weight>> {
        let n = self.n_assets();
        let WeightBounds { lower, upper } = self.weight_bounds;
        let count = Decimal::from(n as u64);
        if lower * count > Decimal::ONE || upper * count < Decimal::ONE {
            return Err(FrontierError::Infeasible(format!(
                "weights in [{}, {}] cannot sum to 1 across {} assets",
                lower, upper, n
            )));
        }
        let mut w = vec![lower; n];
        let mut remaining = Decimal::ONE - lower * count;
        for i in order {
            if remaining <= Decimal::ZERO {
                break;
            }
            let add = remaining.min(upper - lower);
            w[i] += add;
            remaining -= add;
        }
        Ok(w)
    }

    /// Pull each weight back inside the bounds, removing round-off residue
    /// such as `-1e-28` on a long-only book.
    pub(crate) fn clamp_to_bounds(&self, weights: Vec<Weight>) -> Vec<Weight> {
        let WeightBounds { lower, upper } = self.weight_bounds;
        weights.into_iter().map(|w| w.max(lower).min(upper)).collect()
    }
}

#[allow(clippy::needless_range_loop)]
pub(crate) fn validate_covariance_matrix(cov: &[Vec<Decimal>], n: usize) -> FrontierResult<()> {
    if cov.len() != n {
        return Err(FrontierError::InvalidInput {
            field: "covariance_matrix".into(),
            reason: format!("Expected {}x{} matrix but got {} rows", n, n, cov.len()),
        });
    }
    for (i, row) in cov.iter().enumerate() {
        if row.len() != n {
            return Err(FrontierError::InvalidInput {
                field: "covariance_matrix".into(),
                reason: format!("Row {} has {} columns, expected {}", i, row.len(), n),
            });
        }
    }
    let tolerance = dec!(0.0000001);
    for i in 0..n {
        for j in (i + 1)..n {
            if (cov[i][j] - cov[j][i]).abs() > tolerance {
                return Err(FrontierError::InvalidInput {
                    field: "covariance_matrix".into(),
                    reason: format!(
                        "Not symmetric: [{},{}]={} != [{},{}]={}",
                        i, j, cov[i][j], j, i, cov[j][i]
                    ),
                });
            }
        }
    }
    Ok(())
}
