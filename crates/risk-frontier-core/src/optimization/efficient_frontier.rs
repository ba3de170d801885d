use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::active_set::{self, BoundState, QpSolution, QuadraticProgram};
use super::linalg::{quad_form, sqrt_non_negative, vec_dot};
use super::{OptimizationProblem, PortfolioOptimizer, PortfolioPerformance, WeightBounds};
use crate::error::FrontierError;
use crate::types::Rate;
use crate::FrontierResult;

/// Volatility slack when comparing against a target.
const VOLATILITY_TOLERANCE: Decimal = dec!(0.000000001);

/// Return slack when checking whether the path has reached the top asset.
const RETURN_TOLERANCE: Decimal = dec!(0.000000001);

/// Doublings of the return weight before giving up on reaching a target.
const MAX_BRACKET_STEPS: u32 = 64;

/// Halvings of the bracket while locating the target's path segment.
const MAX_BISECTION_STEPS: u32 = 200;

/// Exact active-set optimizer over decimal inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSetOptimizer {
    /// Per-solve iteration cap for the active-set loop.
    pub max_iterations: u32,
}

impl Default for ActiveSetOptimizer {
    fn default() -> Self {
        ActiveSetOptimizer {
            max_iterations: 500,
        }
    }
}

impl PortfolioOptimizer for ActiveSetOptimizer {
    fn min_volatility(
        &self,
        problem: &OptimizationProblem,
    ) -> FrontierResult<PortfolioPerformance> {
        problem.validate()?;
        let sol = self.solve_return_weighted(problem, Decimal::ZERO, None)?;
        Ok(problem.performance(problem.clamp_to_bounds(sol.x)))
    }

    fn max_sharpe(
        &self,
        problem: &OptimizationProblem,
        risk_free_rate: Rate,
    ) -> FrontierResult<PortfolioPerformance> {
        problem.validate()?;
        let WeightBounds { lower, upper } = problem.weight_bounds;
        if lower != Decimal::ZERO || upper < Decimal::ONE {
            return Err(FrontierError::InvalidInput {
                field: "weight_bounds".into(),
                reason: format!(
                    "max_sharpe supports long-only bounds [0, >=1], got [{}, {}]",
                    lower, upper
                ),
            });
        }

        let excess: Vec<Decimal> = problem
            .expected_returns
            .iter()
            .map(|r| *r - risk_free_rate)
            .collect();
        let (best, best_excess) = excess
            .iter()
            .copied()
            .enumerate()
            .fold((0usize, Decimal::MIN), |acc, (i, e)| {
                if e > acc.1 {
                    (i, e)
                } else {
                    acc
                }
            });
        if best_excess <= Decimal::ZERO {
            return Err(FrontierError::InvalidInput {
                field: "expected_returns".into(),
                reason: format!(
                    "at least one asset must have an expected return exceeding the risk-free rate {}",
                    risk_free_rate
                ),
            });
        }

        // Homogenised form: min y'Sigma y s.t. (mu - rf)'y = 1, y >= 0; w = y / sum(y)
        let n = problem.n_assets();
        let qp = QuadraticProgram {
            quadratic: &problem.covariance_matrix,
            linear: vec![Decimal::ZERO; n],
            constraint: excess,
            target: Decimal::ONE,
            lower: vec![Decimal::ZERO; n],
            upper: vec![None; n],
        };
        let mut start = vec![Decimal::ZERO; n];
        start[best] = Decimal::ONE / best_excess;
        let sol = active_set::solve(&qp, start, self.max_iterations)?;

        let total: Decimal = sol.x.iter().copied().sum();
        if total <= Decimal::ZERO {
            return Err(FrontierError::DivisionByZero {
                context: "max_sharpe: scaled weights sum to zero".into(),
            });
        }
        let weights: Vec<Decimal> = sol.x.iter().map(|y| *y / total).collect();
        let mut perf = problem.performance(problem.clamp_to_bounds(weights));
        if perf.volatility <= VOLATILITY_TOLERANCE {
            return Err(FrontierError::DivisionByZero {
                context: "max_sharpe: tangency portfolio has zero volatility".into(),
            });
        }
        perf.sharpe_ratio = Some((perf.expected_return - risk_free_rate) / perf.volatility);
        debug!(
            expected_return = %perf.expected_return,
            volatility = %perf.volatility,
            iterations = sol.iterations,
            "max sharpe solved"
        );
        Ok(perf)
    }

    fn max_quadratic_utility(
        &self,
        problem: &OptimizationProblem,
        risk_aversion: Decimal,
    ) -> FrontierResult<PortfolioPerformance> {
        problem.validate()?;
        if risk_aversion <= Decimal::ZERO {
            return Err(FrontierError::InvalidInput {
                field: "risk_aversion".into(),
                reason: format!("must be positive, got {}", risk_aversion),
            });
        }

        // max w'mu - 0.5 A w'Sigma w  ==  min 0.5 w'(A Sigma)w - mu'w
        let scaled: Vec<Vec<Decimal>> = problem
            .covariance_matrix
            .iter()
            .map(|row| row.iter().map(|v| *v * risk_aversion).collect())
            .collect();
        let qp = budget_program(problem, &scaled, problem.expected_returns.clone());
        let sol = active_set::solve(&qp, problem.feasible_budget_start()?, self.max_iterations)?;
        debug!(
            risk_aversion = %risk_aversion,
            iterations = sol.iterations,
            "max quadratic utility solved"
        );
        Ok(problem.performance(problem.clamp_to_bounds(sol.x)))
    }

    fn efficient_risk(
        &self,
        problem: &OptimizationProblem,
        target_volatility: Rate,
    ) -> FrontierResult<PortfolioPerformance> {
        problem.validate()?;
        let sigma = &problem.covariance_matrix;

        // Path of min 0.5 w'Sigma w - tau mu'w; volatility grows with tau.
        let mut lo_tau = Decimal::ZERO;
        let mut lo = self.solve_return_weighted(problem, lo_tau, None)?;
        let min_vol = sqrt_non_negative(quad_form(&lo.x, sigma));
        if target_volatility < min_vol - VOLATILITY_TOLERANCE {
            return Err(FrontierError::InvalidInput {
                field: "target_volatility".into(),
                reason: format!(
                    "minimum volatility is {}; use a target of at least that",
                    min_vol
                ),
            });
        }
        if target_volatility <= min_vol + VOLATILITY_TOLERANCE {
            return Ok(problem.performance(problem.clamp_to_bounds(lo.x)));
        }

        // Targets at or beyond the top-return portfolio saturate there
        let top = problem.max_return_weights()?;
        let top_vol = sqrt_non_negative(quad_form(&top, sigma));
        let top_return = vec_dot(&top, &problem.expected_returns);
        if target_volatility >= top_vol - VOLATILITY_TOLERANCE {
            debug!(target = %target_volatility, max_volatility = %top_vol, "efficient risk saturated");
            return Ok(problem.performance(top));
        }

        // Bracket the target. The path can sit on a vertex for a while, so
        // flat segments are doubled through rather than treated as the end.
        let mut hi_tau = Decimal::ONE;
        let mut hi = self.solve_return_weighted(problem, hi_tau, Some(lo.x.clone()))?;
        let mut steps = 0;
        while sqrt_non_negative(quad_form(&hi.x, sigma)) < target_volatility {
            if steps >= MAX_BRACKET_STEPS {
                // Tied top returns: the path ends below the greedy portfolio's volatility
                if vec_dot(&hi.x, &problem.expected_returns) >= top_return - RETURN_TOLERANCE {
                    debug!(target = %target_volatility, tau = %hi_tau, "efficient risk saturated on tie");
                    return Ok(problem.performance(problem.clamp_to_bounds(hi.x)));
                }
                return Err(FrontierError::ConvergenceFailure {
                    function: "efficient_risk".into(),
                    iterations: steps,
                });
            }
            lo_tau = hi_tau;
            lo = hi;
            hi_tau *= dec!(2);
            hi = self.solve_return_weighted(problem, hi_tau, Some(lo.x.clone()))?;
            steps += 1;
        }

        // Shrink the bracket until both ends share a working set
        let mut bisections = 0;
        while lo.states != hi.states && bisections < MAX_BISECTION_STEPS {
            let mid_tau = (lo_tau + hi_tau) / dec!(2);
            let mid = self.solve_return_weighted(problem, mid_tau, Some(lo.x.clone()))?;
            if sqrt_non_negative(quad_form(&mid.x, sigma)) < target_volatility {
                lo_tau = mid_tau;
                lo = mid;
            } else {
                hi_tau = mid_tau;
                hi = mid;
            }
            bisections += 1;
        }

        // Within one segment w(tau) is affine; solve w'Sigma w = target^2
        let segment = PathSegment::along(problem, &hi)?;
        let tau = segment
            .tau_for_variance(sigma, target_volatility * target_volatility)
            .unwrap_or(hi_tau)
            .max(lo_tau)
            .min(hi_tau);
        debug!(
            target = %target_volatility,
            tau = %tau,
            bisections,
            "efficient risk solved"
        );
        Ok(problem.performance(problem.clamp_to_bounds(segment.at(tau))))
    }
}

impl ActiveSetOptimizer {
    /// Solve `min 0.5 w'Sigma w - tau mu'w` over the fully invested box.
    fn solve_return_weighted(
        &self,
        problem: &OptimizationProblem,
        tau: Decimal,
        warm_start: Option<Vec<Decimal>>,
    ) -> FrontierResult<QpSolution> {
        let linear: Vec<Decimal> = problem.expected_returns.iter().map(|m| *m * tau).collect();
        let qp = budget_program(problem, &problem.covariance_matrix, linear);
        let start = match warm_start {
            Some(w) => w,
            None => problem.feasible_budget_start()?,
        };
        active_set::solve(&qp, start, self.max_iterations)
    }
}

/// The fully invested program `min 0.5 w'Qw - c'w`, `sum(w) = 1`, within the
/// problem's weight bounds.
fn budget_program<'a>(
    problem: &OptimizationProblem,
    quadratic: &'a [Vec<Decimal>],
    linear: Vec<Decimal>,
) -> QuadraticProgram<'a> {
    let n = problem.n_assets();
    let WeightBounds { lower, upper } = problem.weight_bounds;
    QuadraticProgram {
        quadratic,
        linear,
        constraint: vec![Decimal::ONE; n],
        target: Decimal::ONE,
        lower: vec![lower; n],
        upper: vec![Some(upper); n],
    }
}

/// `w(tau) = base + tau * direction` for a fixed working set.
struct PathSegment {
    base: Vec<Decimal>,
    direction: Vec<Decimal>,
}

impl PathSegment {
    fn along(problem: &OptimizationProblem, solution: &QpSolution) -> FrontierResult<Self> {
        let n = problem.n_assets();
        let at_zero = budget_program(problem, &problem.covariance_matrix, vec![Decimal::ZERO; n]);
        let at_one = budget_program(
            problem,
            &problem.covariance_matrix,
            problem.expected_returns.clone(),
        );
        let (base, _) = active_set::solve_working_set(&at_zero, &solution.states, &solution.x)?;
        let (unit, _) = active_set::solve_working_set(&at_one, &solution.states, &solution.x)?;
        let direction = unit
            .iter()
            .zip(base.iter())
            .zip(solution.states.iter())
            .map(|((u, b), s)| {
                if *s == BoundState::Free {
                    *u - *b
                } else {
                    Decimal::ZERO
                }
            })
            .collect();
        Ok(PathSegment { base, direction })
    }

    fn at(&self, tau: Decimal) -> Vec<Decimal> {
        self.base
            .iter()
            .zip(self.direction.iter())
            .map(|(b, d)| *b + tau * *d)
            .collect()
    }

    /// Positive root of `a tau^2 + b tau + c = 0` with
    /// `a = d'Sd`, `b = 2 base'Sd`, `c = base'S base - variance`.
    fn tau_for_variance(&self, sigma: &[Vec<Decimal>], variance: Decimal) -> Option<Decimal> {
        let a = quad_form(&self.direction, sigma);
        if a <= Decimal::ZERO {
            return None;
        }
        let sigma_d: Vec<Decimal> = sigma.iter().map(|row| vec_dot(row, &self.direction)).collect();
        let b = dec!(2) * vec_dot(&self.base, &sigma_d);
        let c = quad_form(&self.base, sigma) - variance;
        let discriminant = b * b - dec!(4) * a * c;
        let root = sqrt_non_negative(discriminant);
        Some((-b + root) / (dec!(2) * a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Decimal, b: Decimal, tol: Decimal) -> bool {
        (a - b).abs() < tol
    }

    fn diagonal_two_asset() -> OptimizationProblem {
        OptimizationProblem::new(
            vec![dec!(0.05), dec!(0.10)],
            vec![vec![dec!(0.01), dec!(0)], vec![dec!(0), dec!(0.04)]],
        )
    }

    fn three_asset() -> OptimizationProblem {
        let v1 = dec!(0.15);
        let v2 = dec!(0.20);
        let v3 = dec!(0.25);
        let c12 = dec!(0.3) * v1 * v2;
        let c13 = dec!(0.1) * v1 * v3;
        let c23 = dec!(0.5) * v2 * v3;
        OptimizationProblem::new(
            vec![dec!(0.10), dec!(0.04), dec!(0.07)],
            vec![
                vec![v1 * v1, c12, c13],
                vec![c12, v2 * v2, c23],
                vec![c13, c23, v3 * v3],
            ],
        )
    }

    #[test]
    fn test_min_volatility_diagonal() {
        // w = Sigma^-1 1 / 1'Sigma^-1 1 = (100, 25) / 125
        let perf = ActiveSetOptimizer::default()
            .min_volatility(&diagonal_two_asset())
            .unwrap();
        assert!(close(perf.weights[0], dec!(0.8), dec!(0.0000001)));
        assert!(close(perf.weights[1], dec!(0.2), dec!(0.0000001)));
        assert!(close(perf.expected_return, dec!(0.06), dec!(0.0000001)));
        assert!(perf.sharpe_ratio.is_none());
    }

    #[test]
    fn test_min_volatility_long_only_clips_shorts() {
        // Highly correlated pair where the unconstrained solution shorts B
        let p = OptimizationProblem::new(
            vec![dec!(0.05), dec!(0.08)],
            vec![vec![dec!(0.01), dec!(0.018)], vec![dec!(0.018), dec!(0.04)]],
        );
        let perf = ActiveSetOptimizer::default().min_volatility(&p).unwrap();
        assert!(close(perf.weights[0], Decimal::ONE, dec!(0.0000001)));
        assert!(close(perf.weights[1], Decimal::ZERO, dec!(0.0000001)));
    }

    #[test]
    fn test_max_sharpe_diagonal() {
        // Unconstrained tangency: Sigma^-1 (mu - rf) = (3, 2) -> (0.6, 0.4)
        let perf = ActiveSetOptimizer::default()
            .max_sharpe(&diagonal_two_asset(), dec!(0.02))
            .unwrap();
        assert!(close(perf.weights[0], dec!(0.6), dec!(0.0000001)));
        assert!(close(perf.weights[1], dec!(0.4), dec!(0.0000001)));
        let sr = perf.sharpe_ratio.unwrap();
        // ret = 0.07, var = 0.36*0.01 + 0.16*0.04 = 0.01, vol = 0.1
        assert!(close(sr, dec!(0.5), dec!(0.0000001)), "sharpe {}", sr);
    }

    #[test]
    fn test_max_sharpe_needs_excess_return() {
        let err = ActiveSetOptimizer::default()
            .max_sharpe(&diagonal_two_asset(), dec!(0.2))
            .unwrap_err();
        assert!(matches!(err, FrontierError::InvalidInput { .. }));
    }

    #[test]
    fn test_max_sharpe_rejects_leveraged_bounds() {
        let p = diagonal_two_asset().with_bounds(WeightBounds::new(dec!(-1), dec!(2)));
        assert!(ActiveSetOptimizer::default().max_sharpe(&p, dec!(0.02)).is_err());
    }

    #[test]
    fn test_max_quadratic_utility_interior() {
        // Two assets, rf-like zero-variance asset and a risky one with variance 0.04:
        // t* = (0.08 - 0.02) / (3 * 0.04) = 0.5
        let p = OptimizationProblem::new(
            vec![dec!(0.02), dec!(0.08)],
            vec![vec![dec!(0), dec!(0)], vec![dec!(0), dec!(0.04)]],
        );
        let perf = ActiveSetOptimizer::default()
            .max_quadratic_utility(&p, dec!(3))
            .unwrap();
        assert!(close(perf.weights[1], dec!(0.5), dec!(0.0000001)), "{:?}", perf.weights);
    }

    #[test]
    fn test_max_quadratic_utility_hits_leverage_bound() {
        let p = OptimizationProblem::new(
            vec![dec!(0.02), dec!(0.08)],
            vec![vec![dec!(0), dec!(0)], vec![dec!(0), dec!(0.04)]],
        )
        .with_bounds(WeightBounds::new(dec!(-2), dec!(3)));
        let perf = ActiveSetOptimizer::default()
            .max_quadratic_utility(&p, dec!(0.000001))
            .unwrap();
        assert!(close(perf.weights[1], dec!(3), dec!(0.0000001)));
        assert!(close(perf.weights[0], dec!(-2), dec!(0.0000001)));
    }

    #[test]
    fn test_max_quadratic_utility_rejects_non_positive_aversion() {
        assert!(ActiveSetOptimizer::default()
            .max_quadratic_utility(&diagonal_two_asset(), Decimal::ZERO)
            .is_err());
    }

    #[test]
    fn test_efficient_risk_hits_target() {
        let opt = ActiveSetOptimizer::default();
        let p = three_asset();
        let min_vol = opt.min_volatility(&p).unwrap().volatility;
        let target = min_vol + dec!(0.01);
        let perf = opt.efficient_risk(&p, target).unwrap();
        assert!(
            close(perf.volatility, target, dec!(0.000001)),
            "vol {} target {}",
            perf.volatility,
            target
        );
        let total: Decimal = perf.weights.iter().copied().sum();
        assert!(close(total, Decimal::ONE, dec!(0.0000001)));
        assert!(perf.weights.iter().all(|w| *w >= dec!(-0.0000001)));
    }

    #[test]
    fn test_efficient_risk_saturates_at_max_return() {
        let opt = ActiveSetOptimizer::default();
        let p = three_asset();
        // Well above every asset's volatility: all in the 10% asset
        let perf = opt.efficient_risk(&p, dec!(0.5)).unwrap();
        assert!(close(perf.weights[0], Decimal::ONE, dec!(0.0000001)), "{:?}", perf.weights);
        assert!(close(perf.expected_return, dec!(0.10), dec!(0.0000001)));
    }

    #[test]
    fn test_efficient_risk_below_minimum_rejected() {
        let opt = ActiveSetOptimizer::default();
        assert!(opt.efficient_risk(&three_asset(), dec!(0.01)).is_err());
    }

    #[test]
    fn test_efficient_risk_return_increases_with_target() {
        let opt = ActiveSetOptimizer::default();
        let p = diagonal_two_asset();
        let a = opt.efficient_risk(&p, dec!(0.10)).unwrap();
        let b = opt.efficient_risk(&p, dec!(0.15)).unwrap();
        assert!(b.expected_return > a.expected_return);
    }

    #[test]
    fn test_efficient_risk_leaves_min_vol_vertex() {
        // Min-vol is the corner (1, 0) and stays there until tau = 1.1
        let p = OptimizationProblem::new(
            vec![dec!(0.04), dec!(0.045)],
            vec![vec![dec!(0.0025), dec!(0.008)], vec![dec!(0.008), dec!(0.04)]],
        );
        let opt = ActiveSetOptimizer::default();
        let top = opt.efficient_risk(&p, dec!(0.2)).unwrap();
        assert_eq!(top.weights, vec![Decimal::ZERO, Decimal::ONE]);
        assert!(close(top.expected_return, dec!(0.045), dec!(0.0000001)));

        let mid = opt.efficient_risk(&p, dec!(0.1)).unwrap();
        assert!(close(mid.volatility, dec!(0.1), dec!(0.000001)), "vol {}", mid.volatility);
        assert!(mid.weights[1] > Decimal::ZERO && mid.weights[1] < Decimal::ONE);
    }

    #[test]
    fn test_efficient_risk_long_flat_stretch_before_path_moves() {
        // Returns differ by one basis point, so the path leaves (1, 0) only past tau = 80
        let p = OptimizationProblem::new(
            vec![dec!(0.05), dec!(0.0501)],
            vec![vec![dec!(0.01), dec!(0.018)], vec![dec!(0.018), dec!(0.04)]],
        );
        let opt = ActiveSetOptimizer::default();
        let top = opt.efficient_risk(&p, dec!(0.2)).unwrap();
        assert_eq!(top.weights, vec![Decimal::ZERO, Decimal::ONE]);

        let mid = opt.efficient_risk(&p, dec!(0.15)).unwrap();
        assert!(close(mid.volatility, dec!(0.15), dec!(0.000001)), "vol {}", mid.volatility);
        assert!(mid.expected_return > dec!(0.05));
    }

    #[test]
    fn test_efficient_risk_tied_top_returns() {
        // Both assets return 5%; the frontier tops out at the min-variance mix
        let p = OptimizationProblem::new(
            vec![dec!(0.05), dec!(0.05), dec!(0.03)],
            vec![
                vec![dec!(0.04), dec!(0), dec!(0)],
                vec![dec!(0), dec!(0.09), dec!(0)],
                vec![dec!(0), dec!(0), dec!(0.0025)],
            ],
        );
        let perf = ActiveSetOptimizer::default()
            .efficient_risk(&p, dec!(0.19))
            .unwrap();
        assert!(close(perf.expected_return, dec!(0.05), dec!(0.0000001)));
        assert!(perf.volatility <= dec!(0.19));
    }

    #[test]
    fn test_weights_respect_long_only_bound_exactly() {
        let opt = ActiveSetOptimizer::default();
        let p = three_asset();
        let min_vol = opt.min_volatility(&p).unwrap().volatility;
        for step in 1..6 {
            let target = min_vol + Decimal::from(step) * dec!(0.01);
            let perf = opt.efficient_risk(&p, target).unwrap();
            assert!(
                perf.weights.iter().all(|w| *w >= Decimal::ZERO),
                "target {} weights {:?}",
                target,
                perf.weights
            );
        }
        let tangency = opt.max_sharpe(&p, dec!(0.02)).unwrap();
        assert!(tangency.weights.iter().all(|w| *w >= Decimal::ZERO));
    }

    #[test]
    fn test_max_sharpe_zero_volatility_tangency() {
        // A riskless asset paying above rf has unbounded Sharpe ratio
        let p = OptimizationProblem::new(
            vec![dec!(0.05), dec!(0.10)],
            vec![vec![dec!(0), dec!(0)], vec![dec!(0), dec!(0.04)]],
        );
        let err = ActiveSetOptimizer::default()
            .max_sharpe(&p, dec!(0.02))
            .unwrap_err();
        assert!(matches!(err, FrontierError::DivisionByZero { .. }), "{}", err);
    }

    #[test]
    fn test_singular_covariance_propagates() {
        let p = OptimizationProblem::new(
            vec![dec!(0.05), dec!(0.05)],
            vec![vec![dec!(0.04), dec!(0.04)], vec![dec!(0.04), dec!(0.04)]],
        );
        let err = ActiveSetOptimizer::default().min_volatility(&p).unwrap_err();
        assert!(matches!(err, FrontierError::SingularMatrix(_)), "{}", err);
    }
}
