use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::elicitation::Leverage;
use crate::error::FrontierError;
use crate::market_data::MarketInputs;
use crate::optimization::{
    OptimizationProblem, PortfolioOptimizer, PortfolioPerformance, WeightBounds,
};
use crate::types::{Rate, Weight};
use crate::FrontierResult;

/// Default number of target-volatility points in the frontier sweep.
pub const DEFAULT_FRONTIER_POINTS: usize = 200;

/// Default CML end point, as a fraction of the largest asset volatility.
pub const DEFAULT_CML_ANCHOR: Decimal = dec!(0.8);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which tangency statistic fills the risky cell of the two-asset covariance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TangencyDispersion {
    /// The tangency volatility itself. Dimensionally a standard deviation, not
    /// a variance.
    #[default]
    Volatility,
    /// The tangency variance (volatility squared).
    Variance,
}

/// Tunable knobs of a derivation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivationSettings {
    #[serde(default = "default_frontier_points")]
    pub frontier_points: usize,
    #[serde(default = "default_cml_anchor")]
    pub cml_anchor: Decimal,
    #[serde(default)]
    pub tangency_dispersion: TangencyDispersion,
}

fn default_frontier_points() -> usize {
    DEFAULT_FRONTIER_POINTS
}

fn default_cml_anchor() -> Decimal {
    DEFAULT_CML_ANCHOR
}

impl Default for DerivationSettings {
    fn default() -> Self {
        DerivationSettings {
            frontier_points: DEFAULT_FRONTIER_POINTS,
            cml_anchor: DEFAULT_CML_ANCHOR,
            tangency_dispersion: TangencyDispersion::default(),
        }
    }
}

/// A named portfolio on the risk/return plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioPoint {
    pub weights: Vec<Weight>,
    pub expected_return: Rate,
    pub volatility: Rate,
    pub sharpe_ratio: Decimal,
}

/// One solved point of the target-risk sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierPoint {
    pub target_volatility: Rate,
    pub volatility: Rate,
    pub expected_return: Rate,
    pub sharpe_ratio: Decimal,
    pub weights: Vec<Weight>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierSweep {
    /// Minimum-volatility standard deviation.
    pub lower: Rate,
    /// Largest standalone asset volatility.
    pub upper: Rate,
    /// Empty when `upper <= lower`.
    pub points: Vec<FrontierPoint>,
}

/// Segment from the risk-free asset along the tangency Sharpe ratio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalMarketLine {
    pub start: (Rate, Rate),
    pub end: (Rate, Rate),
    pub intercept: Rate,
    pub slope: Decimal,
}

impl CapitalMarketLine {
    pub fn expected_return_at(&self, volatility: Rate) -> Rate {
        self.intercept + self.slope * volatility
    }
}

/// Investor's choice between the risk-free asset and the tangency portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxUtilityPortfolio {
    pub risk_free_weight: Weight,
    pub tangency_weight: Weight,
    /// `tangency_weight * tangency_volatility`
    pub volatility: Rate,
    /// `volatility * tangency_sharpe + rf`
    pub expected_return: Rate,
    pub weight_bounds: WeightBounds,
    pub at_leverage_bound: bool,
    /// What the optimizer itself reports for the two-asset problem.
    /// Not used for the point above.
    pub optimizer_expected_return: Rate,
    pub optimizer_volatility: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioDerivation {
    pub min_volatility: PortfolioPoint,
    pub frontier: FrontierSweep,
    pub tangency: PortfolioPoint,
    pub capital_market_line: CapitalMarketLine,
    pub max_utility: MaxUtilityPortfolio,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run the six derivation steps in order. Each later step depends on the
/// results of earlier ones.
pub fn derive_portfolios<O: PortfolioOptimizer + ?Sized>(
    optimizer: &O,
    market: &MarketInputs,
    risk_aversion: Decimal,
    leverage: Leverage,
    settings: &DerivationSettings,
) -> FrontierResult<PortfolioDerivation> {
    market.validate()?;
    if risk_aversion <= Decimal::ZERO {
        return Err(FrontierError::InvalidInput {
            field: "risk_aversion".into(),
            reason: format!("must be positive, got {}", risk_aversion),
        });
    }
    let rf = market.risk_free_rate;
    let problem = market.problem();

    // 1. Minimum volatility
    let min_vol = optimizer.min_volatility(&problem)?;
    let min_volatility = to_point(&min_vol, rf);

    // 2. Target-risk sweep
    let upper = market.max_asset_volatility();
    let frontier = sweep_frontier(
        optimizer,
        &problem,
        rf,
        min_volatility.volatility,
        upper,
        settings.frontier_points,
    )?;

    // 3. Tangency
    let tangency_perf = optimizer.max_sharpe(&problem, rf)?;
    let tangency = to_point(&tangency_perf, rf);

    // 4. Capital market line
    let capital_market_line =
        capital_market_line(rf, tangency.sharpe_ratio, upper, settings.cml_anchor);

    // 5-6. Two-asset reduction and CML recovery
    let max_utility = max_utility_portfolio(
        optimizer,
        &tangency,
        rf,
        risk_aversion,
        leverage,
        settings.tangency_dispersion,
    )?;

    debug!(
        min_volatility = %min_volatility.volatility,
        tangency_sharpe = %tangency.sharpe_ratio,
        tangency_weight = %max_utility.tangency_weight,
        frontier_points = frontier.points.len(),
        "portfolios derived"
    );

    Ok(PortfolioDerivation {
        min_volatility,
        frontier,
        tangency,
        capital_market_line,
        max_utility,
    })
}

/// `points` evenly spaced target volatilities over `[lower, upper]`,
/// both ends included. Empty when `upper <= lower`.
pub fn sweep_targets(lower: Rate, upper: Rate, points: usize) -> Vec<Rate> {
    if upper <= lower || points == 0 {
        return Vec::new();
    }
    if points == 1 {
        return vec![lower];
    }
    let step = (upper - lower) / Decimal::from((points - 1) as u64);
    (0..points)
        .map(|i| {
            if i == points - 1 {
                upper
            } else {
                lower + step * Decimal::from(i as u64)
            }
        })
        .collect()
}

/// Line through `(0, rf)` and `(anchor * max_vol, rf + anchor * max_vol * sharpe)`.
pub fn capital_market_line(
    rf: Rate,
    tangency_sharpe: Decimal,
    max_asset_volatility: Rate,
    anchor: Decimal,
) -> CapitalMarketLine {
    let x_end = max_asset_volatility * anchor;
    CapitalMarketLine {
        start: (Decimal::ZERO, rf),
        end: (x_end, x_end * tangency_sharpe + rf),
        intercept: rf,
        slope: tangency_sharpe,
    }
}

/// Two-asset covariance `[[0, 0], [0, d]]` for the risk-free / tangency pair.
pub fn two_asset_covariance(
    tangency_volatility: Rate,
    dispersion: TangencyDispersion,
) -> Vec<Vec<Decimal>> {
    let d = match dispersion {
        TangencyDispersion::Volatility => tangency_volatility,
        TangencyDispersion::Variance => tangency_volatility * tangency_volatility,
    };
    vec![vec![Decimal::ZERO, Decimal::ZERO], vec![Decimal::ZERO, d]]
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

fn sweep_frontier<O: PortfolioOptimizer + ?Sized>(
    optimizer: &O,
    problem: &OptimizationProblem,
    rf: Rate,
    lower: Rate,
    upper: Rate,
    points: usize,
) -> FrontierResult<FrontierSweep> {
    let targets = sweep_targets(lower, upper, points);
    let mut solved = Vec::with_capacity(targets.len());
    for target in targets {
        let perf = optimizer.efficient_risk(problem, target)?;
        solved.push(FrontierPoint {
            target_volatility: target,
            volatility: perf.volatility,
            expected_return: perf.expected_return,
            sharpe_ratio: sharpe(perf.expected_return, rf, perf.volatility),
            weights: perf.weights,
        });
    }
    Ok(FrontierSweep {
        lower,
        upper,
        points: solved,
    })
}

fn max_utility_portfolio<O: PortfolioOptimizer + ?Sized>(
    optimizer: &O,
    tangency: &PortfolioPoint,
    rf: Rate,
    risk_aversion: Decimal,
    leverage: Leverage,
    dispersion: TangencyDispersion,
) -> FrontierResult<MaxUtilityPortfolio> {
    let (lower, upper) = leverage.weight_bounds();
    let bounds = WeightBounds::new(lower, upper);
    let problem = OptimizationProblem::new(
        vec![rf, tangency.expected_return],
        two_asset_covariance(tangency.volatility, dispersion),
    )
    .with_bounds(bounds);

    let solved = optimizer.max_quadratic_utility(&problem, risk_aversion)?;
    let tangency_weight = solved.weights[1];

    // Point is read off the CML; optimizer volatility is only exact when d is
    // the tangency variance.
    let volatility = tangency_weight * tangency.volatility;
    let expected_return = volatility * tangency.sharpe_ratio + rf;

    let slack = dec!(0.0000001);
    let at_leverage_bound =
        (tangency_weight - upper).abs() < slack || (tangency_weight - lower).abs() < slack;

    Ok(MaxUtilityPortfolio {
        risk_free_weight: solved.weights[0],
        tangency_weight,
        volatility,
        expected_return,
        weight_bounds: bounds,
        at_leverage_bound,
        optimizer_expected_return: solved.expected_return,
        optimizer_volatility: solved.volatility,
    })
}

fn to_point(perf: &PortfolioPerformance, rf: Rate) -> PortfolioPoint {
    PortfolioPoint {
        weights: perf.weights.clone(),
        expected_return: perf.expected_return,
        volatility: perf.volatility,
        sharpe_ratio: perf
            .sharpe_ratio
            .unwrap_or_else(|| sharpe(perf.expected_return, rf, perf.volatility)),
    }
}

fn sharpe(ret: Rate, rf: Rate, vol: Rate) -> Decimal {
    if vol.is_zero() {
        Decimal::ZERO
    } else {
        (ret - rf) / vol
    }
}
