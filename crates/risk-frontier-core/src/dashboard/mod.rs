//! End-to-end dashboard evaluation: questionnaire answers, leverage and market
//! inputs in; risk aversion, the derived portfolios and chart data out.

pub mod chart;
pub mod derivation;

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::elicitation::{assess_risk_aversion, Leverage, RiskAversionInput, RiskAversionOutput};
use crate::market_data::MarketInputs;
use crate::optimization::{ActiveSetOptimizer, PortfolioOptimizer};
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::FrontierResult;

pub use chart::{build_chart, ChartData, ChartPoint, ChartSeries, Marker, SeriesKind};
pub use derivation::{
    capital_market_line, derive_portfolios, sweep_targets, two_asset_covariance,
    CapitalMarketLine, DerivationSettings, FrontierPoint, FrontierSweep, MaxUtilityPortfolio,
    PortfolioDerivation, PortfolioPoint, TangencyDispersion, DEFAULT_CML_ANCHOR,
    DEFAULT_FRONTIER_POINTS,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardInput {
    /// Willingness-to-pay answers for the six lotteries.
    pub responses: Vec<Money>,
    #[serde(default)]
    pub leverage: Leverage,
    pub market: MarketInputs,
    #[serde(default)]
    pub settings: DerivationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardOutput {
    pub risk_aversion: RiskAversionOutput,
    pub leverage: Leverage,
    pub portfolios: PortfolioDerivation,
    pub chart: ChartData,
}

/// Evaluate the dashboard with the default optimizer.
pub fn evaluate_dashboard(input: &DashboardInput) -> FrontierResult<ComputationOutput<DashboardOutput>> {
    evaluate_dashboard_with(&ActiveSetOptimizer::default(), input)
}

/// Evaluate the dashboard with any optimizer. Pure: the same input always
/// yields the same output.
pub fn evaluate_dashboard_with<O: PortfolioOptimizer + ?Sized>(
    optimizer: &O,
    input: &DashboardInput,
) -> FrontierResult<ComputationOutput<DashboardOutput>> {
    let start = Instant::now();

    let assessed = assess_risk_aversion(&RiskAversionInput {
        responses: input.responses.clone(),
    })?;
    let mut warnings = assessed.warnings;
    let risk_aversion = assessed.result;

    let portfolios = derive_portfolios(
        optimizer,
        &input.market,
        risk_aversion.risk_aversion,
        input.leverage,
        &input.settings,
    )?;

    if portfolios.frontier.points.is_empty() {
        warnings.push(format!(
            "Frontier sweep is empty: minimum volatility {} is not below the largest asset volatility {}",
            portfolios.frontier.lower, portfolios.frontier.upper
        ));
    }
    if portfolios.max_utility.at_leverage_bound {
        warnings.push(format!(
            "Tangency weight {} is pinned at a leverage bound [{}, {}]",
            portfolios.max_utility.tangency_weight,
            portfolios.max_utility.weight_bounds.lower,
            portfolios.max_utility.weight_bounds.upper
        ));
    }
    if input.settings.tangency_dispersion == TangencyDispersion::Volatility {
        warnings.push(
            "Two-asset covariance uses the tangency volatility in the variance cell; \
             optimizer-reported volatility differs from the plotted point"
                .into(),
        );
    }

    let chart = build_chart(&input.market, &portfolios);

    info!(
        assets = input.market.asset_names.len(),
        leverage = input.leverage.value(),
        risk_aversion = %risk_aversion.risk_aversion,
        max_util_volatility = %portfolios.max_utility.volatility,
        max_util_return = %portfolios.max_utility.expected_return,
        "dashboard evaluated"
    );

    let output = DashboardOutput {
        risk_aversion,
        leverage: input.leverage,
        portfolios,
        chart,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Mean-variance frontier, tangency portfolio and quadratic-utility allocation along the CML",
        &serde_json::json!({
            "frontier_points": input.settings.frontier_points,
            "cml_anchor": input.settings.cml_anchor.to_string(),
            "tangency_dispersion": input.settings.tangency_dispersion,
            "weights": "long-only, fully invested for risky assets",
            "leverage": input.leverage.value(),
        }),
        warnings,
        elapsed,
        output,
    ))
}
