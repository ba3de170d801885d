use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

use risk_frontier_core::dashboard::{
    self, DashboardInput, DerivationSettings, TangencyDispersion,
};
use risk_frontier_core::elicitation::{default_responses, Leverage};
use risk_frontier_core::market_data::{self, MarketInputs};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DispersionArg {
    Volatility,
    Variance,
}

impl From<DispersionArg> for TangencyDispersion {
    fn from(d: DispersionArg) -> Self {
        match d {
            DispersionArg::Volatility => TangencyDispersion::Volatility,
            DispersionArg::Variance => TangencyDispersion::Variance,
        }
    }
}

/// Arguments for the full dashboard evaluation
#[derive(Args)]
pub struct DashboardArgs {
    /// Path to a JSON or YAML request; flags below override its fields
    #[arg(long)]
    pub input: Option<String>,

    /// Directory holding risk_free_rate.txt, e_returns.csv and cov_mat.csv
    #[arg(long, default_value = "inputs")]
    pub inputs_dir: PathBuf,

    /// Comma-separated willingness-to-pay answers (defaults to each expected value)
    #[arg(long, value_delimiter = ',')]
    pub answers: Option<Vec<Decimal>>,

    /// Maximum leverage, 1 to 10
    #[arg(long)]
    pub leverage: Option<u32>,

    /// Number of target volatilities in the frontier sweep
    #[arg(long)]
    pub frontier_points: Option<usize>,

    /// CML end point as a fraction of the largest asset volatility
    #[arg(long)]
    pub cml_anchor: Option<Decimal>,

    /// Statistic placed in the two-asset covariance cell
    #[arg(long, value_enum)]
    pub tangency_dispersion: Option<DispersionArg>,
}

/// Partial request; anything missing comes from flags or defaults.
#[derive(Debug, Default, Deserialize)]
struct DashboardRequest {
    responses: Option<Vec<Decimal>>,
    leverage: Option<Leverage>,
    market: Option<MarketInputs>,
    settings: Option<DerivationSettings>,
}

pub fn run_dashboard(args: DashboardArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: DashboardRequest = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        DashboardRequest::default()
    };

    let market = match request.market {
        Some(m) => m,
        None => {
            debug!(dir = %args.inputs_dir.display(), "loading market inputs");
            market_data::load_market_inputs(&args.inputs_dir)?
        }
    };

    let leverage = match args.leverage {
        Some(l) => Leverage::new(l)?,
        None => request.leverage.unwrap_or_default(),
    };

    let mut settings = request.settings.unwrap_or_default();
    if let Some(n) = args.frontier_points {
        settings.frontier_points = n;
    }
    if let Some(a) = args.cml_anchor {
        settings.cml_anchor = a;
    }
    if let Some(d) = args.tangency_dispersion {
        settings.tangency_dispersion = d.into();
    }

    let responses = args
        .answers
        .or(request.responses)
        .unwrap_or_else(default_responses);

    let dashboard_input = DashboardInput {
        responses,
        leverage,
        market,
        settings,
    };
    let result = dashboard::evaluate_dashboard(&dashboard_input)?;
    Ok(serde_json::to_value(result)?)
}
