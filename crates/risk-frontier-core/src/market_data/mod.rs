//! Static market inputs: expected returns, covariance and the risk-free rate.

#[cfg(feature = "market_data")]
pub mod loader;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FrontierError;
use crate::optimization::{validate_covariance_matrix, OptimizationProblem};
use crate::types::Rate;
use crate::FrontierResult;

#[cfg(feature = "market_data")]
pub use loader::{
    load_market_inputs, parse_risk_free_rate, read_covariance_matrix, read_expected_returns,
    COVARIANCE_FILE, EXPECTED_RETURNS_FILE, RISK_FREE_RATE_FILE,
};

/// Read-only market description shared by every derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketInputs {
    pub asset_names: Vec<String>,
    /// Expected return per asset, aligned with `asset_names`.
    pub expected_returns: Vec<Rate>,
    /// Square covariance matrix, rows and columns aligned with `asset_names`.
    pub covariance_matrix: Vec<Vec<Decimal>>,
    pub risk_free_rate: Rate,
}

impl MarketInputs {
    pub fn validate(&self) -> FrontierResult<()> {
        let n = self.asset_names.len();
        if n == 0 {
            return Err(FrontierError::InsufficientData(
                "At least one asset required".into(),
            ));
        }
        if self.expected_returns.len() != n {
            return Err(FrontierError::InvalidInput {
                field: "expected_returns".into(),
                reason: format!(
                    "Expected {} returns but got {}",
                    n,
                    self.expected_returns.len()
                ),
            });
        }
        validate_covariance_matrix(&self.covariance_matrix, n)
    }

    /// Long-only, fully invested problem over the full universe.
    pub fn problem(&self) -> OptimizationProblem {
        OptimizationProblem::new(self.expected_returns.clone(), self.covariance_matrix.clone())
    }

    /// Standalone volatility of each asset.
    pub fn asset_volatilities(&self) -> Vec<Rate> {
        self.problem().asset_volatilities()
    }

    /// Largest standalone volatility in the universe.
    pub fn max_asset_volatility(&self) -> Rate {
        self.asset_volatilities()
            .into_iter()
            .fold(Decimal::ZERO, Decimal::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> MarketInputs {
        MarketInputs {
            asset_names: vec!["LOW".into(), "HIGH".into()],
            expected_returns: vec![dec!(0.05), dec!(0.10)],
            covariance_matrix: vec![vec![dec!(0.01), dec!(0)], vec![dec!(0), dec!(0.04)]],
            risk_free_rate: dec!(0.02),
        }
    }

    #[test]
    fn test_max_asset_volatility() {
        let m = sample();
        assert!((m.max_asset_volatility() - dec!(0.2)).abs() < dec!(0.0000000001));
    }

    #[test]
    fn test_validate_length_mismatch() {
        let mut m = sample();
        m.expected_returns.push(dec!(0.2));
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_validate_empty() {
        let m = MarketInputs {
            asset_names: vec![],
            expected_returns: vec![],
            covariance_matrix: vec![],
            risk_free_rate: dec!(0.02),
        };
        assert!(matches!(
            m.validate(),
            Err(FrontierError::InsufficientData(_))
        ));
    }
}
