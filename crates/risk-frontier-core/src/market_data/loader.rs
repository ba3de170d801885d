//! Readers for the three static input files:
//!
//! - `risk_free_rate.txt`: one number
//! - `e_returns.csv`: header row, then `asset,expected_return`
//! - `cov_mat.csv`: header `,asset_1,...,asset_n`, then one row per asset

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use super::MarketInputs;
use crate::error::FrontierError;
use crate::types::Rate;
use crate::FrontierResult;

pub const RISK_FREE_RATE_FILE: &str = "risk_free_rate.txt";
pub const EXPECTED_RETURNS_FILE: &str = "e_returns.csv";
pub const COVARIANCE_FILE: &str = "cov_mat.csv";

/// Load and align all market inputs from `dir`.
pub fn load_market_inputs(dir: &Path) -> FrontierResult<MarketInputs> {
    let rf_text = fs::read_to_string(dir.join(RISK_FREE_RATE_FILE))?;
    let risk_free_rate = parse_risk_free_rate(&rf_text)?;
    let returns = read_expected_returns(fs::File::open(dir.join(EXPECTED_RETURNS_FILE))?)?;
    let (cov_names, cov) = read_covariance_matrix(fs::File::open(dir.join(COVARIANCE_FILE))?)?;

    let inputs = align(returns, &cov_names, &cov, risk_free_rate)?;
    debug!(
        dir = %dir.display(),
        assets = inputs.asset_names.len(),
        risk_free_rate = %inputs.risk_free_rate,
        "market inputs loaded"
    );
    Ok(inputs)
}

/// Parse the risk-free rate file; surrounding whitespace is ignored.
pub fn parse_risk_free_rate(text: &str) -> FrontierResult<Rate> {
    parse_number(text.trim(), RISK_FREE_RATE_FILE)
}

/// Read `(asset, expected_return)` pairs in file order.
pub fn read_expected_returns<R: Read>(reader: R) -> FrontierResult<Vec<(String, Rate)>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut out = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if record.len() < 2 {
            return Err(FrontierError::Parse {
                origin: EXPECTED_RETURNS_FILE.into(),
                reason: format!("row {} needs an asset id and a value", out.len() + 1),
            });
        }
        let value = parse_number(&record[1], EXPECTED_RETURNS_FILE)?;
        out.push((record[0].to_string(), value));
    }
    if out.is_empty() {
        return Err(FrontierError::InsufficientData(format!(
            "{} has no rows",
            EXPECTED_RETURNS_FILE
        )));
    }
    Ok(out)
}

/// Read a labelled square covariance matrix. Returns the column labels and
/// the matrix with rows reordered to match them.
pub fn read_covariance_matrix<R: Read>(
    reader: R,
) -> FrontierResult<(Vec<String>, Vec<Vec<Decimal>>)> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let names: Vec<String> = rdr.headers()?.iter().skip(1).map(str::to_string).collect();
    let n = names.len();

    let mut rows: HashMap<String, Vec<Decimal>> = HashMap::with_capacity(n);
    for record in rdr.records() {
        let record = record?;
        let label = record.get(0).unwrap_or_default().to_string();
        if record.len() != n + 1 {
            return Err(FrontierError::Parse {
                origin: COVARIANCE_FILE.into(),
                reason: format!(
                    "row '{}' has {} values, expected {}",
                    label,
                    record.len().saturating_sub(1),
                    n
                ),
            });
        }
        let values = record
            .iter()
            .skip(1)
            .map(|v| parse_number(v, COVARIANCE_FILE))
            .collect::<FrontierResult<Vec<_>>>()?;
        if rows.insert(label.clone(), values).is_some() {
            return Err(FrontierError::Parse {
                origin: COVARIANCE_FILE.into(),
                reason: format!("duplicate row '{}'", label),
            });
        }
    }

    let mut matrix = Vec::with_capacity(n);
    for name in &names {
        let row = rows.remove(name).ok_or_else(|| FrontierError::Parse {
            origin: COVARIANCE_FILE.into(),
            reason: format!("column '{}' has no matching row", name),
        })?;
        matrix.push(row);
    }
    if let Some(extra) = rows.keys().next() {
        return Err(FrontierError::Parse {
            origin: COVARIANCE_FILE.into(),
            reason: format!("row '{}' has no matching column", extra),
        });
    }
    Ok((names, matrix))
}

/// Reorder the covariance matrix into expected-return order.
fn align(
    returns: Vec<(String, Rate)>,
    cov_names: &[String],
    cov: &[Vec<Decimal>],
    risk_free_rate: Rate,
) -> FrontierResult<MarketInputs> {
    if returns.len() != cov_names.len() {
        return Err(FrontierError::InvalidInput {
            field: "covariance_matrix".into(),
            reason: format!(
                "{} expected returns but a {}x{} covariance matrix",
                returns.len(),
                cov_names.len(),
                cov_names.len()
            ),
        });
    }
    let position: HashMap<&str, usize> = cov_names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    let order = returns
        .iter()
        .map(|(name, _)| {
            position
                .get(name.as_str())
                .copied()
                .ok_or_else(|| FrontierError::InvalidInput {
                    field: "covariance_matrix".into(),
                    reason: format!("no covariance entry for asset '{}'", name),
                })
        })
        .collect::<FrontierResult<Vec<usize>>>()?;

    let covariance_matrix = order
        .iter()
        .map(|&i| order.iter().map(|&j| cov[i][j]).collect())
        .collect();
    let (asset_names, expected_returns) = returns.into_iter().unzip();

    let inputs = MarketInputs {
        asset_names,
        expected_returns,
        covariance_matrix,
        risk_free_rate,
    };
    inputs.validate()?;
    Ok(inputs)
}

/// Plain or scientific notation (`0.0123`, `1.23e-02`).
fn parse_number(text: &str, origin: &str) -> FrontierResult<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|e| FrontierError::Parse {
            origin: origin.to_string(),
            reason: format!("'{}' is not a number: {}", text, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_risk_free_rate() {
        assert_eq!(parse_risk_free_rate(" 0.0425\n").unwrap(), dec!(0.0425));
        assert_eq!(parse_risk_free_rate("4.25e-2").unwrap(), dec!(0.0425));
        assert!(parse_risk_free_rate("four percent").is_err());
        assert!(parse_risk_free_rate("").is_err());
    }

    #[test]
    fn test_read_expected_returns() {
        let csv = "ticker,mu\nAAPL,0.12\nMSFT,1.0e-01\n";
        let rows = read_expected_returns(csv.as_bytes()).unwrap();
        assert_eq!(
            rows,
            vec![("AAPL".to_string(), dec!(0.12)), ("MSFT".to_string(), dec!(0.1))]
        );
    }

    #[test]
    fn test_read_covariance_reorders_rows() {
        let csv = ",A,B\nB,0.01,0.04\nA,0.09,0.01\n";
        let (names, m) = read_covariance_matrix(csv.as_bytes()).unwrap();
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(
            m,
            vec![vec![dec!(0.09), dec!(0.01)], vec![dec!(0.01), dec!(0.04)]]
        );
    }

    #[test]
    fn test_covariance_missing_row() {
        let csv = ",A,B\nA,0.09,0.01\nC,0.01,0.04\n";
        assert!(read_covariance_matrix(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_covariance_short_row() {
        let csv = ",A,B\nA,0.09\nB,0.01,0.04\n";
        assert!(read_covariance_matrix(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_align_to_return_order() {
        let returns = vec![("B".to_string(), dec!(0.10)), ("A".to_string(), dec!(0.05))];
        let names = vec!["A".to_string(), "B".to_string()];
        let cov = vec![vec![dec!(0.01), dec!(0.002)], vec![dec!(0.002), dec!(0.04)]];
        let m = align(returns, &names, &cov, dec!(0.02)).unwrap();
        assert_eq!(m.asset_names, vec!["B".to_string(), "A".to_string()]);
        assert_eq!(
            m.covariance_matrix,
            vec![vec![dec!(0.04), dec!(0.002)], vec![dec!(0.002), dec!(0.01)]]
        );
    }

    #[test]
    fn test_align_unknown_asset() {
        let returns = vec![("Z".to_string(), dec!(0.10)), ("A".to_string(), dec!(0.05))];
        let names = vec!["A".to_string(), "B".to_string()];
        let cov = vec![vec![dec!(0.01), dec!(0)], vec![dec!(0), dec!(0.04)]];
        assert!(align(returns, &names, &cov, dec!(0.02)).is_err());
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let err = load_market_inputs(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, FrontierError::Io(_)));
    }
}
