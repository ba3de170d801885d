use risk_frontier_core::dashboard::{derive_portfolios, sweep_targets, DerivationSettings};
use risk_frontier_core::elicitation::Leverage;
use risk_frontier_core::market_data::MarketInputs;
use risk_frontier_core::optimization::{
    ActiveSetOptimizer, OptimizationProblem, PortfolioOptimizer,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn close(a: Decimal, b: Decimal, tol: Decimal) -> bool {
    (a - b).abs() < tol
}

fn diagonal_market() -> MarketInputs {
    MarketInputs {
        asset_names: vec!["LOW".into(), "HIGH".into()],
        expected_returns: vec![dec!(0.05), dec!(0.10)],
        covariance_matrix: vec![vec![dec!(0.01), dec!(0)], vec![dec!(0), dec!(0.04)]],
        risk_free_rate: dec!(0.02),
    }
}

fn correlated_market() -> MarketInputs {
    let v = [dec!(0.15), dec!(0.20), dec!(0.25), dec!(0.18)];
    let rho = [
        [dec!(1), dec!(0.3), dec!(0.1), dec!(0.2)],
        [dec!(0.3), dec!(1), dec!(0.5), dec!(0.4)],
        [dec!(0.1), dec!(0.5), dec!(1), dec!(0.25)],
        [dec!(0.2), dec!(0.4), dec!(0.25), dec!(1)],
    ];
    let cov: Vec<Vec<Decimal>> = (0..4)
        .map(|i| (0..4).map(|j| rho[i][j] * v[i] * v[j]).collect::<Vec<_>>())
        .collect();
    MarketInputs {
        asset_names: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        expected_returns: vec![dec!(0.10), dec!(0.04), dec!(0.12), dec!(0.08)],
        covariance_matrix: cov,
        risk_free_rate: dec!(0.03),
    }
}

// ---------------------------------------------------------------------------
// Minimum volatility
// ---------------------------------------------------------------------------

#[test]
fn test_min_volatility_two_uncorrelated_assets() {
    // Inverse-variance weights: (1/0.01, 1/0.04) normalised = (0.8, 0.2)
    let perf = ActiveSetOptimizer::default()
        .min_volatility(&diagonal_market().problem())
        .unwrap();
    assert!(close(perf.weights[0], dec!(0.8), dec!(0.0000001)), "{:?}", perf.weights);
    assert!(close(perf.weights[1], dec!(0.2), dec!(0.0000001)), "{:?}", perf.weights);
    assert!(
        close(perf.volatility * perf.volatility, dec!(0.008), dec!(0.0000001)),
        "vol {}",
        perf.volatility
    );
}

#[test]
fn test_min_volatility_below_every_frontier_point() {
    let market = correlated_market();
    let settings = DerivationSettings {
        frontier_points: 25,
        ..DerivationSettings::default()
    };
    let d = derive_portfolios(
        &ActiveSetOptimizer::default(),
        &market,
        dec!(2),
        Leverage::default(),
        &settings,
    )
    .unwrap();
    assert_eq!(d.frontier.points.len(), 25);
    for p in &d.frontier.points {
        assert!(
            p.volatility >= d.min_volatility.volatility - dec!(0.000001),
            "frontier vol {} below minimum {}",
            p.volatility,
            d.min_volatility.volatility
        );
    }
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

#[test]
fn test_sweep_bounds_two_assets() {
    let market = diagonal_market();
    let d = derive_portfolios(
        &ActiveSetOptimizer::default(),
        &market,
        dec!(1),
        Leverage::default(),
        &DerivationSettings::default(),
    )
    .unwrap();
    assert_eq!(d.frontier.points.len(), 200);
    assert!(close(d.frontier.lower, dec!(0.0894427191), dec!(0.000001)));
    assert!(close(d.frontier.upper, dec!(0.2), dec!(0.0000001)));
    let first = &d.frontier.points[0];
    let last = &d.frontier.points[199];
    assert_eq!(first.target_volatility, d.frontier.lower);
    assert_eq!(last.target_volatility, d.frontier.upper);
    // Top of the sweep is the all-HIGH portfolio
    assert!(close(last.expected_return, dec!(0.10), dec!(0.000001)));
}

#[test]
fn test_frontier_returns_non_decreasing() {
    let market = correlated_market();
    let settings = DerivationSettings {
        frontier_points: 30,
        ..DerivationSettings::default()
    };
    let d = derive_portfolios(
        &ActiveSetOptimizer::default(),
        &market,
        dec!(2),
        Leverage::default(),
        &settings,
    )
    .unwrap();
    for pair in d.frontier.points.windows(2) {
        assert!(
            pair[1].expected_return >= pair[0].expected_return - dec!(0.0000001),
            "returns fell from {} to {}",
            pair[0].expected_return,
            pair[1].expected_return
        );
    }
}

#[test]
fn test_single_asset_sweep_is_empty() {
    let market = MarketInputs {
        asset_names: vec!["ONLY".into()],
        expected_returns: vec![dec!(0.08)],
        covariance_matrix: vec![vec![dec!(0.04)]],
        risk_free_rate: dec!(0.02),
    };
    let d = derive_portfolios(
        &ActiveSetOptimizer::default(),
        &market,
        dec!(1),
        Leverage::default(),
        &DerivationSettings::default(),
    )
    .unwrap();
    assert!(d.frontier.points.is_empty());
    assert!(close(d.tangency.weights[0], Decimal::ONE, dec!(0.0000001)));
}

#[test]
fn test_sweep_targets_evenly_spaced() {
    let t = sweep_targets(dec!(0), dec!(1), 5);
    assert_eq!(t, vec![dec!(0), dec!(0.25), dec!(0.5), dec!(0.75), dec!(1)]);
}

// ---------------------------------------------------------------------------
// Tangency and CML
// ---------------------------------------------------------------------------

#[test]
fn test_tangency_sharpe_dominates_frontier() {
    let market = correlated_market();
    let settings = DerivationSettings {
        frontier_points: 25,
        ..DerivationSettings::default()
    };
    let d = derive_portfolios(
        &ActiveSetOptimizer::default(),
        &market,
        dec!(2),
        Leverage::default(),
        &settings,
    )
    .unwrap();
    for p in &d.frontier.points {
        assert!(
            d.tangency.sharpe_ratio >= p.sharpe_ratio - dec!(0.000001),
            "tangency sharpe {} below frontier point sharpe {}",
            d.tangency.sharpe_ratio,
            p.sharpe_ratio
        );
    }
}

#[test]
fn test_tangency_weights_long_only_fully_invested() {
    let perf = ActiveSetOptimizer::default()
        .max_sharpe(&correlated_market().problem(), dec!(0.03))
        .unwrap();
    let total: Decimal = perf.weights.iter().copied().sum();
    assert!(close(total, Decimal::ONE, dec!(0.0000001)));
    assert!(perf.weights.iter().all(|w| *w >= dec!(-0.0000001)));
}

#[test]
fn test_cml_intercept_and_slope() {
    let market = diagonal_market();
    let d = derive_portfolios(
        &ActiveSetOptimizer::default(),
        &market,
        dec!(1),
        Leverage::default(),
        &DerivationSettings::default(),
    )
    .unwrap();
    let cml = &d.capital_market_line;
    assert_eq!(cml.start, (Decimal::ZERO, dec!(0.02)));
    assert!(close(cml.slope, dec!(0.5), dec!(0.0000001)));
    // x end = 0.8 * 0.2
    assert!(close(cml.end.0, dec!(0.16), dec!(0.0000001)));
    assert!(close(cml.end.1, dec!(0.10), dec!(0.0000001)));
    // Tangency sits on the line
    let on_line = cml.expected_return_at(d.tangency.volatility);
    assert!(close(on_line, d.tangency.expected_return, dec!(0.0000001)));
}

#[test]
fn test_leveraged_bounds_problem_solves() {
    let p = OptimizationProblem::new(
        vec![dec!(0.02), dec!(0.07)],
        vec![vec![dec!(0), dec!(0)], vec![dec!(0), dec!(0.1)]],
    )
    .with_bounds(risk_frontier_core::optimization::WeightBounds::new(
        dec!(-9),
        dec!(10),
    ));
    let perf = ActiveSetOptimizer::default()
        .max_quadratic_utility(&p, dec!(0.000001))
        .unwrap();
    assert!(close(perf.weights[1], dec!(10), dec!(0.0000001)));
}

#[test]
fn test_sweep_climbs_from_corner_minimum_to_top_asset() {
    // The min-vol portfolio is all in LOW; the path stays on that vertex for a while
    let market = MarketInputs {
        asset_names: vec!["LOW".into(), "HIGH".into()],
        expected_returns: vec![dec!(0.04), dec!(0.045)],
        covariance_matrix: vec![
            vec![dec!(0.0025), dec!(0.008)],
            vec![dec!(0.008), dec!(0.04)],
        ],
        risk_free_rate: dec!(0.02),
    };
    let settings = DerivationSettings {
        frontier_points: 20,
        ..DerivationSettings::default()
    };
    let d = derive_portfolios(
        &ActiveSetOptimizer::default(),
        &market,
        dec!(2),
        Leverage::default(),
        &settings,
    )
    .unwrap();
    let points = &d.frontier.points;
    let last = points.last().unwrap();
    assert_eq!(last.weights, vec![Decimal::ZERO, Decimal::ONE]);
    assert!(close(last.expected_return, dec!(0.045), dec!(0.0000001)));
    assert!(points.iter().any(|p| p.weights != points[0].weights));
    for p in points {
        assert!(
            close(p.volatility, p.target_volatility, dec!(0.000001)),
            "target {} got {}",
            p.target_volatility,
            p.volatility
        );
    }
}
