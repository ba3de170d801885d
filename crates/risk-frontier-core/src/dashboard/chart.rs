use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::derivation::PortfolioDerivation;
use crate::market_data::MarketInputs;
use crate::types::Rate;

pub const CHART_TITLE: &str = "Efficient Frontier with Capital Market Line";
pub const X_AXIS_LABEL: &str = "Volatility";
pub const Y_AXIS_LABEL: &str = "Expected Return";
pub const LEGEND_POSITION: &str = "lower right";
/// Figure size in inches, width by height.
pub const FIGURE_SIZE: (u32, u32) = (8, 4);
pub const MARKER_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Line,
    Scatter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    Dot,
    Star,
}

/// A (volatility, expected return) coordinate, optionally labelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartPoint {
    pub x: Rate,
    pub y: Rate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSeries {
    pub name: String,
    pub kind: SeriesKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_size: Option<u32>,
    pub points: Vec<ChartPoint>,
}

/// Renderer-neutral description of the risk/return chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartData {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub legend: String,
    pub figure_size: (u32, u32),
    pub series: Vec<ChartSeries>,
}

impl ChartData {
    pub fn series(&self, name: &str) -> Option<&ChartSeries> {
        self.series.iter().find(|s| s.name == name)
    }
}

/// Lay out the frontier, the individual assets, the tangency star, the CML and
/// the max-utility star, in drawing order.
pub fn build_chart(market: &MarketInputs, derivation: &PortfolioDerivation) -> ChartData {
    let frontier = ChartSeries {
        name: "Efficient Frontier".into(),
        kind: SeriesKind::Line,
        marker: None,
        color: None,
        marker_size: None,
        points: derivation
            .frontier
            .points
            .iter()
            .map(|p| point(p.volatility, p.expected_return, None))
            .collect(),
    };

    let assets = ChartSeries {
        name: "Assets".into(),
        kind: SeriesKind::Scatter,
        marker: Some(Marker::Dot),
        color: None,
        marker_size: None,
        points: market
            .asset_names
            .iter()
            .zip(market.asset_volatilities())
            .zip(market.expected_returns.iter())
            .map(|((name, vol), ret)| point(vol, *ret, Some(name.clone())))
            .collect(),
    };

    let tangency = &derivation.tangency;
    let max_sharpe = star(
        "Max Sharpe",
        "red",
        tangency.volatility,
        tangency.expected_return,
    );

    let cml = &derivation.capital_market_line;
    let capital_market_line = ChartSeries {
        name: "Capital Market Line".into(),
        kind: SeriesKind::Line,
        marker: None,
        color: None,
        marker_size: None,
        points: vec![
            point(cml.start.0, cml.start.1, None),
            point(cml.end.0, cml.end.1, None),
        ],
    };

    let util = &derivation.max_utility;
    let max_util = star("Max Util", "blue", util.volatility, util.expected_return);

    ChartData {
        title: CHART_TITLE.into(),
        x_label: X_AXIS_LABEL.into(),
        y_label: Y_AXIS_LABEL.into(),
        legend: LEGEND_POSITION.into(),
        figure_size: FIGURE_SIZE,
        series: vec![frontier, assets, max_sharpe, capital_market_line, max_util],
    }
}

fn point(x: Decimal, y: Decimal, label: Option<String>) -> ChartPoint {
    ChartPoint { x, y, label }
}

fn star(name: &str, color: &str, x: Rate, y: Rate) -> ChartSeries {
    ChartSeries {
        name: name.into(),
        kind: SeriesKind::Scatter,
        marker: Some(Marker::Star),
        color: Some(color.into()),
        marker_size: Some(MARKER_SIZE),
        points: vec![point(x, y, None)],
    }
}
