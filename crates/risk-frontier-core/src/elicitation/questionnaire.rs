use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use super::lottery::{canonical_lotteries, Lottery, LOTTERY_COUNT};
use crate::error::FrontierError;
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::FrontierResult;

/// Smallest risk aversion handed to the utility maximisation. Sums below this
/// (zero or risk-seeking answers) are replaced by it.
pub const RISK_AVERSION_FLOOR: Decimal = dec!(0.000001);

/// Slider increment for willingness-to-pay answers.
pub const RESPONSE_STEP: Decimal = dec!(0.1);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One questionnaire item as a front end should present it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryPrompt {
    /// 1-based position in the questionnaire.
    pub number: usize,
    pub label: String,
    pub lottery: Lottery,
    pub min: Money,
    pub max: Money,
    pub step: Money,
    pub default: Money,
}

/// Willingness-to-pay answers, one per canonical lottery, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAversionInput {
    pub responses: Vec<Money>,
}

/// Per-lottery breakdown of the implied coefficient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryScore {
    pub number: usize,
    pub label: String,
    pub expected_value: Money,
    pub variance: Decimal,
    pub willingness_to_pay: Money,
    pub implied_risk_aversion: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAversionOutput {
    pub lottery_scores: Vec<LotteryScore>,
    /// Sum of the per-lottery coefficients before flooring.
    pub raw_risk_aversion: Decimal,
    /// Value used downstream; never below `RISK_AVERSION_FLOOR`.
    pub risk_aversion: Decimal,
    pub floor_applied: bool,
}

/// Maximum leverage the user accepts: 1 means fully invested, 2 means
/// borrowing to double the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Leverage(u32);

impl Leverage {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 10;

    pub fn new(value: u32) -> FrontierResult<Self> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(FrontierError::InvalidInput {
                field: "leverage".into(),
                reason: format!(
                    "must be an integer between {} and {}, got {}",
                    Self::MIN,
                    Self::MAX,
                    value
                ),
            });
        }
        Ok(Leverage(value))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Feasible range for the tangency weight: `[1 - leverage, leverage]`.
    pub fn weight_bounds(self) -> (Decimal, Decimal) {
        let l = Decimal::from(self.0);
        (Decimal::ONE - l, l)
    }
}

impl Default for Leverage {
    fn default() -> Self {
        Leverage(Self::MIN)
    }
}

impl TryFrom<u32> for Leverage {
    type Error = FrontierError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Leverage::new(value)
    }
}

impl From<Leverage> for u32 {
    fn from(l: Leverage) -> Self {
        l.0
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Slider descriptions for the six canonical lotteries.
pub fn questionnaire() -> Vec<LotteryPrompt> {
    canonical_lotteries()
        .iter()
        .enumerate()
        .map(|(i, lottery)| {
            let ev = lottery.expected_value();
            LotteryPrompt {
                number: i + 1,
                label: lottery.prompt(),
                lottery: *lottery,
                min: Decimal::ZERO,
                max: ev,
                step: RESPONSE_STEP,
                default: ev,
            }
        })
        .collect()
}

/// Answers equal to each lottery's expected value (a risk-neutral user).
pub fn default_responses() -> Vec<Money> {
    canonical_lotteries()
        .iter()
        .map(|l| l.expected_value())
        .collect()
}

/// Apply the floor to an aggregate coefficient.
pub fn effective_risk_aversion(raw: Decimal) -> Decimal {
    if raw < RISK_AVERSION_FLOOR {
        RISK_AVERSION_FLOOR
    } else {
        raw
    }
}

/// Score the questionnaire.
///
/// The aggregate is the plain sum of the six implied coefficients, not their
/// mean, so it grows with the number of lotteries answered below expected value.
pub fn assess_risk_aversion(
    input: &RiskAversionInput,
) -> FrontierResult<ComputationOutput<RiskAversionOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let lotteries = canonical_lotteries();
    validate_responses(&input.responses, &lotteries)?;

    let mut lottery_scores = Vec::with_capacity(LOTTERY_COUNT);
    for (i, (lottery, wtp)) in lotteries.iter().zip(input.responses.iter()).enumerate() {
        let implied = lottery.implied_risk_aversion(*wtp)?;
        lottery_scores.push(LotteryScore {
            number: i + 1,
            label: lottery.prompt(),
            expected_value: lottery.expected_value(),
            variance: lottery.variance(),
            willingness_to_pay: *wtp,
            implied_risk_aversion: implied,
        });
    }

    let raw_risk_aversion: Decimal = lottery_scores
        .iter()
        .map(|s| s.implied_risk_aversion)
        .sum();
    let risk_aversion = effective_risk_aversion(raw_risk_aversion);
    let floor_applied = risk_aversion != raw_risk_aversion;

    if floor_applied {
        warnings.push(format!(
            "Risk aversion {} is below {}; using the floor value",
            raw_risk_aversion, RISK_AVERSION_FLOOR
        ));
    }

    debug!(
        raw = %raw_risk_aversion,
        effective = %risk_aversion,
        floor_applied,
        "risk aversion assessed"
    );

    let output = RiskAversionOutput {
        lottery_scores,
        raw_risk_aversion,
        risk_aversion,
        floor_applied,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Quadratic-utility certainty-equivalent inversion: A = 2(E - CE)/Var, summed over lotteries",
        &serde_json::json!({
            "lotteries": LOTTERY_COUNT,
            "aggregation": "sum",
            "floor": RISK_AVERSION_FLOOR.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_responses(responses: &[Money], lotteries: &[Lottery]) -> FrontierResult<()> {
    if responses.len() != lotteries.len() {
        return Err(FrontierError::InvalidInput {
            field: "responses".into(),
            reason: format!(
                "Expected {} answers but got {}",
                lotteries.len(),
                responses.len()
            ),
        });
    }
    for (i, (wtp, lottery)) in responses.iter().zip(lotteries.iter()).enumerate() {
        let ev = lottery.expected_value();
        if *wtp < Decimal::ZERO || *wtp > ev {
            return Err(FrontierError::InvalidInput {
                field: format!("responses[{}]", i),
                reason: format!("{} is outside [0, {}]", wtp, ev.normalize()),
            });
        }
    }
    Ok(())
}
