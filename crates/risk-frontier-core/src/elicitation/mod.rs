//! Risk-aversion elicitation through certainty-equivalent lotteries.
//!
//! Each canonical lottery is priced by the user; under quadratic utility
//! `CE = E[x] - 0.5 * A * Var[x]`, so every answer implies a coefficient `A`.

pub mod lottery;
pub mod questionnaire;

pub use lottery::{canonical_lotteries, Lottery, LOTTERY_COUNT};
pub use questionnaire::{
    assess_risk_aversion, default_responses, effective_risk_aversion, questionnaire, Leverage,
    LotteryPrompt, LotteryScore, RiskAversionInput, RiskAversionOutput, RISK_AVERSION_FLOOR,
};
