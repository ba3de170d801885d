use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::FrontierError;
use crate::types::Money;
use crate::FrontierResult;

/// Number of lotteries in the questionnaire.
pub const LOTTERY_COUNT: usize = 6;

/// A two-outcome gamble: lose `loss_amount` with `loss_probability`,
/// win `gain_amount` with `gain_probability`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lottery {
    pub loss_probability: Decimal,
    pub loss_amount: Money,
    pub gain_probability: Decimal,
    pub gain_amount: Money,
}

/// The six fixed gambles presented to every user, in display order.
pub fn canonical_lotteries() -> [Lottery; LOTTERY_COUNT] {
    [
        Lottery::new(dec!(0.50), dec!(0), dec!(0.50), dec!(10)),
        Lottery::new(dec!(0.50), dec!(0), dec!(0.50), dec!(1000)),
        Lottery::new(dec!(0.90), dec!(0), dec!(0.10), dec!(10)),
        Lottery::new(dec!(0.90), dec!(0), dec!(0.10), dec!(1000)),
        Lottery::new(dec!(0.25), dec!(0), dec!(0.75), dec!(100)),
        Lottery::new(dec!(0.75), dec!(0), dec!(0.25), dec!(100)),
    ]
}

impl Lottery {
    pub const fn new(
        loss_probability: Decimal,
        loss_amount: Money,
        gain_probability: Decimal,
        gain_amount: Money,
    ) -> Self {
        Lottery {
            loss_probability,
            loss_amount,
            gain_probability,
            gain_amount,
        }
    }

    /// E[x] = p_loss * loss + p_gain * gain
    pub fn expected_value(&self) -> Money {
        self.loss_probability * self.loss_amount + self.gain_probability * self.gain_amount
    }

    /// Var[x] = p_loss * (loss - E)^2 + p_gain * (gain - E)^2
    pub fn variance(&self) -> Decimal {
        let ev = self.expected_value();
        let loss_dev = self.loss_amount - ev;
        let gain_dev = self.gain_amount - ev;
        self.loss_probability * loss_dev * loss_dev + self.gain_probability * gain_dev * gain_dev
    }

    /// Coefficient implied by a certainty equivalent under quadratic utility:
    /// `A = 2 * (E[x] - CE) / Var[x]`.
    ///
    /// No range check on `willingness_to_pay`; paying more than the expected
    /// value yields a negative (risk-seeking) coefficient.
    pub fn implied_risk_aversion(&self, willingness_to_pay: Money) -> FrontierResult<Decimal> {
        let var = self.variance();
        if var.is_zero() {
            return Err(FrontierError::DivisionByZero {
                context: format!("implied risk aversion for riskless lottery {}", self.prompt()),
            });
        }
        Ok(dec!(2) * (self.expected_value() - willingness_to_pay) / var)
    }

    /// Question text, e.g. `50% chance of $0 and 50% chance of $10`.
    pub fn prompt(&self) -> String {
        format!(
            "{}% chance of ${} and {}% chance of ${}",
            (self.loss_probability * dec!(100)).trunc().normalize(),
            self.loss_amount.normalize(),
            (self.gain_probability * dec!(100)).trunc().normalize(),
            self.gain_amount.normalize(),
        )
    }
}
