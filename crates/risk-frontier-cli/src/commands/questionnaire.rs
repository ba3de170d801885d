use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use risk_frontier_core::elicitation::{self, RiskAversionInput};

use crate::input;

/// Arguments for scoring the lottery questionnaire
#[derive(Args)]
pub struct RiskAversionArgs {
    /// Path to a JSON or YAML file with `{"responses": [...]}`
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated willingness-to-pay answers, one per lottery (e.g. "4,450,0.8,90,60,20")
    #[arg(long, value_delimiter = ',')]
    pub answers: Option<Vec<Decimal>>,
}

/// The six prompts with their slider ranges.
pub fn run_lotteries() -> Result<Value, Box<dyn std::error::Error>> {
    let rows: Vec<Value> = elicitation::questionnaire()
        .into_iter()
        .map(|p| {
            serde_json::json!({
                "number": p.number,
                "label": p.label,
                "expected_value": p.lottery.expected_value(),
                "variance": p.lottery.variance(),
                "min": p.min,
                "max": p.max,
                "step": p.step,
                "default": p.default,
            })
        })
        .collect();
    Ok(Value::Array(rows))
}

pub fn run_risk_aversion(args: RiskAversionArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let ra_input: RiskAversionInput = if let Some(answers) = args.answers {
        RiskAversionInput { responses: answers }
    } else if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--answers, --input <file> or stdin required for risk-aversion".into());
    };
    let result = elicitation::assess_risk_aversion(&ra_input)?;
    Ok(serde_json::to_value(result)?)
}
