use napi::Result as NapiResult;
use napi_derive::napi;

use risk_frontier_core::dashboard::{self, DashboardInput};
use risk_frontier_core::elicitation::{self, RiskAversionInput};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Questionnaire
// ---------------------------------------------------------------------------

/// The six lottery prompts with slider ranges, as a JSON array.
#[napi]
pub fn list_lotteries() -> NapiResult<String> {
    serde_json::to_string(&elicitation::questionnaire()).map_err(to_napi_error)
}

#[napi]
pub fn assess_risk_aversion(input_json: String) -> NapiResult<String> {
    let input: RiskAversionInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = elicitation::assess_risk_aversion(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[napi]
pub fn evaluate_dashboard(input_json: String) -> NapiResult<String> {
    let input: DashboardInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = dashboard::evaluate_dashboard(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
