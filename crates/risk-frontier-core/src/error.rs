use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    #[error("Infeasible problem: {0}")]
    Infeasible(String),

    #[error("Convergence failure: {function} did not converge after {iterations} iterations")]
    ConvergenceFailure { function: String, iterations: u32 },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Parse error in {origin}: {reason}")]
    Parse { origin: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for FrontierError {
    fn from(e: serde_json::Error) -> Self {
        FrontierError::SerializationError(e.to_string())
    }
}

#[cfg(feature = "market_data")]
impl From<csv::Error> for FrontierError {
    fn from(e: csv::Error) -> Self {
        let origin = e
            .position()
            .map(|p| format!("csv line {}", p.line()))
            .unwrap_or_else(|| "csv".to_string());
        FrontierError::Parse {
            origin,
            reason: e.to_string(),
        }
    }
}
