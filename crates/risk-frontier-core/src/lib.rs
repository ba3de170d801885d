pub mod error;
pub mod types;

pub mod dashboard;
pub mod elicitation;
pub mod market_data;
pub mod optimization;

pub use error::FrontierError;
pub use types::*;

/// Standard result type for all risk-frontier operations
pub type FrontierResult<T> = Result<T, FrontierError>;
