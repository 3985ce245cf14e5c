pub mod assumptions;
pub mod engine;
pub mod error;
pub mod findings;
pub mod scenarios;
pub mod statements;
pub mod time_value;
pub mod types;

pub use assumptions::{Assumptions, DebtInstrument};
pub use error::LboError;
pub use types::*;

/// Standard result type for all engine operations
pub type LboResult<T> = Result<T, LboError>;
