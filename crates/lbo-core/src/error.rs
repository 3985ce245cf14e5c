use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LboError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Unknown field in input record: {field}")]
    UnknownField { field: String },

    #[error("Sources and uses do not balance: sources {sources}, uses {uses}")]
    SourcesUsesMismatch { sources: Decimal, uses: Decimal },

    #[error("Calculation failed in year {year}: {detail}")]
    Calculation { year: u32, detail: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LboError {
    /// Stable code string for consumers that map errors to localized messages.
    pub fn code(&self) -> &'static str {
        match self {
            LboError::InvalidInput { .. } => "invalid_input",
            LboError::UnknownField { .. } => "unknown_field",
            LboError::SourcesUsesMismatch { .. } => "debt_exceeds_sources",
            LboError::Calculation { .. } => "calculation_error",
            LboError::DivisionByZero { .. } => "division_by_zero",
            LboError::SerializationError(_) => "serialization_error",
        }
    }
}

impl From<serde_json::Error> for LboError {
    fn from(e: serde_json::Error) -> Self {
        let msg = e.to_string();
        // serde reports rejected fields as: unknown field `foo`, expected ...
        if let Some(rest) = msg.strip_prefix("unknown field `") {
            if let Some(field) = rest.split('`').next() {
                return LboError::UnknownField {
                    field: field.to_string(),
                };
            }
        }
        LboError::SerializationError(msg)
    }
}
