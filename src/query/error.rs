//! Error types for query translation and evaluation

use crate::error::AppError;

/// Result type for query operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Errors raised while translating or evaluating a query expression
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Field name not present in the translation table
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// And/Or group with no operands
    #[error("Empty boolean group: {0}")]
    EmptyGroup(&'static str),

    /// Operator applied to an incompatible value type
    #[error("Invalid operand for field {field}: {message}")]
    InvalidOperand { field: String, message: String },
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        AppError::Translation(err.to_string())
    }
}
