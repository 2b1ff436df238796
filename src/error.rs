use crate::EmbeddingPrecision;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
/// Errors raised while building or querying an index.
pub enum LshError {
    /// A vector's length differs from the dimensionality of the indexed dataset.
    #[error("dimension mismatch (expected {expected}, got {got})")]
    DimensionMismatch {
        /// The dimensionality of the indexed dataset.
        expected: usize,
        /// The length of the offending vector.
        got: usize,
    },
    /// A set-valued vector contains a component other than 0 or 1.
    #[error("component {position} is {value}, but set-valued vectors may only contain 0 or 1")]
    InvalidVectorEncoding {
        /// The position of the offending component.
        position: usize,
        /// The value found at that position.
        value: EmbeddingPrecision,
    },
    /// A construction parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    /// A table was requested by an ID the index does not own.
    #[error("table {table} does not exist (the index has {tables} tables)")]
    TableOutOfRange {
        /// The requested table.
        table: usize,
        /// The number of tables in the index.
        tables: usize,
    },
    /// A hash function was requested by an ID the table does not own.
    #[error("hash function {function} does not exist (the table has {functions} functions)")]
    FunctionOutOfRange {
        /// The requested function.
        function: usize,
        /// The number of functions in the table.
        functions: usize,
    },
}

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, LshError>;
