//! Query error types

use crate::champion::Champion;
use thiserror::Error;

/// Reasons a query is rejected or abandoned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Neither winners nor losers were given
    #[error("Query names no champions")]
    EmptyQuery,

    /// A champion id outside the known table (or the unknown sentinel)
    #[error("Unknown champion id: {0}")]
    UnknownChampion(u16),

    /// The same champion was placed on both sides
    #[error("{0} cannot be both a winner and a loser")]
    ConflictingChampion(Champion),

    /// Caller went away before the result was ready
    #[error("Query cancelled")]
    Cancelled,
}

impl QueryError {
    /// Rejections caused by the query itself rather than its execution
    pub fn is_invalid_query(&self) -> bool {
        !matches!(self, QueryError::Cancelled)
    }
}

/// Result type alias for query engine operations
pub type EngineResult<T> = Result<T, QueryError>;
