//! Store error types.

/// Errors from the persistence gateway.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying database failure
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
