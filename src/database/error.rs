use thiserror::Error;

/// Failures surfaced by a `DataStore`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Table {0} does not accept writes")]
    ReadOnlyTable(&'static str),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
