use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write; carries the constraint name.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    /// A conditional write matched no row because the row changed since it was read.
    #[error("row changed since it was read")]
    StaleWrite,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
