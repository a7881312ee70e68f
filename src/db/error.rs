#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    SqlxError(#[from] sqlx::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate code: {0}")]
    DuplicateCode(String),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
