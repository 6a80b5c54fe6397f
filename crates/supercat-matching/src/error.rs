use supercat_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("catalog store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
