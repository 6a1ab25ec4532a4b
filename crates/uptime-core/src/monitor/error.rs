use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid resource: {0}")]
    InvalidResource(String),
    #[error("Resource {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
