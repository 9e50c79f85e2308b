//! Runtime error types.

use thiserror::Error;

use skillkit_core::{DispatchError, RegistrationError, StoreError};

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The request body is not a valid request envelope.
    #[error("invalid request envelope: {0}")]
    InvalidRequest(#[from] serde_json::Error),

    /// The dispatch completed with an error.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A handler group was rejected.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The attribute store could not be opened.
    #[error("attribute store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
