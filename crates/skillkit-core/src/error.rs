//! Unified error types for skillkit.
//!
//! Every dispatch failure is terminal for the dispatcher instance that hit
//! it. Registration failures are programmer errors raised before dispatch.

use thiserror::Error;

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Failures reported through the completion channel of a dispatch.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The request was addressed to a different application.
    #[error("invalid application id: expected '{expected}', got '{got}'")]
    InvalidApplicationId {
        /// The configured application id.
        expected: String,
        /// The application id carried by the request.
        got: String,
    },

    /// Persisted attributes could not be fetched for a new session.
    #[error("error fetching user state: {0}")]
    AttributeFetch(String),

    /// A handler returned an error or panicked.
    #[error("handler '{event}' failed: {message}")]
    HandlerFault {
        /// Event name of the handler that failed.
        event: String,
        /// Error description.
        message: String,
        /// Error chain or backtrace, when one is available.
        trace: String,
    },

    /// A handler explicitly failed the dispatch.
    #[error("{0}")]
    Failed(String),
}

impl DispatchError {
    /// Creates an explicit failure.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Returns `true` for faults raised by handler code.
    pub fn is_handler_fault(&self) -> bool {
        matches!(self, Self::HandlerFault { .. })
    }
}

// =============================================================================
// Registration Errors
// =============================================================================

/// Errors raised while registering handler groups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A handler was bound to an empty base event name.
    #[error("handler group #{group} binds a handler to an empty event name")]
    EmptyEventName {
        /// Position of the offending group in the registration call.
        group: usize,
    },

    /// The same base event name appears twice in one group.
    #[error("handler group #{group} binds '{name}' more than once")]
    DuplicateKey {
        /// Position of the offending group in the registration call.
        group: usize,
        /// The repeated base event name.
        name: String,
    },
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors returned by an attribute store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// I/O failure in the backing medium.
    #[error("I/O error: {0}")]
    Io(String),

    /// Stored data could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend specific failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for registration calls.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of one dispatch: a response, no completion at all, or a failure.
pub type DispatchResult = Result<Option<crate::response::ResponseEnvelope>, DispatchError>;
