//! Error types for the dispatch engine.

use std::any::Any;

use thiserror::Error;

use skillkit_core::DispatchError;

/// A listener failure tagged with the event it was listening on.
///
/// Errors bubbling out of nested `emit` calls are wrapped once, at the
/// innermost listener, so the reported event is the one that actually
/// failed.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ListenerFault {
    /// Event name of the failing listener.
    pub event: String,
    /// Error description.
    pub message: String,
    /// Error chain, or backtrace for panics.
    pub trace: String,
}

impl ListenerFault {
    /// Wraps a handler error, keeping an existing tag if there is one.
    pub(crate) fn tag(event: &str, err: anyhow::Error) -> anyhow::Error {
        if err.is::<ListenerFault>() {
            return err;
        }
        anyhow::Error::new(Self {
            event: event.to_string(),
            message: err.to_string(),
            trace: format!("{err:?}"),
        })
    }

    /// Builds a fault from a caught panic payload.
    pub(crate) fn from_panic(event: &str, payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };

        Self {
            event: event.to_string(),
            message: format!("panic: {message}"),
            trace: std::backtrace::Backtrace::capture().to_string(),
        }
    }

    /// Recovers the fault from a listener error, tagging untagged errors
    /// with `event`.
    pub(crate) fn from_error(event: &str, err: anyhow::Error) -> Self {
        match err.downcast::<ListenerFault>() {
            Ok(fault) => fault,
            Err(err) => Self {
                event: event.to_string(),
                message: err.to_string(),
                trace: format!("{err:?}"),
            },
        }
    }
}

impl From<ListenerFault> for DispatchError {
    fn from(fault: ListenerFault) -> Self {
        DispatchError::HandlerFault {
            event: fault.event,
            message: fault.message,
            trace: fault.trace,
        }
    }
}
