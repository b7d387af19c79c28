//! # Framework Errors
//!
//! This module defines the common error type used throughout the runtime.
//! Every failure that can cross an actor boundary is expressed as a
//! [`FrameworkError`], so a caller waiting on a result always receives a value
//! of this type rather than a panic from the scheduling machinery.

use std::sync::Arc;

/// A captured error raised by actor logic.
pub type CapturedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur within the actor runtime itself.
///
/// The type is `Clone` so a failure [`Response`](crate::Response) can hand the
/// same captured error to whoever reads it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FrameworkError {
    #[error("Actor closed")]
    ActorClosed,
    #[error("Actor dropped response channel")]
    ActorDropped,
    #[error("Actor {0} is not running")]
    ActorNotRunning(String),
    #[error("Actor not found: {0}")]
    ActorNotFound(String),
    #[error("Actor already registered: {0}")]
    ActorExists(String),
    #[error("Unknown method: {0}")]
    UnknownMethod(String),
    #[error("Call failed: {0}")]
    CallFailed(CapturedError),
    #[error("Call panicked: {0}")]
    Panicked(String),
    #[error("Expected {expected} arguments, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },
    #[error("Argument {index} has the wrong type, expected {expected}")]
    ArgumentType { index: usize, expected: &'static str },
    #[error("Failed to decode argument {index}: {reason}")]
    ArgumentDecode { index: usize, reason: String },
    #[error("Failed to encode argument: {0}")]
    ArgumentEncode(String),
    #[error("Call {0} was invoked before its arguments were set")]
    MissingArguments(&'static str),
    #[error("Result type mismatch: requested {requested}, stored {stored}")]
    ResultTypeMismatch {
        requested: &'static str,
        stored: &'static str,
    },
    #[error("Result already taken")]
    ResultTaken,
    #[error("Request id 0 is reserved for one-way messages")]
    InvalidRequestId,
    #[error("Request id {0} is already outstanding")]
    DuplicateRequestId(u64),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FrameworkError {
    /// Captures an arbitrary error raised by actor logic.
    pub fn captured<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::CallFailed(Arc::new(error))
    }

    /// Captures an already boxed error without re-wrapping it.
    pub fn from_boxed(error: Box<dyn std::error::Error + Send + Sync + 'static>) -> Self {
        match error.downcast::<FrameworkError>() {
            Ok(framework) => *framework,
            Err(other) => Self::CallFailed(Arc::from(other)),
        }
    }

    /// Returns the captured error if this is a [`FrameworkError::CallFailed`].
    pub fn captured_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::CallFailed(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }
}
