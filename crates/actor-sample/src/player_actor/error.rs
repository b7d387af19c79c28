//! Error types for the Player actor.

use thiserror::Error;

/// Errors that can occur during player operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlayerError {
    /// The player was muted and refuses to talk.
    #[error("Player {0} is muted")]
    Muted(String),

    /// An error occurred while communicating with the actor runtime.
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}

impl From<String> for PlayerError {
    fn from(msg: String) -> Self {
        PlayerError::ActorCommunicationError(msg)
    }
}
