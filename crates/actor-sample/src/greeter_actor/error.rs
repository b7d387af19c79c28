use crate::player_actor::PlayerError;
use thiserror::Error;

/// Errors that can occur during greeter operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GreeterError {
    /// The greeted player answered with an error.
    #[error(transparent)]
    Player(#[from] PlayerError),

    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}

impl From<String> for GreeterError {
    fn from(msg: String) -> Self {
        GreeterError::ActorCommunicationError(msg)
    }
}
