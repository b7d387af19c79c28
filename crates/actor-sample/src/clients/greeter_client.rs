use crate::greeter_actor::GreeterError;
use crate::model::GreeterModel;
use crate::player_actor::PlayerError;
use actor_runtime::{call_args, ActorClient, ActorRef, FrameworkError};
use async_trait::async_trait;
use tracing::instrument;

/// Client for interacting with the Greeter actor.
#[derive(Clone, Debug)]
pub struct GreeterClient {
    inner: ActorRef<GreeterModel>,
}

impl GreeterClient {
    pub fn new(inner: ActorRef<GreeterModel>) -> Self {
        Self { inner }
    }

    /// Asks the greeter to say `greeting` to player `key` and returns the
    /// player's answer.
    #[instrument(skip(self))]
    pub async fn greet(&self, key: i64, greeting: &str) -> Result<String, GreeterError> {
        self.ask("greet", call_args![key, greeting.to_string()]).await
    }

    pub async fn announce(&self, key: i64, line: &str) -> Result<(), GreeterError> {
        self.ask("announce", call_args![key, line.to_string()]).await
    }

    pub async fn replies(&self) -> Result<Vec<String>, GreeterError> {
        self.ask("replies", call_args![]).await
    }
}

#[async_trait]
impl ActorClient<GreeterModel> for GreeterClient {
    type Error = GreeterError;

    fn inner(&self) -> &ActorRef<GreeterModel> {
        &self.inner
    }

    fn map_error(e: FrameworkError) -> Self::Error {
        match e.captured_error().and_then(|inner| inner.downcast_ref::<PlayerError>()) {
            Some(player) => GreeterError::Player(player.clone()),
            None => GreeterError::ActorCommunicationError(e.to_string()),
        }
    }
}
