use crate::model::{PlayerModel, PlayerProfile};
use crate::player_actor::PlayerError;
use actor_runtime::{call_args, ActorClient, ActorId, ActorRef, FrameworkError};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Client for interacting with a Player actor.
#[derive(Clone, Debug)]
pub struct PlayerClient {
    inner: ActorRef<PlayerModel>,
}

impl PlayerClient {
    pub fn new(inner: ActorRef<PlayerModel>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> &ActorId {
        self.inner.id()
    }

    /// Makes the player say `line`. Does not wait for the handler to run.
    #[instrument(skip(self))]
    pub async fn say(&self, line: &str) -> Result<(), PlayerError> {
        self.tell("say", call_args![line.to_string()]).await
    }

    #[instrument(skip(self))]
    pub async fn say_hello(&self, greeting: &str) -> Result<String, PlayerError> {
        let reply: String = self.ask("say_hello", call_args![greeting.to_string()]).await?;
        debug!(%reply, "say_hello answered");
        Ok(reply)
    }

    pub async fn mute(&self, muted: bool) -> Result<(), PlayerError> {
        self.ask("mute", call_args![muted]).await
    }

    pub async fn greeting_count(&self) -> Result<u64, PlayerError> {
        self.ask("greeting_count", call_args![]).await
    }

    pub async fn history(&self) -> Result<Vec<String>, PlayerError> {
        self.ask("history", call_args![]).await
    }

    pub async fn profile(&self) -> Result<PlayerProfile, PlayerError> {
        self.ask("profile", call_args![]).await
    }
}

#[async_trait]
impl ActorClient<PlayerModel> for PlayerClient {
    type Error = PlayerError;

    fn inner(&self) -> &ActorRef<PlayerModel> {
        &self.inner
    }

    fn map_error(e: FrameworkError) -> Self::Error {
        match e.captured_error().and_then(|inner| inner.downcast_ref::<PlayerError>()) {
            Some(player) => player.clone(),
            None => PlayerError::ActorCommunicationError(e.to_string()),
        }
    }
}
