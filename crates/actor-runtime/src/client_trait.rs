//! # ActorClient Trait
//!
//! Provides a common interface for actor-specific clients, adding default
//! `ask` and `tell` methods built on top of a generic [`ActorRef`].
use crate::{ActorRef, ActorState, ArgValue, FrameworkError};
use async_trait::async_trait;

/// Trait for actor-specific clients to inherit the calling boilerplate.
///
/// A client wraps an [`ActorRef`] and exposes typed methods; `ask` and
/// `tell` take care of error mapping and tracing.
///
/// # Example
///
/// ```rust
/// use actor_runtime::{call_args, ActorClient, ActorRef, FrameworkError};
/// use async_trait::async_trait;
///
/// struct Player;
///
/// #[derive(Debug)]
/// struct PlayerError(String);
///
/// impl From<String> for PlayerError {
///     fn from(s: String) -> Self {
///         PlayerError(s)
///     }
/// }
///
/// struct PlayerClient {
///     inner: ActorRef<Player>,
/// }
///
/// #[async_trait]
/// impl ActorClient<Player> for PlayerClient {
///     type Error = PlayerError;
///
///     fn inner(&self) -> &ActorRef<Player> {
///         &self.inner
///     }
///
///     fn map_error(e: FrameworkError) -> Self::Error {
///         PlayerError(e.to_string())
///     }
/// }
///
/// impl PlayerClient {
///     async fn say_hello(&self, greeting: &str) -> Result<String, PlayerError> {
///         self.ask("say_hello", call_args![greeting.to_string()]).await
///     }
/// }
/// ```
#[async_trait]
pub trait ActorClient<A: Send + Sync + 'static>: Send + Sync {
    /// The actor-specific error type.
    type Error: From<String> + Send + Sync;

    /// Access the inner generic handle.
    fn inner(&self) -> &ActorRef<A>;

    /// Map framework errors to the actor-specific error type.
    fn map_error(e: FrameworkError) -> Self::Error;

    fn state(&self) -> ActorState {
        self.inner().state()
    }

    /// Call `method` and wait for its result.
    #[tracing::instrument(skip(self, args), fields(actor = %self.inner().id()))]
    async fn ask<R>(&self, method: &'static str, args: Vec<ArgValue>) -> Result<R, Self::Error>
    where
        R: Default + Send + 'static,
    {
        tracing::debug!("Sending request");
        self.inner().ask(method, args).await.map_err(Self::map_error)
    }

    /// Call `method` without waiting for its result.
    #[tracing::instrument(skip(self, args), fields(actor = %self.inner().id()))]
    async fn tell(&self, method: &'static str, args: Vec<ArgValue>) -> Result<(), Self::Error> {
        tracing::debug!("Sending one-way call");
        self.inner().tell(method, args).map_err(Self::map_error)
    }
}
