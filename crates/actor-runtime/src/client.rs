//! # Actor Handles
//!
//! [`ActorRef`] is the caller-side handle to a local actor. It is cheap to
//! clone and can be shared across tasks; every method queues work on the
//! actor and never runs the handler on the caller's thread.

use crate::actor::{Actor, ActorState};
use crate::error::FrameworkError;
use crate::invokable::{ArgValue, Invokable};
use crate::message::ActorId;
use crate::response::Response;
use std::sync::Arc;

/// A typed handle to an actor hosting a model of type `A`.
pub struct ActorRef<A> {
    actor: Arc<Actor<A>>,
}

impl<A> Clone for ActorRef<A> {
    fn clone(&self) -> Self {
        Self {
            actor: self.actor.clone(),
        }
    }
}

impl<A: Send + Sync + 'static> ActorRef<A> {
    pub fn new(actor: Arc<Actor<A>>) -> Self {
        Self { actor }
    }

    pub fn id(&self) -> &ActorId {
        self.actor.id()
    }

    pub fn state(&self) -> ActorState {
        self.actor.state()
    }

    pub fn actor(&self) -> &Arc<Actor<A>> {
        &self.actor
    }

    /// Calls `method` and waits for its result.
    pub async fn ask<R>(&self, method: &str, args: Vec<ArgValue>) -> Result<R, FrameworkError>
    where
        R: Default + Send + 'static,
    {
        self.actor.ask(method, args).await
    }

    /// Calls `method` without waiting.
    pub fn tell(&self, method: &str, args: Vec<ArgValue>) -> Result<(), FrameworkError> {
        self.actor.tell(method, args)
    }

    /// Runs a prepared call and returns its raw result container.
    pub async fn call(&self, call: Box<dyn Invokable<A>>) -> Response {
        self.actor.call(call).await
    }
}

impl<A> std::fmt::Debug for ActorRef<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ActorRef").field(&self.actor).finish()
    }
}
