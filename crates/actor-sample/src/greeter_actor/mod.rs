//! # Greeter Actor
//!
//! A single actor that talks to players over RPC. `greet` sends `say_hello`
//! to a player and waits for the reply; `announce` sends `say` as a one-way
//! notification. A player failure comes back to the greeter's caller as the
//! same [`PlayerError`](crate::player_actor::PlayerError).

pub mod error;

pub use error::*;

use crate::clients::GreeterClient;
use crate::model::GreeterModel;
use actor_runtime::{
    encode_arg, ActorId, ActorRef, ActorSystem, FrameworkError, HandlerCatalog,
};
use std::sync::Arc;
use tracing::debug;

pub const GREETER_TYPE: &str = "Greeter";

pub fn greeter_id(service_id: u32) -> ActorId {
    ActorId::new(GREETER_TYPE, GREETER_TYPE, service_id)
}

pub fn catalog(system: &ActorSystem) -> Arc<HandlerCatalog<GreeterModel>> {
    HandlerCatalog::builder(GREETER_TYPE)
        .with_result_pool(system.result_pool().clone())
        .value(
            "greet",
            |greeter: Arc<GreeterModel>, (key, greeting): (i64, String)| async move {
                let player = greeter.player(key);
                debug!(%player, %greeting, "Greeting player");
                let reply: String = greeter
                    .ctx()
                    .request_typed(player, "say_hello", vec![encode_arg(&greeting)?])
                    .await?;
                greeter.record_reply(reply.clone());
                Ok::<_, FrameworkError>(reply)
            },
        )
        .unit(
            "announce",
            |greeter: Arc<GreeterModel>, (key, line): (i64, String)| async move {
                let player = greeter.player(key);
                greeter.ctx().notify(player, "say", vec![encode_arg(&line)?])
            },
        )
        .value("replies", |greeter: Arc<GreeterModel>, (): ()| async move {
            Ok::<_, FrameworkError>(greeter.replies())
        })
        .build()
}

/// Spawns the greeter for `service_id`; it addresses players on the same
/// service.
pub fn spawn(system: &ActorSystem, service_id: u32) -> Result<GreeterClient, FrameworkError> {
    let actor = system.spawn(greeter_id(service_id), catalog(system), move |ctx| {
        GreeterModel::new(ctx, service_id)
    })?;
    Ok(GreeterClient::new(ActorRef::new(actor)))
}
