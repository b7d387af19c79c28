//! # Player Actor
//!
//! One actor per player, keyed by a numeric player id.
//!
//! ## Methods
//!
//! | Method | Arguments | Result |
//! |--------|-----------|--------|
//! | `say` | `(String,)` | none |
//! | `say_hello` | `(String,)` | `String` |
//! | `mute` | `(bool,)` | none |
//! | `greeting_count` | `()` | `u64` |
//! | `history` | `()` | `Vec<String>` |
//! | `profile` | `()` | [`PlayerProfile`](crate::model::PlayerProfile) |
//!
//! `say` and `say_hello` fail with [`PlayerError::Muted`] while the player is
//! muted.
//!
//! ## Usage
//!
//! ```rust
//! use actor_runtime::{ActorSystem, ScheduleOptions, TokioPool};
//! use actor_sample::player_actor;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let system = ActorSystem::new(Arc::new(TokioPool::current()), ScheduleOptions::default())?;
//!     let alice = player_actor::spawn(&system, 1, "Alice")?;
//!
//!     let reply = alice.say_hello("hi").await?;
//!     assert_eq!(reply, "Alice answers: hello!");
//!     system.shutdown();
//!     Ok(())
//! }
//! ```

pub mod error;

pub use error::*;

use crate::clients::PlayerClient;
use crate::lifecycle::SERVICE_ID;
use crate::model::PlayerModel;
use actor_runtime::{ActorId, ActorRef, ActorSystem, FrameworkError, HandlerCatalog};
use std::sync::Arc;
use tracing::info;

/// Type name players are registered under.
pub const PLAYER_TYPE: &str = "Player";

pub fn player_id(key: i64, service_id: u32) -> ActorId {
    ActorId::new(PLAYER_TYPE, key, service_id)
}

fn ensure_unmuted(player: &PlayerModel) -> Result<(), PlayerError> {
    if player.is_muted() {
        Err(PlayerError::Muted(player.name().to_string()))
    } else {
        Ok(())
    }
}

/// The methods a player answers.
pub fn catalog(system: &ActorSystem) -> Arc<HandlerCatalog<PlayerModel>> {
    HandlerCatalog::builder(PLAYER_TYPE)
        .with_result_pool(system.result_pool().clone())
        .unit("say", |player: Arc<PlayerModel>, (line,): (String,)| async move {
            ensure_unmuted(&player)?;
            info!(player = player.name(), %line, "say");
            player.say(line);
            Ok::<_, PlayerError>(())
        })
        .value("say_hello", |player: Arc<PlayerModel>, (greeting,): (String,)| async move {
            ensure_unmuted(&player)?;
            info!(player = player.name(), %greeting, "say_hello");
            Ok::<_, PlayerError>(player.greet(&greeting))
        })
        .unit("mute", |player: Arc<PlayerModel>, (muted,): (bool,)| async move {
            player.set_muted(muted);
            Ok::<_, PlayerError>(())
        })
        .value("greeting_count", |player: Arc<PlayerModel>, (): ()| async move {
            Ok::<_, PlayerError>(player.greeting_count())
        })
        .value("history", |player: Arc<PlayerModel>, (): ()| async move {
            Ok::<_, PlayerError>(player.history())
        })
        .value("profile", |player: Arc<PlayerModel>, (): ()| async move {
            Ok::<_, PlayerError>(player.profile())
        })
        .build()
}

/// Spawns the player actor with `key` and returns its client.
pub fn spawn(
    system: &ActorSystem,
    key: i64,
    name: impl Into<String>,
) -> Result<PlayerClient, FrameworkError> {
    let name = name.into();
    let actor = system.spawn(player_id(key, SERVICE_ID), catalog(system), move |_| {
        PlayerModel::new(name)
    })?;
    Ok(PlayerClient::new(ActorRef::new(actor)))
}
