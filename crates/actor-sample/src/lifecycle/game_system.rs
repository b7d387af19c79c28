use crate::clients::{GreeterClient, PlayerClient};
use crate::{greeter_actor, player_actor};
use actor_runtime::{ActorSystem, FrameworkError, ScheduleOptions, TokioPool};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Service id every sample actor lives on.
pub const SERVICE_ID: u32 = 1;

/// The sample game server: two players and a greeter on one [`ActorSystem`].
///
/// # Example
///
/// ```rust
/// use actor_sample::lifecycle::GameSystem;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let game = GameSystem::new()?;
///     let reply = game.greeter.greet(1, "hello").await?;
///     assert_eq!(reply, "Alice answers: hello!");
///     game.shutdown();
///     Ok(())
/// }
/// ```
pub struct GameSystem {
    pub greeter: GreeterClient,
    players: HashMap<i64, PlayerClient>,
    system: ActorSystem,
}

impl GameSystem {
    /// Starts the system on the current Tokio runtime with default options.
    pub fn new() -> Result<Self, FrameworkError> {
        Self::with_options(ScheduleOptions::default())
    }

    /// Starts the system on the current Tokio runtime.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_options(options: ScheduleOptions) -> Result<Self, FrameworkError> {
        let system = ActorSystem::new(Arc::new(TokioPool::current()), options)?;

        let mut players = HashMap::new();
        for (key, name) in [(1, "Alice"), (2, "Bob")] {
            players.insert(key, player_actor::spawn(&system, key, name)?);
        }
        let greeter = greeter_actor::spawn(&system, SERVICE_ID)?;

        info!(actors = system.len(), "Game system started");
        Ok(Self {
            greeter,
            players,
            system,
        })
    }

    pub fn player(&self, key: i64) -> Option<&PlayerClient> {
        self.players.get(&key)
    }

    pub fn system(&self) -> &ActorSystem {
        &self.system
    }

    /// Stops every actor. Calls made afterwards fail with
    /// `ActorNotRunning`.
    pub fn shutdown(&self) {
        info!("Shutting down game system...");
        self.system.shutdown();
        info!("Game system shutdown complete.");
    }
}
