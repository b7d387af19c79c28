//! # Actor Sample
//!
//! Starts the [`GameSystem`], greets both players through the greeter, then
//! mutes Bob to show a player failure travelling back to the caller.

use actor_runtime::tracing::setup_tracing;
use actor_sample::lifecycle::GameSystem;
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_tracing();

    info!("Starting game system");
    let game = GameSystem::new()?;

    let span = tracing::info_span!("greetings");
    async {
        for key in [1, 2] {
            let reply = game.greeter.greet(key, "Good morning").await?;
            info!(key, %reply, "Player answered");
        }
        Ok::<_, actor_sample::greeter_actor::GreeterError>(())
    }
    .instrument(span)
    .await?;

    if let Some(bob) = game.player(2) {
        bob.mute(true).await?;
        match game.greeter.greet(2, "Are you there?").await {
            Ok(reply) => info!(%reply, "Bob answered"),
            Err(e) => error!(error = %e, "Greeting failed"),
        }
        let profile = bob.profile().await?;
        info!(?profile, "Bob's profile");
    }

    game.greeter.announce(1, "Goodbye everyone").await?;
    let replies = game.greeter.replies().await?;
    info!(count = replies.len(), "Greeter collected replies");

    game.shutdown();
    info!("Application completed successfully");
    Ok(())
}
