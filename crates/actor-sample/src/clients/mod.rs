//! Typed wrappers around [`ActorRef`](actor_runtime::ActorRef).

pub mod greeter_client;
pub mod player_client;

pub use greeter_client::*;
pub use player_client::*;
