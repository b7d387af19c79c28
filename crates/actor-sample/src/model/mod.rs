//! Actor models: the state each actor hosts, plus the payloads they exchange.

pub mod greeter;
pub mod player;

pub use greeter::*;
pub use player::*;
