//! Wiring of the sample actors into one running system.

pub mod game_system;

pub use game_system::*;
