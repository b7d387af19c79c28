//! # Actor Sample Library
//!
//! A small game server built on `actor_runtime`: players that can be greeted
//! and a greeter that calls them over RPC. Exposed as a library for the
//! integration tests.

pub mod clients;
pub mod greeter_actor;
pub mod lifecycle;
pub mod model;
pub mod player_actor;
