//! # Observability & Tracing
//!
//! The runtime logs through `tracing` with structured fields; it never
//! installs a subscriber itself. Applications call [`setup_tracing`] once at
//! startup.
//!
//! ## What Gets Logged
//!
//! - **Actor lifecycle** (`info`): start, exit, system shutdown.
//! - **Scheduling pressure** (`warn`): slow continuations, backlog above the
//!   configured limit (rate limited per queue), continuations that could not
//!   be executed.
//! - **Scheduler faults** (`error`): a panic that escaped a drain loop.
//! - **RPC bookkeeping** (`debug`): requests sent, callbacks completed with
//!   their elapsed time, responses without a registered callback.
//!
//! ## Usage
//!
//! ```bash
//! # Lifecycle and warnings only
//! RUST_LOG=info cargo run -p actor-sample
//!
//! # Include RPC correlation details
//! RUST_LOG=debug cargo run -p actor-sample
//!
//! # Only the runtime
//! RUST_LOG=actor_runtime=debug cargo run -p actor-sample
//! ```
//!
//! Actor events carry an `actor` field holding the actor id (for example
//! `Player/alice@1`), which is also the label of its work queue.

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`.
///
/// Calling it again is harmless: only the first subscriber is kept.
pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
