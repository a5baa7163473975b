//! randwalk - parallel bounded random walks
//!
//! Runs many independent one-dimensional random walks in separate processes.
//! Rank 0 is the controller; every other rank is a walker that walks until it
//! leaves `[-domain_size, domain_size]` or runs out of steps, then reports its
//! step count to the controller exactly once. The controller waits for one
//! report per walker, in any order, and then declares the run complete.
//!
//! # Architecture
//!
//! - **Launcher**: starts one child process per rank (like `mpirun`)
//! - **Comm**: minimal message passing with blocking send and any-source receive
//! - **Role**: rank 0 becomes the controller, all others walkers
//! - **Walker / Controller**: the two halves of the completion protocol

pub mod comm;
pub mod config;
pub mod controller;
pub mod launcher;
pub mod logging;
pub mod role;
pub mod runner;
pub mod walker;

// Re-export commonly used types
pub use config::{ProcessIdentity, SimulationConfig};
pub use role::Role;

/// Result type used throughout randwalk
pub type Result<T> = anyhow::Result<T>;
