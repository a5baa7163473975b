//! Minimal message passing between the ranks of a run
//!
//! # Architecture
//!
//! The ranks form a star around the root (rank 0):
//!
//! - **World**: TCP implementation used by real runs, one process per rank
//! - **LocalWorld**: in-process implementation over tokio channels, used by tests
//!
//! Both implement [`Communicator`], which is all the controller and walker see.
//!
//! # Modules
//!
//! - `protocol`: Message definitions and framing
//! - `world`: Socket-backed world (init, send, recv_any, finalize)
//! - `local`: Channel-backed world for single-process runs
//! - `error`: Typed communication errors

pub mod error;
pub mod local;
pub mod protocol;
pub mod world;

pub use error::{CommError, CommResult};
pub use local::{LocalEndpoint, LocalWorld};
pub use protocol::{Envelope, Message, PROTOCOL_VERSION};
pub use world::World;

/// Process rank within a run
pub type Rank = u32;

/// Message tag used to match sends with receives
pub type Tag = u32;

/// Rank of the controller process
pub const ROOT_RANK: Rank = 0;

/// Tag carried by walker completion reports
pub const COMPLETION_TAG: Tag = 0;

/// Metadata about a received message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Rank that sent the message
    pub source: Rank,
    /// Tag of the message
    pub tag: Tag,
}

/// Point-to-point operations shared by every world implementation
///
/// Futures returned here are not required to be `Send`; each rank drives its
/// communicator from a single task.
#[allow(async_fn_in_trait)]
pub trait Communicator {
    /// Rank of this process
    fn rank(&self) -> Rank;

    /// Number of processes in the run
    fn size(&self) -> u32;

    /// Blocking send of one integer to `dest`
    async fn send(&mut self, value: u64, dest: Rank, tag: Tag) -> CommResult<()>;

    /// Blocking receive of one integer with `tag` from any source
    ///
    /// Waits indefinitely. No timeout is applied.
    async fn recv_any(&mut self, tag: Tag) -> CommResult<(u64, Status)>;

    /// Collective teardown; every rank must call it exactly once
    async fn finalize(self) -> CommResult<()>
    where
        Self: Sized;
}
