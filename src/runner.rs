//! Body of one rank process
//!
//! Runs between world init and teardown: checks the positional arguments,
//! assigns the role, and drives it. Finalize is called on every path that
//! does not fail, including the usage-error path, so all ranks leave together.

use crate::comm::Communicator;
use crate::config::cli_convert::USAGE;
use crate::config::{ProcessIdentity, SimulationConfig};
use crate::role::Role;
use crate::Result;
use anyhow::Context;
use tracing::{debug, info};

/// How a rank finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The role ran to completion
    Completed,
    /// Wrong number of positional arguments; nothing was simulated
    UsageError,
}

/// Run this rank's part of the simulation on an initialized world
pub async fn run_rank<C, S>(mut comm: C, args: &[S], base_seed: u64) -> Result<RunStatus>
where
    C: Communicator,
    S: AsRef<str>,
{
    let identity = ProcessIdentity {
        rank: comm.rank(),
        world_size: comm.size(),
    };

    let Some(params) = SimulationConfig::from_args(args) else {
        if identity.is_root() {
            eprintln!("{}", USAGE);
        }
        comm.finalize().await.context("Failed to finalize world")?;
        return Ok(RunStatus::UsageError);
    };

    let role = Role::assign(identity, params, base_seed);
    info!(rank = identity.rank, world_size = identity.world_size, role = role.name(), %params, "starting");

    match role {
        Role::Controller(controller) => {
            let tally = controller.run(&mut comm).await?;
            debug!(completed = tally.completed(), "all walkers reported");
        }
        Role::Walker(walker) => {
            walker.run(&mut comm).await?;
        }
    }

    comm.finalize().await.context("Failed to finalize world")?;
    Ok(RunStatus::Completed)
}
