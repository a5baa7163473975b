//! CLI argument parsing using clap

use super::ProcessIdentity;
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Launch mode (default) - start every rank of a run on this machine
    Launch,
    /// Rank mode - run a single rank (started by the launcher)
    Rank,
}

/// randwalk - parallel bounded random walks
#[derive(Parser, Debug)]
#[command(name = "randwalk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: launch or rank
    #[arg(long, value_enum, default_value = "launch")]
    pub mode: ExecutionMode,

    /// Number of processes to start, controller included (launch mode)
    #[arg(short = 'n', long = "np")]
    pub np: Option<u32>,

    /// TOML launch file (CLI flags take precedence)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// First port tried for the controller listener
    #[arg(long)]
    pub base_port: Option<u16>,

    /// Number of ports to try above --base-port
    #[arg(long)]
    pub port_range: Option<u16>,

    /// How long walkers retry connecting to the controller (milliseconds)
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    /// Base seed for reproducible runs (the rank is mixed in per process)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Rank of this process (rank mode)
    #[arg(long, env = "RANDWALK_RANK", hide = true)]
    pub rank: Option<u32>,

    /// Total number of processes (rank mode)
    #[arg(long, env = "RANDWALK_WORLD_SIZE", hide = true)]
    pub world_size: Option<u32>,

    /// Address the controller listens on (rank mode)
    #[arg(long, env = "RANDWALK_ROOT_ADDR", hide = true)]
    pub root_addr: Option<SocketAddr>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// <domain_size> <max_steps>
    ///
    /// Flags may come before or after these; negative numbers are values.
    #[arg(value_name = "ARGS", num_args = 0.., allow_negative_numbers = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate mode-specific requirements
    ///
    /// The positional argument count is deliberately not checked here: it is
    /// checked by every rank after the world is up, so only rank 0 reports it.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.mode {
            ExecutionMode::Launch => {
                if self.rank.is_some() || self.world_size.is_some() {
                    anyhow::bail!("--rank and --world-size are only valid with --mode rank");
                }
            }
            ExecutionMode::Rank => {
                let identity = self.identity()?;
                if identity.world_size == 0 {
                    anyhow::bail!("world size must be at least 1");
                }
                if identity.rank >= identity.world_size {
                    anyhow::bail!(
                        "rank {} out of range for world size {}",
                        identity.rank,
                        identity.world_size
                    );
                }
                if self.root_addr.is_none() {
                    anyhow::bail!("rank mode requires --root-addr");
                }
            }
        }

        Ok(())
    }

    /// Identity of this process in rank mode
    pub fn identity(&self) -> anyhow::Result<ProcessIdentity> {
        match (self.rank, self.world_size) {
            (Some(rank), Some(world_size)) => Ok(ProcessIdentity { rank, world_size }),
            _ => anyhow::bail!("rank mode requires --rank and --world-size"),
        }
    }
}
