//! Process launcher
//!
//! Starts every rank of a run as a child process of the current executable,
//! the way `mpirun -np <p>` would, and waits for all of them.
//!
//! # Lifecycle
//!
//! 1. Find a free localhost port for the controller listener
//! 2. Spawn `np` children in rank mode, rank 0 first
//! 3. Poll the children until all have exited; the run succeeds only if all
//!    exit 0
//!
//! As with `mpirun`, the first rank to exit with a failure ends the run: the
//! ranks still running are killed, since they may be waiting on the one that
//! died. Children inherit stdout and stderr, so walker and controller lines
//! reach the user directly.

use crate::config::LaunchConfig;
use crate::walker::step::clock_seed;
use crate::Result;
use anyhow::Context;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// How often running ranks are checked for exit
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Launches and supervises the ranks of one run
pub struct Launcher {
    config: LaunchConfig,
    debug: bool,
}

/// Exit status of one rank
#[derive(Debug)]
pub struct RankExit {
    pub rank: u32,
    pub status: ExitStatus,
}

/// Exit statuses of every rank of a run
#[derive(Debug)]
pub struct LaunchReport {
    pub exits: Vec<RankExit>,
}

impl LaunchReport {
    /// Whether every rank exited successfully
    pub fn success(&self) -> bool {
        self.exits.iter().all(|e| e.status.success())
    }

    /// Ranks that did not exit successfully
    pub fn failed(&self) -> impl Iterator<Item = &RankExit> {
        self.exits.iter().filter(|e| !e.status.success())
    }
}

impl Launcher {
    pub fn new(config: LaunchConfig, debug: bool) -> Self {
        Self { config, debug }
    }

    /// Run all ranks with `args` as their positional arguments
    ///
    /// The base seed is resolved here so every rank derives its seed from
    /// the same value.
    pub fn run(&self, args: &[String]) -> Result<LaunchReport> {
        let port = find_available_port(self.config.base_port, self.config.port_range)?;
        let root_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let exe = std::env::current_exe().context("Failed to get current executable path")?;
        let base_seed = self.config.seed.unwrap_or_else(clock_seed);

        debug!(np = self.config.np, %root_addr, base_seed, "launching ranks");

        let mut children: Vec<(u32, Child)> = Vec::with_capacity(self.config.np as usize);
        for rank in 0..self.config.np {
            let mut cmd = Command::new(&exe);
            self.rank_command(&mut cmd, rank, root_addr, base_seed, args);

            match cmd.spawn() {
                Ok(child) => {
                    debug!(rank, pid = child.id(), "rank started");
                    children.push((rank, child));
                }
                Err(e) => {
                    kill_all(children);
                    return Err(e).with_context(|| format!("Failed to spawn rank {}", rank));
                }
            }
        }

        let report = supervise(children)?;
        for exit in report.failed() {
            warn!(rank = exit.rank, status = %exit.status, "rank failed");
        }

        Ok(report)
    }

    /// Fill in the command line for one rank
    fn rank_command(
        &self,
        cmd: &mut Command,
        rank: u32,
        root_addr: SocketAddr,
        base_seed: u64,
        args: &[String],
    ) {
        cmd.arg("--mode").arg("rank");
        cmd.arg("--rank").arg(rank.to_string());
        cmd.arg("--world-size").arg(self.config.np.to_string());
        cmd.arg("--root-addr").arg(root_addr.to_string());
        cmd.arg("--connect-timeout-ms")
            .arg(self.config.connect_timeout_ms.to_string());
        cmd.arg("--seed").arg(base_seed.to_string());

        if self.debug {
            cmd.arg("--debug");
        }

        cmd.arg("--").args(args);

        // Identity comes from flags only
        cmd.env_remove("RANDWALK_RANK");
        cmd.env_remove("RANDWALK_WORLD_SIZE");
        cmd.env_remove("RANDWALK_ROOT_ADDR");

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
    }
}

/// Find an available port for the controller listener
///
/// Tries `base_port .. base_port + range` on 127.0.0.1.
pub fn find_available_port(base_port: u16, range: u16) -> Result<u16> {
    let end = base_port.saturating_add(range);

    for port in base_port..end {
        if let Ok(listener) = TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
            drop(listener);
            debug!(port, "port is available");
            return Ok(port);
        }
    }

    anyhow::bail!(
        "No available ports found in range {}-{}. Use --base-port to pick another range.",
        base_port,
        end.saturating_sub(1)
    )
}

/// Wait for every rank, ending the run at the first failure
///
/// # Returns
///
/// One exit per rank, sorted by rank. Ranks killed after another rank failed
/// report the status of the kill.
fn supervise(mut running: Vec<(u32, Child)>) -> Result<LaunchReport> {
    let mut exits = Vec::with_capacity(running.len());

    while !running.is_empty() {
        let mut i = 0;
        while i < running.len() {
            let rank = running[i].0;
            let polled = match running[i].1.try_wait() {
                Ok(polled) => polled,
                Err(e) => {
                    kill_all(running);
                    return Err(e).with_context(|| format!("Failed to wait for rank {}", rank));
                }
            };

            let Some(status) = polled else {
                i += 1;
                continue;
            };

            debug!(rank, %status, "rank exited");
            running.swap_remove(i);
            exits.push(RankExit { rank, status });

            // One rank failed: the others may be blocked on it
            if !status.success() {
                warn!(rank, %status, remaining = running.len(), "rank failed, stopping the run");
                exits.extend(kill_all(std::mem::take(&mut running)));
            }
        }

        if !running.is_empty() {
            thread::sleep(POLL_INTERVAL);
        }
    }

    exits.sort_by_key(|exit| exit.rank);
    Ok(LaunchReport { exits })
}

/// Kill and reap children that are still running
fn kill_all(children: Vec<(u32, Child)>) -> Vec<RankExit> {
    let mut exits = Vec::with_capacity(children.len());
    for (rank, mut child) in children {
        if let Err(e) = child.kill() {
            debug!(rank, error = %e, "kill failed");
        }
        match child.wait() {
            Ok(status) => exits.push(RankExit { rank, status }),
            Err(e) => debug!(rank, error = %e, "could not reap rank"),
        }
    }
    exits
}
