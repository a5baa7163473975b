//! Configuration module
//!
//! Handles CLI argument parsing, TOML launch files, and validation.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::comm::{Rank, ROOT_RANK};
use serde::Deserialize;
use std::fmt;

/// Parameters shared by every rank of a run
///
/// Built once from the positional arguments; identical in every process
/// because every process receives the same arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Half-width of the admissible interval `[-domain_size, domain_size]`
    pub domain_size: i64,
    /// Step budget before a walk is forced to stop
    pub max_steps: i64,
}

impl SimulationConfig {
    /// Build from the positional arguments
    ///
    /// Returns `None` unless exactly two arguments are given. Values are parsed
    /// leniently, so malformed numbers become 0 rather than errors.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Option<Self> {
        match args {
            [domain_size, max_steps] => Some(Self {
                domain_size: cli_convert::parse_int_lenient(domain_size.as_ref()),
                max_steps: cli_convert::parse_int_lenient(max_steps.as_ref()),
            }),
            _ => None,
        }
    }

    /// Number of steps a walker may take; negative budgets walk zero steps
    pub fn step_budget(&self) -> u64 {
        self.max_steps.max(0) as u64
    }

    /// Whether `position` lies within `[-domain_size, domain_size]`
    #[inline]
    pub fn in_domain(&self, position: i64) -> bool {
        position >= self.domain_size.saturating_neg() && position <= self.domain_size
    }
}

impl fmt::Display for SimulationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "domain_size={} max_steps={}", self.domain_size, self.max_steps)
    }
}

/// Position of this process in the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub rank: Rank,
    pub world_size: u32,
}

impl ProcessIdentity {
    pub fn is_root(&self) -> bool {
        self.rank == ROOT_RANK
    }

    /// Every rank except the root is a walker
    pub fn num_walkers(&self) -> u32 {
        self.world_size.saturating_sub(1)
    }
}

/// Launcher settings (CLI flags merged over an optional TOML file)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LaunchConfig {
    /// Number of processes to start, root included
    #[serde(default = "default_world_size")]
    pub np: u32,
    /// First port tried for the root listener
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    /// How many ports above `base_port` to try
    #[serde(default = "default_port_range")]
    pub port_range: u16,
    /// How long walkers keep retrying the root connection
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Base seed for reproducible runs (wall clock when absent)
    #[serde(default)]
    pub seed: Option<u64>,
}

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

fn default_world_size() -> u32 {
    4
}

fn default_base_port() -> u16 {
    9999
}

fn default_port_range() -> u16 {
    100
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            np: default_world_size(),
            base_port: default_base_port(),
            port_range: default_port_range(),
            connect_timeout_ms: default_connect_timeout_ms(),
            seed: None,
        }
    }
}

/// Layout of a TOML launch file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LaunchFile {
    #[serde(default)]
    pub launch: LaunchConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_args_requires_exactly_two() {
        assert_eq!(SimulationConfig::from_args::<&str>(&[]), None);
        assert_eq!(SimulationConfig::from_args(&["5"]), None);
        assert_eq!(SimulationConfig::from_args(&["5", "10", "15"]), None);

        let params = SimulationConfig::from_args(&["5", "10"]).unwrap();
        assert_eq!(params.domain_size, 5);
        assert_eq!(params.max_steps, 10);
    }

    #[test]
    fn test_from_args_lenient_numbers() {
        let params = SimulationConfig::from_args(&["abc", "12steps"]).unwrap();
        assert_eq!(params.domain_size, 0);
        assert_eq!(params.max_steps, 12);
    }

    #[test]
    fn test_in_domain_bounds_are_inclusive() {
        let params = SimulationConfig { domain_size: 2, max_steps: 10 };
        assert!(params.in_domain(-2));
        assert!(params.in_domain(0));
        assert!(params.in_domain(2));
        assert!(!params.in_domain(3));
        assert!(!params.in_domain(-3));
    }

    #[test]
    fn test_in_domain_degenerate_sizes() {
        let zero = SimulationConfig { domain_size: 0, max_steps: 1 };
        assert!(zero.in_domain(0));
        assert!(!zero.in_domain(1));

        let negative = SimulationConfig { domain_size: -1, max_steps: 1 };
        assert!(!negative.in_domain(0));

        let extreme = SimulationConfig { domain_size: i64::MIN, max_steps: 1 };
        assert!(!extreme.in_domain(0));
    }

    #[test]
    fn test_step_budget_clamps_negative() {
        assert_eq!(SimulationConfig { domain_size: 1, max_steps: -4 }.step_budget(), 0);
        assert_eq!(SimulationConfig { domain_size: 1, max_steps: 0 }.step_budget(), 0);
        assert_eq!(SimulationConfig { domain_size: 1, max_steps: 9 }.step_budget(), 9);
    }

    #[test]
    fn test_identity_roles() {
        let root = ProcessIdentity { rank: 0, world_size: 4 };
        assert!(root.is_root());
        assert_eq!(root.num_walkers(), 3);

        let alone = ProcessIdentity { rank: 0, world_size: 1 };
        assert_eq!(alone.num_walkers(), 0);

        assert!(!ProcessIdentity { rank: 2, world_size: 4 }.is_root());
    }
}
