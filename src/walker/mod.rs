//! Walker role
//!
//! A walker runs one bounded random walk starting at position 0 and reports
//! how many steps it took to the controller, exactly once.
//!
//! # Termination
//!
//! - **Out of domain**: the position left `[-domain_size, domain_size]`;
//!   the report is the step count at that moment.
//! - **Budget exhausted**: all `max_steps` steps were taken while staying in
//!   the domain; the report is `max_steps`.
//!
//! A zero (or negative) budget takes no step and draws nothing.

pub mod step;

use crate::comm::{Communicator, Rank, COMPLETION_TAG, ROOT_RANK};
use crate::config::SimulationConfig;
use crate::Result;
use anyhow::Context;
use step::StepSource;
use tracing::debug;

/// Why a walk stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    OutOfDomain,
    BudgetExhausted,
}

/// Result of one walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOutcome {
    /// Steps taken; this is the completion report
    pub steps: u64,
    /// Final position
    pub position: i64,
    pub termination: Termination,
}

/// One walker process
pub struct Walker<S: StepSource> {
    rank: Rank,
    params: SimulationConfig,
    source: S,
}

impl<S: StepSource> Walker<S> {
    pub fn new(rank: Rank, params: SimulationConfig, source: S) -> Self {
        Self { rank, params, source }
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn params(&self) -> &SimulationConfig {
        &self.params
    }

    /// Run the walk to termination
    pub fn walk(&mut self) -> WalkOutcome {
        let budget = self.params.step_budget();
        let mut position: i64 = 0;
        let mut steps: u64 = 0;

        while steps < budget {
            position = position.saturating_add(self.source.next_step());
            steps += 1;

            if !self.params.in_domain(position) {
                return WalkOutcome {
                    steps,
                    position,
                    termination: Termination::OutOfDomain,
                };
            }
        }

        WalkOutcome {
            steps,
            position,
            termination: Termination::BudgetExhausted,
        }
    }

    /// Walk, print the completion line, and send the single report to the root
    pub async fn run<C: Communicator>(mut self, comm: &mut C) -> Result<WalkOutcome> {
        let outcome = self.walk();
        debug!(
            rank = self.rank,
            steps = outcome.steps,
            position = outcome.position,
            termination = ?outcome.termination,
            "walk finished"
        );

        println!("{}", completion_line(self.rank, outcome.steps));

        comm.send(outcome.steps, ROOT_RANK, COMPLETION_TAG)
            .await
            .context("Failed to send completion report")?;

        Ok(outcome)
    }
}

/// Line printed by a walker when it finishes
pub fn completion_line(rank: Rank, steps: u64) -> String {
    format!("Rank {}: Walker finished in {} steps.", rank, steps)
}
