//! Controller role
//!
//! The controller (rank 0) does no walking. It performs one blocking
//! any-source receive per walker and declares the run complete once every
//! walker has reported. Reports are accepted in whatever order they arrive.
//!
//! There is no timeout: a walker that never reports keeps the controller
//! waiting forever.

use crate::comm::{Communicator, Rank, COMPLETION_TAG};
use crate::Result;
use anyhow::Context;
use tracing::{debug, warn};

/// One received completion report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub source: Rank,
    pub steps: u64,
}

/// Reports collected by a controller, in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionTally {
    reports: Vec<Report>,
}

impl CompletionTally {
    /// Number of reports received
    pub fn completed(&self) -> u32 {
        self.reports.len() as u32
    }

    fn record(&mut self, report: Report) -> bool {
        let first = !self.reports.iter().any(|r| r.source == report.source);
        self.reports.push(report);
        first
    }
}

/// Controller process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controller {
    num_walkers: u32,
}

impl Controller {
    pub fn new(num_walkers: u32) -> Self {
        Self { num_walkers }
    }

    pub fn num_walkers(&self) -> u32 {
        self.num_walkers
    }

    /// Collect one report per walker, then print the summary line
    pub async fn run<C: Communicator>(&self, comm: &mut C) -> Result<CompletionTally> {
        let mut tally = CompletionTally::default();

        while tally.completed() < self.num_walkers {
            let (steps, status) = comm
                .recv_any(COMPLETION_TAG)
                .await
                .context("Failed to receive completion report")?;

            debug!(
                source = status.source,
                steps,
                received = tally.completed() + 1,
                expected = self.num_walkers,
                "completion report"
            );

            if !tally.record(Report { source: status.source, steps }) {
                warn!(source = status.source, "walker reported more than once");
            }
        }

        println!("{}", summary_line(tally.completed()));
        Ok(tally)
    }
}

/// Line printed by the controller once every walker has reported
pub fn summary_line(num_walkers: u32) -> String {
    format!("Controller: All {} walkers have completed their walks.", num_walkers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{LocalEndpoint, LocalWorld, ROOT_RANK};
    use std::collections::BTreeMap;
    use std::time::Duration;

    /// Reports received per source rank
    fn per_source(tally: &CompletionTally) -> BTreeMap<Rank, usize> {
        let mut counts = BTreeMap::new();
        for report in &tally.reports {
            *counts.entry(report.source).or_insert(0) += 1;
        }
        counts
    }

    fn split(world_size: u32) -> (LocalEndpoint, Vec<LocalEndpoint>) {
        let mut endpoints = LocalWorld::create(world_size);
        let root = endpoints.remove(0);
        (root, endpoints)
    }

    #[tokio::test]
    async fn test_no_walkers_completes_without_receiving() {
        let (mut root, _) = split(1);
        let controller = Controller::new(0);

        let tally = tokio::time::timeout(Duration::from_millis(200), controller.run(&mut root))
            .await
            .expect("controller with no walkers must not block")
            .unwrap();

        assert_eq!(tally.completed(), 0);
    }

    #[tokio::test]
    async fn test_collects_reports_in_any_order() {
        let (mut root, mut walkers) = split(4);

        // Reverse rank order
        for walker in walkers.iter_mut().rev() {
            let steps = walker.rank() as u64 * 7;
            walker.send(steps, ROOT_RANK, COMPLETION_TAG).await.unwrap();
        }

        let tally = Controller::new(3).run(&mut root).await.unwrap();

        assert_eq!(tally.completed(), 3);
        let sources: Vec<Rank> = tally.reports.iter().map(|r| r.source).collect();
        assert_eq!(sources, vec![3, 2, 1]);
        for report in &tally.reports {
            assert_eq!(report.steps, report.source as u64 * 7);
        }
        assert!(per_source(&tally).values().all(|&n| n == 1));
    }

    #[tokio::test]
    async fn test_concurrent_walkers() {
        let (mut root, walkers) = split(9);

        let handles: Vec<_> = walkers
            .into_iter()
            .map(|mut walker| {
                tokio::spawn(async move {
                    let delay = 5 * (9 - walker.rank() as u64);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    walker.send(1, ROOT_RANK, COMPLETION_TAG).await.unwrap();
                })
            })
            .collect();

        let tally = Controller::new(8).run(&mut root).await.unwrap();
        assert_eq!(tally.completed(), 8);
        assert_eq!(per_source(&tally).len(), 8);

        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_blocks_until_last_report() {
        let (mut root, mut walkers) = split(4);
        walkers[0].send(5, ROOT_RANK, COMPLETION_TAG).await.unwrap();
        walkers[1].send(6, ROOT_RANK, COMPLETION_TAG).await.unwrap();

        let controller = Controller::new(3);
        let waited = tokio::time::timeout(Duration::from_millis(200), controller.run(&mut root)).await;
        assert!(waited.is_err(), "controller finished with a report missing");
    }

    #[tokio::test]
    async fn test_ignores_reports_beyond_num_walkers() {
        let (mut root, mut walkers) = split(3);
        walkers[0].send(1, ROOT_RANK, COMPLETION_TAG).await.unwrap();
        walkers[1].send(2, ROOT_RANK, COMPLETION_TAG).await.unwrap();
        walkers[1].send(3, ROOT_RANK, COMPLETION_TAG).await.unwrap();

        let tally = Controller::new(2).run(&mut root).await.unwrap();
        assert_eq!(tally.completed(), 2);

        // The extra report is still queued, not consumed
        let (steps, _) = root.recv_any(COMPLETION_TAG).await.unwrap();
        assert_eq!(steps, 3);
    }

    #[test]
    fn test_summary_line_mentions_tally() {
        assert_eq!(summary_line(3), "Controller: All 3 walkers have completed their walks.");
    }
}
