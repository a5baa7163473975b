//! Role assignment
//!
//! Rank 0 controls, every other rank walks. Each role carries only what it
//! needs: the controller its walker count, the walker its parameters and a
//! step source seeded for its rank.

use crate::config::{ProcessIdentity, SimulationConfig};
use crate::controller::Controller;
use crate::walker::step::RandomSteps;
use crate::walker::Walker;

/// What this process does for the run
pub enum Role {
    Controller(Controller),
    Walker(Walker<RandomSteps>),
}

impl Role {
    /// Pick the role for `identity`
    ///
    /// Deterministic in all inputs; the caller supplies the base seed.
    pub fn assign(identity: ProcessIdentity, params: SimulationConfig, base_seed: u64) -> Self {
        if identity.is_root() {
            Role::Controller(Controller::new(identity.num_walkers()))
        } else {
            let source = RandomSteps::for_rank(identity.rank, base_seed);
            Role::Walker(Walker::new(identity.rank, params, source))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Controller(_) => "controller",
            Role::Walker(_) => "walker",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: SimulationConfig = SimulationConfig { domain_size: 3, max_steps: 50 };

    #[test]
    fn test_rank_zero_controls() {
        match Role::assign(ProcessIdentity { rank: 0, world_size: 5 }, PARAMS, 1) {
            Role::Controller(c) => assert_eq!(c.num_walkers(), 4),
            other => panic!("expected controller, got {}", other.name()),
        }
    }

    #[test]
    fn test_single_process_controller_has_no_walkers() {
        match Role::assign(ProcessIdentity { rank: 0, world_size: 1 }, PARAMS, 1) {
            Role::Controller(c) => assert_eq!(c.num_walkers(), 0),
            other => panic!("expected controller, got {}", other.name()),
        }
    }

    #[test]
    fn test_other_ranks_walk() {
        for rank in 1..5 {
            match Role::assign(ProcessIdentity { rank, world_size: 5 }, PARAMS, 1) {
                Role::Walker(w) => {
                    assert_eq!(w.rank(), rank);
                    assert_eq!(*w.params(), PARAMS);
                }
                other => panic!("expected walker, got {}", other.name()),
            }
        }
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let identity = ProcessIdentity { rank: 2, world_size: 3 };
        let walk = |role: Role| match role {
            Role::Walker(mut w) => w.walk(),
            other => panic!("expected walker, got {}", other.name()),
        };

        assert_eq!(
            walk(Role::assign(identity, PARAMS, 99)),
            walk(Role::assign(identity, PARAMS, 99))
        );
    }
}
