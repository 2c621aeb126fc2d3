//! Observation-only pursuit/evasion policy.
//!
//! Reads the role flag and the opponent-relative position straight out of
//! the observation vector: the seeker runs at the opponent, the hider runs
//! away from it.

use super::trait_::Policy;
use crate::observation::{REL_POS_INDEX, SEEKER_FLAG_INDEX};
use crate::types::normalize2;
use crate::wire::Action;

/// Deterministic chase-or-flee baseline.
#[derive(Debug, Default)]
pub struct PursuitPolicy;

impl PursuitPolicy {
    pub fn new() -> Self {
        Self
    }

    fn act(obs: &[f64]) -> Action {
        if obs.len() <= SEEKER_FLAG_INDEX {
            return Action::ZERO;
        }
        let (dx, dz) = normalize2(obs[REL_POS_INDEX], obs[REL_POS_INDEX + 1]);
        if obs[SEEKER_FLAG_INDEX] >= 0.5 {
            Action::new(dx, dz, 0.0)
        } else {
            Action::new(-dx, -dz, 0.0)
        }
    }
}

impl Policy for PursuitPolicy {
    fn select_actions(&mut self, observations: &[Vec<f64>]) -> Vec<Action> {
        observations.iter().map(|obs| Self::act(obs)).collect()
    }

    fn name(&self) -> &str {
        "pursuit"
    }
}
