//! Random policy for smoke runs and baselines.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::trait_::Policy;
use crate::wire::Action;

/// Uniformly random movement with an occasional jump.
pub struct RandomPolicy {
    rng: StdRng,
    jump_probability: f64,
}

impl RandomPolicy {
    /// Creates a seeded random policy.
    ///
    /// # Arguments
    ///
    /// * `seed` - RNG seed
    /// * `jump_probability` - Chance per action that the jump intent is set
    pub fn new(seed: u64, jump_probability: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            jump_probability: jump_probability.clamp(0.0, 1.0),
        }
    }
}

impl Policy for RandomPolicy {
    fn select_actions(&mut self, observations: &[Vec<f64>]) -> Vec<Action> {
        observations
            .iter()
            .map(|_| {
                let x = self.rng.gen_range(-1.0..=1.0);
                let z = self.rng.gen_range(-1.0..=1.0);
                let jump = if self.rng.gen_bool(self.jump_probability) {
                    1.0
                } else {
                    0.0
                };
                Action::new(x, z, jump)
            })
            .collect()
    }

    fn name(&self) -> &str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_policy_returns_correct_count() {
        let mut policy = RandomPolicy::new(1, 0.1);
        let obs = vec![vec![0.0; 12]; 4];
        assert_eq!(policy.select_actions(&obs).len(), 4);
    }

    #[test]
    fn random_actions_stay_in_unit_disc() {
        let mut policy = RandomPolicy::new(2, 0.5);
        let obs = vec![vec![0.0; 12]; 200];
        for a in policy.select_actions(&obs) {
            assert!(a.move_x.hypot(a.move_z) <= 1.0 + 1e-12);
            assert!(a.jump_intent == 0.0 || a.jump_intent == 1.0);
        }
    }

    #[test]
    fn same_seed_same_actions() {
        let obs = vec![vec![0.0; 12]; 8];
        let a = RandomPolicy::new(9, 0.2).select_actions(&obs);
        let b = RandomPolicy::new(9, 0.2).select_actions(&obs);
        assert_eq!(a, b);
    }
}
