//! Shaped reward for one agent over one scheduler cycle.
//!
//! Combines distance-progress shaping, per-cycle role terms, situational
//! bonuses and terminal adjustments, then clamps the result.

use crate::config::RewardConfig;
use crate::types::Role;

/// Terminal events that happened during the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TerminalFlags {
    /// The clock ran out.
    pub timed_out: bool,
    /// The seeker tagged the hider.
    pub tagged: bool,
}

/// Everything the shaper needs for one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardInputs {
    pub role: Role,
    /// `previous_pair_distance - current_pair_distance`.
    pub progress: f64,
    pub pair_distance: f64,
    /// The agent's last applied action crossed the jump threshold.
    pub jumped: bool,
    /// Height of the agent above the floor.
    pub elevation: f64,
    pub terminal: TerminalFlags,
}

/// Computes shaped rewards.
pub struct RewardShaper;

impl RewardShaper {
    /// Computes the reward for one agent.
    ///
    /// # Components
    ///
    /// 1. **Progress shaping**: `±progress × distance_scale` (positive for the seeker).
    /// 2. **Role term**: `seeker_time_penalty` for the seeker, `hider_survival_bonus` for the hider.
    /// 3. **Situational bonus**: near-tag jump (seeker) or high ground (hider).
    /// 4. **Timeout**: seeker `-timeout_penalty`, hider `+timeout_bonus`.
    /// 5. **Tag**: seeker `+win_bonus`, hider `-tag_penalty`.
    ///
    /// The sum is clamped to `±reward_clip`; a non-finite sum yields 0.
    pub fn compute(inputs: &RewardInputs, config: &RewardConfig) -> f64 {
        let progress = if inputs.progress.is_finite() {
            inputs.progress
        } else {
            0.0
        };

        let mut reward = match inputs.role {
            Role::Seeker => {
                let mut r = progress * config.distance_scale + config.seeker_time_penalty;
                if inputs.jumped && inputs.pair_distance <= config.near_tag_distance {
                    r += config.near_jump_bonus;
                }
                r
            }
            Role::Hider => {
                let mut r = -progress * config.distance_scale + config.hider_survival_bonus;
                if inputs.elevation > config.high_ground_height {
                    r += config.high_ground_bonus;
                }
                r
            }
        };

        if inputs.terminal.timed_out {
            reward += match inputs.role {
                Role::Seeker => -config.timeout_penalty,
                Role::Hider => config.timeout_bonus,
            };
        }
        if inputs.terminal.tagged {
            reward += match inputs.role {
                Role::Seeker => config.win_bonus,
                Role::Hider => -config.tag_penalty,
            };
        }

        if reward.is_finite() {
            reward.clamp(-config.reward_clip, config.reward_clip)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(role: Role, progress: f64) -> RewardInputs {
        RewardInputs {
            role,
            progress,
            pair_distance: 10.0,
            jumped: false,
            elevation: 0.0,
            terminal: TerminalFlags::default(),
        }
    }

    #[test]
    fn progress_is_shared_and_sign_flipped() {
        let cfg = RewardConfig::default();
        let s = RewardShaper::compute(&inputs(Role::Seeker, 1.0), &cfg);
        let h = RewardShaper::compute(&inputs(Role::Hider, 1.0), &cfg);
        assert!((s - (0.1 - 0.01)).abs() < 1e-12);
        assert!((h - (-0.1 + 0.01)).abs() < 1e-12);
    }

    #[test]
    fn near_jump_bonus_needs_both_conditions() {
        let cfg = RewardConfig::default();
        let mut i = inputs(Role::Seeker, 0.0);
        i.jumped = true;
        let far = RewardShaper::compute(&i, &cfg);
        i.pair_distance = 2.0;
        let near = RewardShaper::compute(&i, &cfg);
        assert!((near - far - cfg.near_jump_bonus).abs() < 1e-12);
    }

    #[test]
    fn high_ground_bonus() {
        let cfg = RewardConfig::default();
        let mut i = inputs(Role::Hider, 0.0);
        let low = RewardShaper::compute(&i, &cfg);
        i.elevation = 2.0;
        let high = RewardShaper::compute(&i, &cfg);
        assert!((high - low - cfg.high_ground_bonus).abs() < 1e-12);
    }

    #[test]
    fn terminal_adjustments() {
        let cfg = RewardConfig::default();
        let mut s = inputs(Role::Seeker, 0.0);
        let mut h = inputs(Role::Hider, 0.0);
        s.terminal.timed_out = true;
        h.terminal.timed_out = true;
        assert!((RewardShaper::compute(&s, &cfg) - (-0.01 - 5.0)).abs() < 1e-12);
        assert!((RewardShaper::compute(&h, &cfg) - (0.01 + 5.0)).abs() < 1e-12);

        s.terminal = TerminalFlags { timed_out: false, tagged: true };
        h.terminal = s.terminal;
        assert!((RewardShaper::compute(&s, &cfg) - (-0.01 + 5.0)).abs() < 1e-12);
        assert!((RewardShaper::compute(&h, &cfg) - (0.01 - 5.0)).abs() < 1e-12);
    }

    #[test]
    fn clamped_and_finite() {
        let cfg = RewardConfig::default();
        let r = RewardShaper::compute(&inputs(Role::Seeker, 1e6), &cfg);
        assert_eq!(r, cfg.reward_clip);
        let r = RewardShaper::compute(&inputs(Role::Hider, f64::NAN), &cfg);
        assert!(r.is_finite());
        let huge = RewardConfig {
            win_bonus: f64::INFINITY,
            ..RewardConfig::default()
        };
        let mut i = inputs(Role::Seeker, 0.0);
        i.terminal.tagged = true;
        assert_eq!(RewardShaper::compute(&i, &huge), 0.0);
    }
}
