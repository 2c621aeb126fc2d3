//! Round statistics and their aggregation over a session.

use std::fmt;

use crate::episode::{Outcome, TerminalReason};
use crate::types::Role;
use crate::wire::Transition;

/// Reward bookkeeping for one role over one round.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RoleStats {
    /// Sum of transition rewards.
    pub reward_sum: f64,
    /// Number of transitions emitted.
    pub transitions: u64,
}

/// Statistics for one finished round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundStats {
    pub episode: u64,
    pub outcome: Outcome,
    pub reason: TerminalReason,
    /// Name of the winning agent.
    pub winner: String,
    /// Simulated seconds from reset to resolution.
    pub duration: f64,
    /// Physics ticks in the round.
    pub ticks: u64,
    /// Seeker/hider distance averaged over ticks.
    pub mean_distance: f64,
    pub seeker: RoleStats,
    pub hider: RoleStats,
}

/// Collects per-tick samples while a round runs.
#[derive(Debug, Clone, Default)]
pub struct RoundAccumulator {
    distance_sum: f64,
    ticks: u64,
    seeker: RoleStats,
    hider: RoleStats,
}

impl RoundAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one tick's pair distance.
    pub fn observe_tick(&mut self, pair_distance: f64) {
        if pair_distance.is_finite() {
            self.distance_sum += pair_distance;
        }
        self.ticks += 1;
    }

    /// Adds the rewards of a closed cycle.
    pub fn observe_transitions(&mut self, transitions: &[Transition]) {
        for t in transitions {
            let stats = match t.info.role {
                Role::Seeker => &mut self.seeker,
                Role::Hider => &mut self.hider,
            };
            stats.reward_sum += t.reward;
            stats.transitions += 1;
        }
    }

    /// Produces the final statistics and resets the accumulator.
    pub fn finish(
        &mut self,
        episode: u64,
        outcome: Outcome,
        reason: TerminalReason,
        winner: String,
        duration: f64,
    ) -> RoundStats {
        let acc = std::mem::take(self);
        RoundStats {
            episode,
            outcome,
            reason,
            winner,
            duration,
            ticks: acc.ticks,
            mean_distance: if acc.ticks > 0 {
                acc.distance_sum / acc.ticks as f64
            } else {
                0.0
            },
            seeker: acc.seeker,
            hider: acc.hider,
        }
    }
}

/// Aggregated results over a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub rounds: usize,
    pub seeker_wins: usize,
    pub hider_wins: usize,
    pub tags: usize,
    pub timeouts: usize,
    pub truncations: usize,
    pub mean_duration: f64,
    pub mean_distance: f64,
    pub mean_seeker_reward: f64,
    pub mean_hider_reward: f64,
}

impl SessionSummary {
    /// Aggregates finished rounds.
    pub fn from_rounds(rounds: &[RoundStats]) -> Self {
        if rounds.is_empty() {
            return Self::default();
        }
        let n = rounds.len() as f64;
        let mean = |f: fn(&RoundStats) -> f64| rounds.iter().map(f).sum::<f64>() / n;
        let count_reason = |r: TerminalReason| rounds.iter().filter(|s| s.reason == r).count();
        let seeker_wins = rounds
            .iter()
            .filter(|s| s.outcome == Outcome::SeekerWon)
            .count();

        Self {
            rounds: rounds.len(),
            seeker_wins,
            hider_wins: rounds.len() - seeker_wins,
            tags: count_reason(TerminalReason::Tag),
            timeouts: count_reason(TerminalReason::Timeout),
            truncations: count_reason(TerminalReason::MaxSteps),
            mean_duration: mean(|s| s.duration),
            mean_distance: mean(|s| s.mean_distance),
            mean_seeker_reward: mean(|s| s.seeker.reward_sum),
            mean_hider_reward: mean(|s| s.hider.reward_sum),
        }
    }

    /// Fraction of rounds won by the seeker.
    pub fn seeker_win_rate(&self) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            self.seeker_wins as f64 / self.rounds as f64
        }
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Session Summary ({} rounds) ===", self.rounds)?;
        writeln!(
            f,
            "  Seeker wins:          {} ({:.1}%)",
            self.seeker_wins,
            self.seeker_win_rate() * 100.0
        )?;
        writeln!(f, "  Hider wins:           {}", self.hider_wins)?;
        writeln!(
            f,
            "  Tags / timeouts / max_steps: {} / {} / {}",
            self.tags, self.timeouts, self.truncations
        )?;
        writeln!(f, "  Mean duration:        {:.2}s", self.mean_duration)?;
        writeln!(f, "  Mean pair distance:   {:.2}", self.mean_distance)?;
        writeln!(f, "  Mean seeker reward:   {:.3}", self.mean_seeker_reward)?;
        write!(f, "  Mean hider reward:    {:.3}", self.mean_hider_reward)
    }
}
