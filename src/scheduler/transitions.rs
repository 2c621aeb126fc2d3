//! Per-cycle transition assembly for the seeker/hider pair.

use std::collections::BTreeMap;

use crate::config::RewardConfig;
use crate::episode::TerminalReason;
use crate::observation::ObservationVector;
use crate::reward::{RewardInputs, RewardShaper, TerminalFlags};
use crate::types::{AgentId, Role};
use crate::wire::{Action, Transition, TransitionInfo};

/// State of one policy agent at a cycle boundary.
#[derive(Debug, Clone)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub name: String,
    pub role: Role,
    pub elevation: f64,
    /// Observation at the boundary; `next_obs` of the closing cycle.
    pub obs: ObservationVector,
    /// Action last applied to the agent during the closing cycle.
    pub applied: Action,
}

/// How the episode ended, for the terminal cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalSummary {
    pub reason: TerminalReason,
    pub winner: String,
}

impl TerminalSummary {
    fn flags(&self) -> TerminalFlags {
        TerminalFlags {
            timed_out: self.reason == TerminalReason::Timeout,
            tagged: self.reason == TerminalReason::Tag,
        }
    }
}

/// Pair-level state at a cycle boundary.
#[derive(Debug, Clone)]
pub struct PairSnapshot {
    pub distance: f64,
    pub time_elapsed: f64,
    pub episode: u64,
    pub terminal: Option<TerminalSummary>,
}

/// Tracks open cycles and the running pair distance.
#[derive(Debug, Clone, Default)]
pub struct TransitionTracker {
    prev_distance: f64,
    open: BTreeMap<AgentId, ObservationVector>,
    cycles_closed: u64,
}

impl TransitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-seeds the previous distance and opens the first cycle of an episode.
    pub fn reset(&mut self, pair_distance: f64, opening: Vec<(AgentId, ObservationVector)>) {
        self.prev_distance = pair_distance;
        self.open = opening.into_iter().collect();
        self.cycles_closed = 0;
    }

    /// True while a cycle is open for any agent.
    pub fn has_open_cycle(&self) -> bool {
        !self.open.is_empty()
    }

    pub fn cycles_closed(&self) -> u64 {
        self.cycles_closed
    }

    /// Closes the open cycle, producing one transition per agent that had one.
    ///
    /// A terminal pair snapshot closes with `done = true` and leaves nothing
    /// open; otherwise each agent's boundary observation opens the next cycle.
    pub fn close(
        &mut self,
        agents: &[AgentSnapshot],
        pair: &PairSnapshot,
        rewards: &RewardConfig,
    ) -> Vec<Transition> {
        let progress = self.prev_distance - pair.distance;
        self.prev_distance = pair.distance;
        let done = pair.terminal.is_some();
        let terminal = pair
            .terminal
            .as_ref()
            .map(TerminalSummary::flags)
            .unwrap_or_default();

        let mut out = Vec::with_capacity(agents.len());
        for agent in agents {
            let Some(obs) = self.open.remove(&agent.id) else {
                continue;
            };
            let reward = RewardShaper::compute(
                &RewardInputs {
                    role: agent.role,
                    progress,
                    pair_distance: pair.distance,
                    jumped: agent.applied.wants_jump(),
                    elevation: agent.elevation,
                    terminal,
                },
                rewards,
            );
            out.push(Transition {
                obs,
                action: agent.applied,
                reward,
                next_obs: agent.obs.clone(),
                done,
                info: TransitionInfo {
                    agent: agent.name.clone(),
                    role: agent.role,
                    episode: pair.episode,
                    distance_to_other: pair.distance,
                    time_elapsed: pair.time_elapsed,
                    winner: pair.terminal.as_ref().map(|t| t.winner.clone()),
                    terminal_reason: pair.terminal.as_ref().map(|t| t.reason),
                },
            });
        }

        if done {
            self.open.clear();
        } else {
            for agent in agents {
                self.open.insert(agent.id, agent.obs.clone());
            }
        }
        if !out.is_empty() {
            self.cycles_closed += 1;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: AgentId, role: Role, marker: f64) -> AgentSnapshot {
        AgentSnapshot {
            id,
            name: format!("Agent{}", id + 1),
            role,
            elevation: 0.0,
            obs: ObservationVector::from(vec![marker]),
            applied: Action::new(0.0, 1.0, 0.0),
        }
    }

    fn pair(distance: f64, terminal: Option<TerminalSummary>) -> PairSnapshot {
        PairSnapshot {
            distance,
            time_elapsed: 1.0,
            episode: 1,
            terminal,
        }
    }

    #[test]
    fn obs_comes_from_cycle_open() {
        let mut t = TransitionTracker::new();
        t.reset(10.0, vec![(0, ObservationVector::from(vec![0.0]))]);
        let out = t.close(&[snapshot(0, Role::Seeker, 1.0)], &pair(9.0, None), &RewardConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].obs.as_slice(), &[0.0]);
        assert_eq!(out[0].next_obs.as_slice(), &[1.0]);
        assert!(!out[0].done);

        let out = t.close(&[snapshot(0, Role::Seeker, 2.0)], &pair(8.0, None), &RewardConfig::default());
        assert_eq!(out[0].obs.as_slice(), &[1.0]);
        assert_eq!(t.cycles_closed(), 2);
    }

    #[test]
    fn progress_is_sign_flipped_between_roles() {
        let mut t = TransitionTracker::new();
        let cfg = RewardConfig::default();
        t.reset(
            10.0,
            vec![
                (0, ObservationVector::from(vec![0.0])),
                (1, ObservationVector::from(vec![0.0])),
            ],
        );
        let out = t.close(
            &[snapshot(0, Role::Seeker, 1.0), snapshot(1, Role::Hider, 1.0)],
            &pair(8.0, None),
            &cfg,
        );
        let seeker = out[0].reward - cfg.seeker_time_penalty;
        let hider = out[1].reward - cfg.hider_survival_bonus;
        assert!((seeker - 0.2).abs() < 1e-12);
        assert!((hider + 0.2).abs() < 1e-12);
    }

    #[test]
    fn terminal_close_happens_once() {
        let mut t = TransitionTracker::new();
        t.reset(5.0, vec![(0, ObservationVector::from(vec![0.0]))]);
        let terminal = Some(TerminalSummary {
            reason: TerminalReason::Tag,
            winner: "Agent1".into(),
        });
        let out = t.close(&[snapshot(0, Role::Seeker, 1.0)], &pair(0.9, terminal.clone()), &RewardConfig::default());
        assert!(out[0].done);
        assert_eq!(out[0].info.terminal_reason, Some(TerminalReason::Tag));
        assert_eq!(out[0].info.winner.as_deref(), Some("Agent1"));
        assert!(!t.has_open_cycle());
        let again = t.close(&[snapshot(0, Role::Seeker, 1.0)], &pair(0.9, terminal), &RewardConfig::default());
        assert!(again.is_empty());
    }
}
