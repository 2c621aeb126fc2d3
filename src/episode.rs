//! Episode state machine and round lifecycle.
//!
//! An episode runs from a reset to a single resolution: either the seeker
//! tags the hider or the clock runs out. The machine is the only writer of
//! roles, immunity windows, the clock and the outcome.

use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::agent::{AgentRegistry, DrivableAgent, NOT_IMMUNE};
use crate::arena::ArenaGeometry;
use crate::config::SessionConfig;
use crate::types::{secs, AgentId, Role, Seconds, Vec3};

// ---------------------------------------------------------------------------
// States and outcomes
// ---------------------------------------------------------------------------

/// Lifecycle state of the current episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EpisodeStatus {
    /// Before the first reset.
    #[default]
    Idle,
    Active,
    /// Resolved; waits for the next reset.
    Resolved,
}

/// Which side won the episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    SeekerWon,
    HiderWon,
}

/// Why the episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    Tag,
    Timeout,
    /// The per-episode transition budget was exhausted.
    MaxSteps,
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalReason::Tag => write!(f, "tag"),
            TerminalReason::Timeout => write!(f, "timeout"),
            TerminalReason::MaxSteps => write!(f, "max_steps"),
        }
    }
}

/// Lifecycle events, returned to the driver and consumed in the same tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EpisodeEvent {
    Started {
        episode: u64,
        seeker: AgentId,
        hider: AgentId,
    },
    Tagged {
        attacker: AgentId,
        target: AgentId,
        at: Seconds,
    },
    TimedOut {
        at: Seconds,
    },
    Truncated {
        at: Seconds,
    },
}

/// Why a tag attempt was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRejection {
    NotActive,
    NotSeeker,
    NotHider,
    /// The target has been removed from play.
    NotAlive,
    Immune,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Owns roles, the clock and the outcome of the current episode.
#[derive(Debug, Clone)]
pub struct EpisodeStateMachine {
    status: EpisodeStatus,
    episode_index: u64,
    start_time: Seconds,
    time_limit: Seconds,
    time_left: Seconds,
    seeker: AgentId,
    hider: AgentId,
    outcome: Option<Outcome>,
    terminal_reason: Option<TerminalReason>,
    immunity: Seconds,
    min_separation: f64,
    spawn_attempts: u32,
    rng: StdRng,
}

impl EpisodeStateMachine {
    pub fn new(config: &SessionConfig) -> Self {
        let time_limit = secs(config.time_limit_secs);
        Self {
            status: EpisodeStatus::Idle,
            episode_index: 0,
            start_time: secs(0.0),
            time_limit,
            time_left: time_limit,
            seeker: 0,
            hider: 0,
            outcome: None,
            terminal_reason: None,
            immunity: secs(config.post_tag_immunity_secs),
            min_separation: config.min_spawn_separation,
            spawn_attempts: config.spawn_attempts.max(1),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    // --- Accessors ---

    pub fn status(&self) -> EpisodeStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == EpisodeStatus::Active
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        self.terminal_reason
    }

    pub fn seeker(&self) -> AgentId {
        self.seeker
    }

    pub fn hider(&self) -> AgentId {
        self.hider
    }

    /// True when no distinct hider exists.
    pub fn is_degenerate(&self) -> bool {
        self.seeker == self.hider
    }

    /// Number of episodes started so far; the current one's index.
    pub fn episode_index(&self) -> u64 {
        self.episode_index
    }

    pub fn time_limit(&self) -> Seconds {
        self.time_limit
    }

    /// Remaining time as of the last [`tick_clock`](Self::tick_clock).
    pub fn time_left(&self) -> Seconds {
        self.time_left
    }

    /// Time since the episode started.
    pub fn elapsed(&self, now: Seconds) -> Seconds {
        now - self.start_time
    }

    /// Id of the winning agent, once resolved.
    pub fn winner(&self) -> Option<AgentId> {
        self.outcome.map(|o| match o {
            Outcome::SeekerWon => self.seeker,
            Outcome::HiderWon => self.hider,
        })
    }

    // --- Transitions ---

    /// Starts a new episode.
    ///
    /// # Arguments
    ///
    /// * `seeker_hint` - Agent to make seeker; invalid or `None` falls back to the first agent
    /// * `registry` - Agent records; roles and immunity are rewritten
    /// * `bodies` - Bodies in registry order; all are repositioned
    /// * `arena` - Spawn area
    /// * `now` - Current simulation time
    pub fn reset<B: DrivableAgent>(
        &mut self,
        seeker_hint: Option<AgentId>,
        registry: &mut AgentRegistry,
        bodies: &mut [B],
        arena: &ArenaGeometry,
        now: Seconds,
    ) -> EpisodeEvent {
        let count = registry.len();
        let seeker = seeker_hint.filter(|id| *id < count).unwrap_or(0);
        let hider = (0..count).find(|id| *id != seeker).unwrap_or(seeker);
        if hider == seeker {
            warn!(
                agents = count,
                "Only one agent configured; hider falls back to the seeker and the episode cannot end by tag"
            );
        }

        for (id, record) in registry.iter_mut().enumerate() {
            record.role = if id == seeker {
                Some(Role::Seeker)
            } else if id == hider {
                Some(Role::Hider)
            } else {
                None
            };
            record.immune_until = NOT_IMMUNE;
            record.is_alive = true;
        }
        if let Some(record) = registry.get_mut(seeker) {
            record.immune_until = now + self.immunity;
        }

        self.place(bodies, arena);

        self.episode_index += 1;
        self.status = EpisodeStatus::Active;
        self.start_time = now;
        self.time_left = self.time_limit;
        self.seeker = seeker;
        self.hider = hider;
        self.outcome = None;
        self.terminal_reason = None;

        EpisodeEvent::Started {
            episode: self.episode_index,
            seeker,
            hider,
        }
    }

    /// Spawns bodies with the widest pairwise separation found, stopping
    /// early once the configured minimum is met.
    fn place<B: DrivableAgent>(&mut self, bodies: &mut [B], arena: &ArenaGeometry) {
        let margin = bodies.iter().map(|b| b.radius()).fold(0.0, f64::max);
        let mut best: Vec<Vec3> = Vec::new();
        let mut best_gap = f64::NEG_INFINITY;

        for _ in 0..self.spawn_attempts {
            let candidate: Vec<Vec3> = (0..bodies.len())
                .map(|_| arena.sample_spawn(&mut self.rng, margin))
                .collect();
            let gap = min_pairwise_distance(&candidate);
            if gap > best_gap {
                best_gap = gap;
                best = candidate;
            }
            if best_gap >= self.min_separation {
                break;
            }
        }

        if bodies.len() > 1 && best_gap < self.min_separation {
            warn!(
                separation = best_gap,
                required = self.min_separation,
                "Spawn separation not satisfied; using best-effort placement"
            );
        }
        for (body, position) in bodies.iter_mut().zip(best) {
            body.place_at(position);
        }
    }

    /// Attempts a tag. Accepting it resolves the episode as `SeekerWon`.
    pub fn try_tag(
        &mut self,
        attacker: AgentId,
        target: AgentId,
        registry: &AgentRegistry,
        now: Seconds,
    ) -> Result<EpisodeEvent, TagRejection> {
        if self.status != EpisodeStatus::Active {
            return Err(TagRejection::NotActive);
        }
        if attacker != self.seeker {
            return Err(TagRejection::NotSeeker);
        }
        if target != self.hider || target == attacker {
            return Err(TagRejection::NotHider);
        }
        let Some(record) = registry.get(target) else {
            return Err(TagRejection::NotHider);
        };
        if !record.is_alive {
            return Err(TagRejection::NotAlive);
        }
        if record.is_immune(now) {
            return Err(TagRejection::Immune);
        }
        self.resolve(Outcome::SeekerWon, TerminalReason::Tag);
        Ok(EpisodeEvent::Tagged {
            attacker,
            target,
            at: now,
        })
    }

    /// Updates the clock. Reaching zero resolves the episode as `HiderWon`.
    pub fn tick_clock(&mut self, now: Seconds) -> Option<EpisodeEvent> {
        if self.status != EpisodeStatus::Active {
            return None;
        }
        let remaining = (self.time_limit - self.elapsed(now)).value().max(0.0);
        self.time_left = secs(remaining.min(self.time_left.value()));
        if self.time_left.value() <= 0.0 {
            self.resolve(Outcome::HiderWon, TerminalReason::Timeout);
            return Some(EpisodeEvent::TimedOut { at: now });
        }
        None
    }

    /// Evaluates termination for this tick.
    ///
    /// Contact pairs are checked as tag attempts before the clock, so a tag
    /// and a timeout in the same step resolve as the tag.
    pub fn evaluate(
        &mut self,
        now: Seconds,
        contacts: &[(AgentId, AgentId)],
        registry: &AgentRegistry,
    ) -> Vec<EpisodeEvent> {
        let mut events = Vec::new();
        for &(attacker, target) in contacts {
            if let Ok(event) = self.try_tag(attacker, target, registry, now) {
                events.push(event);
            }
        }
        events.extend(self.tick_clock(now));
        events
    }

    /// Ends the episode early as `HiderWon` with reason `max_steps`.
    pub fn truncate(&mut self, now: Seconds) -> Option<EpisodeEvent> {
        if self.status != EpisodeStatus::Active {
            return None;
        }
        self.resolve(Outcome::HiderWon, TerminalReason::MaxSteps);
        Some(EpisodeEvent::Truncated { at: now })
    }

    fn resolve(&mut self, outcome: Outcome, reason: TerminalReason) {
        if self.status == EpisodeStatus::Active {
            self.status = EpisodeStatus::Resolved;
            self.outcome = Some(outcome);
            self.terminal_reason = Some(reason);
        }
    }
}

fn min_pairwise_distance(points: &[Vec3]) -> f64 {
    let mut min = f64::INFINITY;
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            min = min.min(a.horizontal_distance_to(b));
        }
    }
    min
}
