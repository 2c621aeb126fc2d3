//! Session driver: the owned tick loop.
//!
//! A [`Session`] constructs every component once and calls them in a fixed
//! order on each [`tick`](Session::tick):
//!
//! 1. start a round if none is active
//! 2. advance the clock and the scheduler
//! 3. drain policy replies into the action cache
//! 4. apply cached actions (or fallback output) to every body
//! 5. integrate physics, logging corrected anomalies
//! 6. sample vision
//! 7. evaluate termination (tags before the clock, then the step budget)
//! 8. close the transition cycle on cadence or on the terminal tick
//! 9. send the next observation request if the round is still running
//! 10. finish the round and report its statistics

use tracing::{debug, info, warn};

use crate::agent::{AgentRecord, AgentRegistry, DrivableAgent};
use crate::arena::ArenaGeometry;
use crate::body::KinematicBody;
use crate::config::SessionConfig;
use crate::episode::{EpisodeEvent, EpisodeStateMachine, Outcome, TerminalReason};
use crate::error::ConfigError;
use crate::generate_id;
use crate::link::PolicyLink;
use crate::metrics::{RoundAccumulator, RoundStats};
use crate::observation::{AgentView, ObservationEncoder, ObservationVector};
use crate::policy::{ControllerMode, FallbackController};
use crate::scheduler::{AgentSnapshot, PairSnapshot, StepScheduler, TerminalSummary};
use crate::trajectory::{TrajectoryEvent, TrajectoryLogger};
use crate::types::{secs, AgentId, Role, Seconds, Vec3};
use crate::vision::VisionSensor;
use crate::wire::{Action, Transition};

/// A running arena: agents, bodies, episode lifecycle and policy exchange.
pub struct Session<L: PolicyLink> {
    config: SessionConfig,
    link: L,
    registry: AgentRegistry,
    bodies: Vec<KinematicBody>,
    arena: ArenaGeometry,
    episode: EpisodeStateMachine,
    scheduler: StepScheduler,
    vision: VisionSensor,
    encoder: ObservationEncoder,
    controllers: Vec<FallbackController>,
    trajectory: TrajectoryLogger,
    accumulator: RoundAccumulator,
    last_transitions: Vec<Transition>,
    now: Seconds,
}

impl<L: PolicyLink> Session<L> {
    /// Builds a session from a validated configuration.
    ///
    /// Only the starting seeker is policy-controlled unless
    /// `control_all_agents` is set; nothing is if the policy is disabled.
    pub fn new(config: SessionConfig, link: L) -> Result<Self, ConfigError> {
        config.validate()?;

        let starting_seeker = config.starting_seeker_index();
        let registry = AgentRegistry::new(
            config
                .agent_names
                .iter()
                .enumerate()
                .map(|(id, name)| {
                    let controlled = config.policy_enabled
                        && (config.control_all_agents || id == starting_seeker);
                    AgentRecord::new(name.clone(), controlled)
                })
                .collect(),
        );
        let half_extent = config.arena_half_extent;
        let bodies = (0..registry.len())
            .map(|_| KinematicBody::new(config.body.clone(), half_extent))
            .collect();
        let controllers = (0..registry.len())
            .map(|id| {
                FallbackController::new(
                    config.controller.clone(),
                    half_extent,
                    config.seed.wrapping_add(id as u64 + 1),
                )
            })
            .collect();
        let trajectory = if config.log_trajectories {
            TrajectoryLogger::new(config.trajectories_dir.clone(), generate_id())
        } else {
            TrajectoryLogger::disabled()
        };

        let session = Self {
            arena: ArenaGeometry::open(half_extent),
            episode: EpisodeStateMachine::new(&config),
            scheduler: StepScheduler::new(&config, &registry),
            vision: VisionSensor::new(config.vision.clone(), registry.len()),
            encoder: ObservationEncoder::from_config(&config),
            controllers,
            bodies,
            registry,
            trajectory,
            accumulator: RoundAccumulator::new(),
            last_transitions: Vec::new(),
            now: secs(0.0),
            link,
            config,
        };
        info!(
            agents = session.registry.len(),
            policy_agents = session.scheduler.policy_agents().len(),
            training = session.scheduler.transitions_enabled(),
            obs_dim = session.encoder.dim(),
            "Session created"
        );
        Ok(session)
    }

    /// Replaces the arena layout (e.g. to add obstacles).
    pub fn with_arena(mut self, arena: ArenaGeometry) -> Self {
        self.arena = arena;
        self
    }

    // --- Accessors ---

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn episode(&self) -> &EpisodeStateMachine {
        &self.episode
    }

    pub fn scheduler(&self) -> &StepScheduler {
        &self.scheduler
    }

    pub fn body(&self, id: AgentId) -> Option<&KinematicBody> {
        self.bodies.get(id)
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Current simulation time.
    pub fn now(&self) -> Seconds {
        self.now
    }

    /// Action applied to `id` on the most recent tick.
    pub fn last_applied(&self, id: AgentId) -> Action {
        self.scheduler.last_applied(id)
    }

    /// Transitions produced on the most recent tick.
    pub fn last_transitions(&self) -> &[Transition] {
        &self.last_transitions
    }

    /// Observation `id` would receive right now.
    pub fn observation(&self, id: AgentId) -> ObservationVector {
        observe(
            &self.encoder,
            &self.registry,
            &self.bodies,
            &self.vision,
            &self.episode,
            id,
        )
    }

    /// Horizontal seeker/hider distance.
    pub fn pair_distance(&self) -> f64 {
        let position = |id: AgentId| self.bodies.get(id).map(|b| b.position());
        match (
            position(self.episode.seeker()),
            position(self.episode.hider()),
        ) {
            (Some(s), Some(h)) => s.horizontal_distance_to(&h),
            _ => 0.0,
        }
    }

    // --- Round control ---

    /// Resets the episode and opens its first scheduler cycle.
    ///
    /// The configured starting seeker is seeker in every round.
    pub fn start_round(&mut self) -> EpisodeEvent {
        let hint = self.config.starting_seeker_index();
        let event = self.episode.reset(
            Some(hint),
            &mut self.registry,
            &mut self.bodies,
            &self.arena,
            self.now,
        );

        let (seeker, hider) = (self.episode.seeker(), self.episode.hider());
        for (id, controller) in self.controllers.iter_mut().enumerate() {
            let mode = if id == seeker && !self.episode.is_degenerate() {
                ControllerMode::Chase { target: hider }
            } else {
                ControllerMode::Wander
            };
            controller.set_mode(mode);
        }

        self.accumulator = RoundAccumulator::new();
        self.last_transitions.clear();
        self.trajectory.begin_episode(TrajectoryEvent::EpisodeStart {
            episode: self.episode.episode_index(),
            seeker: self.registry.name(seeker).to_string(),
            hider: self.registry.name(hider).to_string(),
            time_limit: self.episode.time_limit().value(),
            time: self.now.value(),
        });
        debug!(
            episode = self.episode.episode_index(),
            seeker = self.registry.name(seeker),
            hider = self.registry.name(hider),
            "Round started"
        );

        self.prime_cycle();
        self.send_requests();
        event
    }

    /// Teleports an agent. Before the first tick of a round this also
    /// re-seeds the opening observations and the progress baseline.
    pub fn place_agent(&mut self, id: AgentId, position: Vec3) {
        if let Some(body) = self.bodies.get_mut(id) {
            body.place_at(position);
        }
        if self.episode.is_active() && self.scheduler.phase() == 0 {
            self.prime_cycle();
        }
    }

    fn prime_cycle(&mut self) {
        self.vision.sample_all(&self.bodies, &self.arena);
        let opening = self
            .pair_policy_agents()
            .into_iter()
            .map(|id| (id, self.observation(id)))
            .collect();
        let distance = self.pair_distance();
        self.scheduler.on_episode_reset(distance, opening);
    }

    /// Policy agents holding a role this episode, seeker first.
    fn pair_policy_agents(&self) -> Vec<AgentId> {
        let mut ids = vec![self.episode.seeker()];
        if !self.episode.is_degenerate() {
            ids.push(self.episode.hider());
        }
        ids.retain(|id| self.scheduler.is_policy_agent(*id));
        ids
    }

    fn send_requests(&mut self) {
        let (encoder, registry, bodies, vision, episode) = (
            &self.encoder,
            &self.registry,
            &self.bodies,
            &self.vision,
            &self.episode,
        );
        self.scheduler.send_requests(&mut self.link, |id| {
            observe(encoder, registry, bodies, vision, episode, id)
        });
    }

    // --- Tick ---

    /// Advances the arena by the configured tick length.
    pub fn step(&mut self) -> Option<RoundStats> {
        self.tick(self.config.tick_dt())
    }

    /// Advances the arena by `dt` seconds.
    ///
    /// Returns the round statistics on the tick that resolves a round.
    pub fn tick(&mut self, dt: f64) -> Option<RoundStats> {
        if !self.episode.is_active() {
            self.start_round();
        }
        self.now = self.now + secs(dt);
        self.scheduler.begin_tick();
        self.last_transitions.clear();

        self.scheduler.drain(&mut self.link);
        self.apply_actions();

        for (id, body) in self.bodies.iter_mut().enumerate() {
            if let Some(anomaly) = body.integrate(dt) {
                let agent = self.registry.name(id).to_string();
                warn!(agent = %agent, ?anomaly, "Corrected physics anomaly");
                self.trajectory.record(&TrajectoryEvent::Anomaly {
                    agent,
                    anomaly,
                    time: self.now.value(),
                });
            }
        }
        self.vision.sample_all(&self.bodies, &self.arena);

        let events = self.evaluate();
        self.log_events(&events);
        let distance = self.pair_distance();
        self.accumulator.observe_tick(distance);

        let terminal = !self.episode.is_active();
        if self.scheduler.transitions_enabled() && (terminal || self.scheduler.transition_due()) {
            self.close_cycle(distance);
        }
        if !terminal && self.scheduler.request_due() {
            self.send_requests();
        }
        self.log_steps();

        terminal.then(|| self.finish_round())
    }

    fn apply_actions(&mut self) {
        for id in 0..self.bodies.len() {
            let action = match self.scheduler.cached_action(id) {
                Some(action) => action,
                None => {
                    let target = match self.controllers[id].mode() {
                        ControllerMode::Chase { target } => {
                            self.bodies.get(target).map(|b| b.position())
                        }
                        ControllerMode::Wander => None,
                    };
                    let body = &self.bodies[id];
                    let (position, grounded) = (body.position(), body.is_grounded());
                    self.controllers[id].next_action(position, grounded, target)
                }
            };
            self.bodies[id].apply_intent(action);
            self.scheduler.record_applied(id, action);
        }
    }

    fn evaluate(&mut self) -> Vec<EpisodeEvent> {
        let (seeker, hider) = (self.episode.seeker(), self.episode.hider());
        let contacts = if seeker != hider && self.pair_distance() <= self.config.tag_radius {
            vec![(seeker, hider)]
        } else {
            Vec::new()
        };
        let mut events = self.episode.evaluate(self.now, &contacts, &self.registry);

        let budget = u64::from(self.config.max_steps_per_episode);
        if budget > 0
            && self.episode.is_active()
            && self.scheduler.transition_due()
            && self.scheduler.cycles_elapsed() >= budget
        {
            events.extend(self.episode.truncate(self.now));
        }
        events
    }

    fn log_events(&mut self, events: &[EpisodeEvent]) {
        let time = self.now.value();
        for event in events {
            match *event {
                EpisodeEvent::Tagged {
                    attacker, target, ..
                } => {
                    self.trajectory.record(&TrajectoryEvent::Tag {
                        attacker: self.registry.name(attacker).to_string(),
                        target: self.registry.name(target).to_string(),
                        time,
                    });
                }
                EpisodeEvent::TimedOut { .. } => {
                    self.trajectory.record(&TrajectoryEvent::Timeout { time });
                }
                EpisodeEvent::Truncated { .. } | EpisodeEvent::Started { .. } => {}
            }
        }
    }

    fn close_cycle(&mut self, distance: f64) {
        let agents: Vec<AgentSnapshot> = self
            .pair_policy_agents()
            .into_iter()
            .filter_map(|id| {
                let role = self.registry.role(id)?;
                let body = self.bodies.get(id)?;
                Some(AgentSnapshot {
                    id,
                    name: self.registry.name(id).to_string(),
                    role,
                    elevation: body.position().y,
                    obs: self.observation(id),
                    applied: self.scheduler.last_applied(id),
                })
            })
            .collect();
        let terminal = self
            .episode
            .terminal_reason()
            .zip(self.episode.winner())
            .map(|(reason, winner)| TerminalSummary {
                reason,
                winner: self.registry.name(winner).to_string(),
            });
        let pair = PairSnapshot {
            distance,
            time_elapsed: self.episode.elapsed(self.now).value(),
            episode: self.episode.episode_index(),
            terminal,
        };
        let transitions = self.scheduler.close_cycle(&mut self.link, &agents, &pair);
        self.accumulator.observe_transitions(&transitions);
        self.last_transitions = transitions;
    }

    fn log_steps(&mut self) {
        if !self.trajectory.is_enabled() {
            return;
        }
        let time = self.now.value();
        for (id, body) in self.bodies.iter().enumerate() {
            self.trajectory.record(&TrajectoryEvent::Step {
                agent: self.registry.name(id).to_string(),
                pos: body.position().to_array(),
                vel: body.velocity().to_array(),
                is_it: self.registry.role(id) == Some(Role::Seeker),
                time,
            });
        }
    }

    fn finish_round(&mut self) -> RoundStats {
        let outcome = self.episode.outcome().unwrap_or(Outcome::HiderWon);
        let reason = self
            .episode
            .terminal_reason()
            .unwrap_or(TerminalReason::Timeout);
        let winner = self
            .episode
            .winner()
            .map(|id| self.registry.name(id).to_string())
            .unwrap_or_default();
        let duration = self.episode.elapsed(self.now).value();
        let episode = self.episode.episode_index();

        self.trajectory.end_episode(&TrajectoryEvent::EpisodeEnd {
            episode,
            outcome,
            reason,
            winner: winner.clone(),
            duration,
            time: self.now.value(),
        });
        info!(
            episode,
            ?outcome,
            %reason,
            winner = %winner,
            duration,
            "Round finished"
        );
        self.accumulator
            .finish(episode, outcome, reason, winner, duration)
    }

    /// Runs until `rounds` rounds finish or `max_ticks` ticks elapse.
    pub fn run(&mut self, rounds: u32, max_ticks: u64) -> Vec<RoundStats> {
        let mut finished = Vec::with_capacity(rounds as usize);
        let mut ticks = 0;
        while finished.len() < rounds as usize && ticks < max_ticks {
            if let Some(stats) = self.step() {
                finished.push(stats);
            }
            ticks += 1;
        }
        finished
    }
}

/// Encodes the observation of agent `id` against its current opponent.
///
/// The seeker faces the hider; everybody else faces the seeker.
fn observe(
    encoder: &ObservationEncoder,
    registry: &AgentRegistry,
    bodies: &[KinematicBody],
    vision: &VisionSensor,
    episode: &EpisodeStateMachine,
    id: AgentId,
) -> ObservationVector {
    let Some(body) = bodies.get(id) else {
        return ObservationVector::from(vec![0.0; encoder.dim()]);
    };
    let me = AgentView::of(body, registry.role(id));
    let opponent = if episode.is_degenerate() {
        None
    } else if id == episode.seeker() {
        Some(episode.hider())
    } else {
        Some(episode.seeker())
    };
    let opponent_view = opponent
        .filter(|o| *o != id)
        .and_then(|o| bodies.get(o).map(|b| AgentView::of(b, registry.role(o))));
    encoder.encode(&me, opponent_view.as_ref(), vision.latest(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::NullLink;

    fn offline(config: SessionConfig) -> Session<NullLink> {
        Session::new(config, NullLink::new()).unwrap()
    }

    #[test]
    fn first_tick_starts_a_round() {
        let mut s = offline(SessionConfig::default());
        assert!(s.tick(1.0 / 60.0).is_none());
        assert!(s.episode().is_active());
        assert_eq!(s.episode().episode_index(), 1);
        assert_eq!(s.registry().count_role(Role::Seeker), 1);
        assert_eq!(s.registry().count_role(Role::Hider), 1);
    }

    #[test]
    fn only_starting_seeker_is_policy_driven_by_default() {
        let s = offline(SessionConfig::default());
        assert_eq!(s.scheduler().policy_agents(), &[0]);
        let all = offline(SessionConfig {
            control_all_agents: true,
            ..SessionConfig::default()
        });
        assert_eq!(all.scheduler().policy_agents(), &[0, 1]);
        let none = offline(SessionConfig {
            policy_enabled: false,
            ..SessionConfig::default()
        });
        assert!(none.scheduler().policy_agents().is_empty());
    }

    #[test]
    fn requests_follow_cadence() {
        let mut s = offline(SessionConfig::default());
        s.start_round();
        assert_eq!(s.link().dropped(), 1);
        for _ in 0..10 {
            s.tick(1.0 / 60.0);
        }
        // Reset request plus ticks 5 and 10.
        assert_eq!(s.link().dropped(), 3);
    }

    #[test]
    fn observations_have_fixed_length() {
        let mut s = offline(SessionConfig::default());
        for _ in 0..30 {
            s.tick(1.0 / 60.0);
            for id in 0..2 {
                assert_eq!(s.observation(id).len(), s.config().observation_dim());
            }
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = SessionConfig {
            agent_names: Vec::new(),
            ..SessionConfig::default()
        };
        assert!(matches!(
            Session::new(cfg, NullLink::new()),
            Err(ConfigError::NoAgents)
        ));
    }

    #[test]
    fn run_collects_rounds() {
        let mut s = offline(SessionConfig {
            time_limit_secs: 0.5,
            policy_enabled: false,
            ..SessionConfig::default()
        });
        let rounds = s.run(3, 10_000);
        assert_eq!(rounds.len(), 3);
        assert_eq!(rounds[2].episode, 3);
    }
}
