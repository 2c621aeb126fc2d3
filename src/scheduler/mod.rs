//! Step scheduler: decouples the physics tick from the policy exchange.
//!
//! Every tick the session asks the scheduler which action to apply to each
//! policy agent. Requests go out every `request_interval_ticks` without
//! waiting; replies overwrite the [`ActionCache`] whenever they arrive. In
//! training mode the scheduler also closes a transition cycle every
//! `transition_interval_ticks` (and on the terminal tick) and uploads it.

pub mod cache;
pub mod transitions;

use std::collections::BTreeMap;

use tracing::{debug, warn};

pub use cache::{ActionCache, CachedAction};
pub use transitions::{AgentSnapshot, PairSnapshot, TerminalSummary, TransitionTracker};

use crate::agent::AgentRegistry;
use crate::config::{RewardConfig, SessionConfig};
use crate::link::PolicyLink;
use crate::observation::ObservationVector;
use crate::types::AgentId;
use crate::wire::{Action, InboundMessage, OutboundMessage, Transition};

/// Owns the action cache and the request/transition cadence.
#[derive(Debug, Clone)]
pub struct StepScheduler {
    request_interval: u64,
    transition_interval: u64,
    transitions_enabled: bool,
    legacy_transitions: bool,
    names: Vec<String>,
    policy_agents: Vec<AgentId>,
    legacy_agent: Option<AgentId>,
    /// Ticks since the session started.
    tick: u64,
    /// Ticks since the last episode reset.
    phase: u64,
    cache: ActionCache,
    applied: Vec<Action>,
    tracker: TransitionTracker,
    rewards: RewardConfig,
}

impl StepScheduler {
    /// Creates a scheduler for the agents in `registry`.
    ///
    /// Transitions are only produced in training mode with exactly two agents.
    pub fn new(config: &SessionConfig, registry: &AgentRegistry) -> Self {
        let policy_agents = registry.controlled();
        let starting_seeker = config.starting_seeker_index();
        let legacy_agent = (config.legacy_single_act && policy_agents.contains(&starting_seeker))
            .then_some(starting_seeker);
        if config.training_mode && registry.len() != 2 {
            warn!(
                agents = registry.len(),
                "Training mode needs exactly one seeker/hider pair; transitions disabled"
            );
        }
        Self {
            request_interval: u64::from(config.request_interval_ticks.max(1)),
            transition_interval: u64::from(config.transition_interval_ticks.max(1)),
            transitions_enabled: config.training_mode && registry.len() == 2,
            legacy_transitions: config.legacy_transitions,
            names: registry.iter().map(|(_, a)| a.name.clone()).collect(),
            policy_agents,
            legacy_agent,
            tick: 0,
            phase: 0,
            cache: ActionCache::new(registry.len()),
            applied: vec![Action::ZERO; registry.len()],
            tracker: TransitionTracker::new(),
            rewards: config.reward.clone(),
        }
    }

    // --- Cadence ---

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn phase(&self) -> u64 {
        self.phase
    }

    /// Advances the tick counters. Call once at the start of every tick.
    pub fn begin_tick(&mut self) {
        self.tick += 1;
        self.phase += 1;
    }

    /// Whether an observation request goes out this tick.
    ///
    /// The reset itself counts as phase 0, so the first request leaves with
    /// the opening observations.
    pub fn request_due(&self) -> bool {
        self.phase % self.request_interval == 0
    }

    /// Whether a transition cycle closes this tick (absent a terminal event).
    pub fn transition_due(&self) -> bool {
        self.phase > 0 && self.phase % self.transition_interval == 0
    }

    /// Transition cycles completed in the current episode.
    pub fn cycles_elapsed(&self) -> u64 {
        self.phase / self.transition_interval
    }

    // --- Agents ---

    pub fn policy_agents(&self) -> &[AgentId] {
        &self.policy_agents
    }

    pub fn is_policy_agent(&self, id: AgentId) -> bool {
        self.policy_agents.contains(&id)
    }

    pub fn transitions_enabled(&self) -> bool {
        self.transitions_enabled
    }

    pub fn cache(&self) -> &ActionCache {
        &self.cache
    }

    /// Cached action for a policy agent; `None` for fallback-driven agents.
    pub fn cached_action(&self, id: AgentId) -> Option<Action> {
        self.is_policy_agent(id).then(|| self.cache.get(id))
    }

    /// Remembers the action applied to `id` this tick.
    pub fn record_applied(&mut self, id: AgentId, action: Action) {
        if let Some(slot) = self.applied.get_mut(id) {
            *slot = action;
        }
    }

    pub fn last_applied(&self, id: AgentId) -> Action {
        self.applied.get(id).copied().unwrap_or(Action::ZERO)
    }

    // --- Episode boundaries ---

    /// Clears the cache and restarts the cadence for a new episode.
    ///
    /// `opening` holds the first observation of every policy agent in the
    /// pair; it seeds the first transition cycle.
    pub fn on_episode_reset(
        &mut self,
        pair_distance: f64,
        opening: Vec<(AgentId, ObservationVector)>,
    ) {
        self.phase = 0;
        self.cache.clear();
        self.applied.fill(Action::ZERO);
        if self.transitions_enabled {
            self.tracker.reset(pair_distance, opening);
        }
    }

    // --- Inbound ---

    /// Applies every reply waiting on the link. Returns the number of cache
    /// entries written.
    pub fn drain<L: PolicyLink + ?Sized>(&mut self, link: &mut L) -> usize {
        link.poll().iter().map(|frame| self.ingest(frame)).sum()
    }

    /// Applies one reply frame. Malformed frames and entries are ignored and
    /// the affected agents keep their previous action.
    pub fn ingest(&mut self, frame: &str) -> usize {
        let message = match InboundMessage::parse(frame) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Ignoring malformed policy frame");
                return 0;
            }
        };
        match message {
            InboundMessage::ActionBatch { actions } => {
                let mut written = 0;
                for (name, value) in &actions {
                    let Some(id) = self.policy_agent_named(name) else {
                        debug!(agent = %name, "Ignoring action for unknown or unmanaged agent");
                        continue;
                    };
                    match Action::from_json(value) {
                        Ok(action) => {
                            if self.cache.store(id, action, self.tick) {
                                written += 1;
                            }
                        }
                        Err(e) => debug!(agent = %name, error = %e, "Ignoring invalid action"),
                    }
                }
                written
            }
            InboundMessage::Action { action } => {
                let Some(id) = self.legacy_agent else {
                    debug!("Ignoring single action reply; legacy path disabled");
                    return 0;
                };
                match Action::from_json(&action) {
                    Ok(action) => usize::from(self.cache.store(id, action, self.tick)),
                    Err(e) => {
                        debug!(error = %e, "Ignoring invalid single action");
                        0
                    }
                }
            }
            InboundMessage::Other => 0,
        }
    }

    fn policy_agent_named(&self, name: &str) -> Option<AgentId> {
        self.policy_agents
            .iter()
            .copied()
            .find(|id| self.names.get(*id).is_some_and(|n| n == name))
    }

    // --- Outbound ---

    /// Sends the batched request (and the legacy single request, if enabled).
    ///
    /// `encode` is called once per policy agent. Send failures are logged
    /// and dropped.
    pub fn send_requests<L, F>(&self, link: &mut L, mut encode: F)
    where
        L: PolicyLink + ?Sized,
        F: FnMut(AgentId) -> ObservationVector,
    {
        if self.policy_agents.is_empty() {
            return;
        }
        let mut obs = BTreeMap::new();
        let mut legacy_obs = None;
        for &id in &self.policy_agents {
            let vector = encode(id);
            if Some(id) == self.legacy_agent {
                legacy_obs = Some(vector.clone());
            }
            obs.insert(self.names[id].clone(), vector);
        }
        send_logged(link, &OutboundMessage::ActBatch { obs });
        if let Some(obs) = legacy_obs {
            send_logged(link, &OutboundMessage::Act { obs });
        }
    }

    /// Closes the open transition cycle and uploads it.
    ///
    /// Returns the transitions that were produced (empty outside training mode).
    pub fn close_cycle<L: PolicyLink + ?Sized>(
        &mut self,
        link: &mut L,
        agents: &[AgentSnapshot],
        pair: &PairSnapshot,
    ) -> Vec<Transition> {
        if !self.transitions_enabled || !self.tracker.has_open_cycle() {
            return Vec::new();
        }
        let transitions = self.tracker.close(agents, pair, &self.rewards);
        if transitions.is_empty() {
            return transitions;
        }
        if self.legacy_transitions {
            for t in &transitions {
                send_logged(link, &OutboundMessage::Transition(t.clone()));
            }
        } else {
            send_logged(
                link,
                &OutboundMessage::TransitionBatch {
                    transitions: transitions.clone(),
                },
            );
        }
        transitions
    }
}

fn send_logged<L: PolicyLink + ?Sized>(link: &mut L, message: &OutboundMessage) {
    if let Err(e) = link.send(message) {
        warn!(error = %e, "Dropping policy frame");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentRecord;
    use crate::link::NullLink;

    fn scheduler(names: &[&str], controlled: &[bool], cfg: SessionConfig) -> StepScheduler {
        let registry = AgentRegistry::new(
            names
                .iter()
                .zip(controlled)
                .map(|(n, c)| AgentRecord::new(*n, *c))
                .collect(),
        );
        StepScheduler::new(&cfg, &registry)
    }

    fn default_pair() -> StepScheduler {
        scheduler(&["A", "B"], &[true, true], SessionConfig::default())
    }

    #[test]
    fn request_cadence_counts_from_reset() {
        let mut s = default_pair();
        s.on_episode_reset(10.0, Vec::new());
        assert!(s.request_due());
        let due: Vec<u64> = (1..=12)
            .filter(|_| {
                s.begin_tick();
                s.request_due()
            })
            .collect();
        assert_eq!(due, vec![5, 10]);
    }

    #[test]
    fn batch_reply_updates_named_agents_only() {
        let mut s = default_pair();
        let n = s.ingest(r#"{"type":"action_batch","actions":{"A":[1,0,0],"B":"oops","Z":[0,1,0]}}"#);
        assert_eq!(n, 1);
        assert_eq!(s.cached_action(0), Some(Action::new(1.0, 0.0, 0.0)));
        assert_eq!(s.cached_action(1), Some(Action::ZERO));
    }

    #[test]
    fn bad_entry_keeps_previous_action() {
        let mut s = default_pair();
        let prior = Action::new(0.5, 0.5, 1.0);
        assert_eq!(s.ingest(r#"{"type":"action_batch","actions":{"A":[0.5,0.5,1.0]}}"#), 1);
        assert_eq!(s.ingest(r#"{"type":"action_batch","actions":{"A":[null,1]}}"#), 0);
        assert_eq!(s.cached_action(0), Some(prior));
        assert_eq!(s.ingest(r#"{"type":"action_batch","actions":{"A":"forward","B":[0,1]}}"#), 1);
        assert_eq!(s.cached_action(0), Some(prior));
        assert_eq!(s.cached_action(1), Some(Action::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn fallback_agents_have_no_cached_action() {
        let mut s = scheduler(&["A", "B"], &[true, false], SessionConfig::default());
        assert_eq!(s.ingest(r#"{"type":"action_batch","actions":{"B":[1,0,0]}}"#), 0);
        assert_eq!(s.cached_action(1), None);
    }

    #[test]
    fn garbage_frames_are_ignored() {
        let mut s = default_pair();
        assert_eq!(s.ingest("not json"), 0);
        assert_eq!(s.ingest(r#"{"type":"echo","recv":{}}"#), 0);
        assert_eq!(s.ingest(r#"{"type":"action","action":[1,0,0]}"#), 0);
    }

    #[test]
    fn legacy_single_action_updates_starting_seeker() {
        let cfg = SessionConfig {
            legacy_single_act: true,
            ..SessionConfig::default()
        };
        let mut s = scheduler(&["A", "B"], &[true, false], cfg);
        assert_eq!(s.ingest(r#"{"type":"action","action":[0,-1,1]}"#), 1);
        assert_eq!(s.cached_action(0), Some(Action::new(0.0, -1.0, 1.0)));
    }

    #[test]
    fn reset_clears_cache() {
        let mut s = default_pair();
        s.ingest(r#"{"type":"action_batch","actions":{"A":[1,0,0]}}"#);
        s.record_applied(0, Action::new(1.0, 0.0, 0.0));
        s.on_episode_reset(3.0, Vec::new());
        assert_eq!(s.cached_action(0), Some(Action::ZERO));
        assert_eq!(s.last_applied(0), Action::ZERO);
    }

    #[test]
    fn transitions_need_training_mode_and_a_pair() {
        assert!(!default_pair().transitions_enabled());
        let training = SessionConfig {
            training_mode: true,
            ..SessionConfig::default()
        };
        assert!(scheduler(&["A", "B"], &[true, true], training.clone()).transitions_enabled());
        assert!(!scheduler(&["A", "B", "C"], &[true, true, true], training).transitions_enabled());
    }

    #[test]
    fn close_cycle_uploads_batch() {
        let cfg = SessionConfig {
            training_mode: true,
            ..SessionConfig::default()
        };
        let mut s = scheduler(&["A", "B"], &[true, false], cfg);
        s.on_episode_reset(10.0, vec![(0, ObservationVector::from(vec![0.0]))]);
        let mut link = NullLink::new();
        let out = s.close_cycle(
            &mut link,
            &[AgentSnapshot {
                id: 0,
                name: "A".into(),
                role: crate::types::Role::Seeker,
                elevation: 0.0,
                obs: ObservationVector::from(vec![1.0]),
                applied: Action::ZERO,
            }],
            &PairSnapshot {
                distance: 9.0,
                time_elapsed: 0.1,
                episode: 1,
                terminal: None,
            },
        );
        assert_eq!(out.len(), 1);
        assert_eq!(link.dropped(), 1);
    }
}
