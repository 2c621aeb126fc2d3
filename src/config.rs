//! Configuration for the arena session.
//!
//! Every knob has a default; [`SessionConfig::from_env`] overlays
//! environment-style `KEY=value` settings on top and validates the result.
//! Invalid settings are startup errors.

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Reward-shaping constants.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardConfig {
    /// Multiplier applied to pair-distance progress.
    pub distance_scale: f64,
    /// Signed per-cycle term for the seeker (negative = penalty).
    pub seeker_time_penalty: f64,
    /// Per-cycle bonus for the hider.
    pub hider_survival_bonus: f64,
    /// Bonus for a hider standing above `high_ground_height`.
    pub high_ground_bonus: f64,
    /// Elevation above which the hider earns the high-ground bonus.
    pub high_ground_height: f64,
    /// Bonus for a seeker that jumps while close to the hider.
    pub near_jump_bonus: f64,
    /// Pair distance at or below which the near-jump bonus applies.
    pub near_tag_distance: f64,
    /// Bonus for the tagging agent.
    pub win_bonus: f64,
    /// Penalty for the tagged agent.
    pub tag_penalty: f64,
    /// Bonus for the hider on timeout.
    pub timeout_bonus: f64,
    /// Penalty for the seeker on timeout.
    pub timeout_penalty: f64,
    /// Final rewards are clamped to `[-reward_clip, reward_clip]`.
    pub reward_clip: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            distance_scale: 0.1,
            seeker_time_penalty: -0.01,
            hider_survival_bonus: 0.01,
            high_ground_bonus: 0.02,
            high_ground_height: 1.5,
            near_jump_bonus: 0.05,
            near_tag_distance: 2.5,
            win_bonus: 5.0,
            tag_penalty: 5.0,
            timeout_bonus: 5.0,
            timeout_penalty: 5.0,
            reward_clip: 10.0,
        }
    }
}

/// Ray fan used by the vision sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionConfig {
    /// Number of rays R. Observations carry `2 × R` vision features.
    pub ray_count: usize,
    /// Total angular width of the fan, centred on the forward axis.
    pub fov_degrees: f64,
    /// Rays report "no hit" beyond this range.
    pub max_range: f64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            ray_count: 36,
            fov_degrees: 180.0,
            max_range: 20.0,
        }
    }
}

/// Tuning for the fallback (NPC) controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Ticks between new wander directions.
    pub wander_interval_ticks: u32,
    /// Weight of the pull toward the arena centre while wandering.
    pub wander_center_weight: f64,
    /// Weight of the random wander direction.
    pub wander_direction_weight: f64,
    /// Weight of the pull toward the arena centre while chasing.
    pub chase_center_weight: f64,
    /// Direct-pursuit weight when far from the target.
    pub chase_direct_weight: f64,
    /// Strafe weight when far from the target.
    pub chase_strafe_weight: f64,
    /// Direct-pursuit weight inside `close_range`.
    pub close_direct_weight: f64,
    /// Strafe weight inside `close_range`.
    pub close_strafe_weight: f64,
    /// Distance under which the chase favours strafing.
    pub close_range: f64,
    /// Ticks between re-rolls of the strafe side.
    pub strafe_flip_ticks: u32,
    /// Consecutive grounded ticks required before a jump.
    pub min_grounded_ticks: u32,
    /// Inclusive range of the randomized post-jump cooldown, in ticks.
    pub jump_cooldown_ticks: (u32, u32),
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            wander_interval_ticks: 90,
            wander_center_weight: 0.6,
            wander_direction_weight: 0.4,
            chase_center_weight: 0.1,
            chase_direct_weight: 1.0,
            chase_strafe_weight: 0.2,
            close_direct_weight: 0.6,
            close_strafe_weight: 0.5,
            close_range: 2.5,
            strafe_flip_ticks: 45,
            min_grounded_ticks: 30,
            jump_cooldown_ticks: (60, 180),
        }
    }
}

/// Parameters of the stand-in kinematic body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyConfig {
    /// Horizontal speed at full stick deflection.
    pub max_speed: f64,
    /// Horizontal acceleration toward the desired velocity.
    pub acceleration: f64,
    /// Upward speed at take-off.
    pub jump_speed: f64,
    /// Downward acceleration while airborne.
    pub gravity: f64,
    /// Collision radius used for walls, contacts and vision.
    pub radius: f64,
    /// Penetration below the floor that counts as an anomaly.
    pub floor_tolerance: f64,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            max_speed: 6.0,
            acceleration: 40.0,
            jump_speed: 5.0,
            gravity: 14.0,
            radius: 0.5,
            floor_tolerance: 0.5,
        }
    }
}

/// Top-level session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    // --- Agents ---
    /// Stable agent names, in registry order.
    pub agent_names: Vec<String>,
    /// Name of the agent that starts each round as seeker (None = first agent).
    pub starting_seeker: Option<String>,
    /// Whether the external policy drives any agent at all.
    pub policy_enabled: bool,
    /// Policy drives every agent; otherwise only the starting seeker.
    pub control_all_agents: bool,

    // --- Cadence ---
    /// Physics ticks per simulated second.
    pub tick_rate_hz: f64,
    /// Ticks between batched observation requests.
    pub request_interval_ticks: u32,
    /// Ticks between transitions (training mode).
    pub transition_interval_ticks: u32,
    /// Emit and upload transitions.
    pub training_mode: bool,
    /// Also send single-agent `act` requests for the starting seeker.
    pub legacy_single_act: bool,
    /// Upload transitions as individual `transition` frames.
    pub legacy_transitions: bool,
    /// Transition budget per episode (0 = unlimited).
    pub max_steps_per_episode: u32,

    // --- Episode ---
    /// Round length in seconds.
    pub time_limit_secs: f64,
    /// Immunity granted to the seeker at round start.
    pub post_tag_immunity_secs: f64,
    /// Horizontal contact distance that counts as a tag attempt.
    pub tag_radius: f64,
    /// Desired minimum pairwise distance at spawn.
    pub min_spawn_separation: f64,
    /// Placement retries before accepting best-effort spawns.
    pub spawn_attempts: u32,
    /// Rounds run by the CLI driver.
    pub rounds: u32,
    /// Seed for placement and fallback controllers.
    pub seed: u64,

    // --- Arena ---
    /// Half-size of the square arena; also the position normalization scale.
    pub arena_half_extent: f64,

    // --- Logging ---
    /// Write the per-episode trajectory event log.
    pub log_trajectories: bool,
    /// Directory receiving trajectory files.
    pub trajectories_dir: PathBuf,

    pub reward: RewardConfig,
    pub vision: VisionConfig,
    pub controller: ControllerConfig,
    pub body: BodyConfig,
}

impl SessionConfig {
    /// Number of kinematic and role features at the head of every observation.
    pub const BASE_FEATURE_DIM: usize = 12; // pos(2), vel(2), rel_pos(2), rel_vel(2), flags(2), heading(2)

    /// Number of features per vision ray.
    pub const RAY_FEATURE_DIM: usize = 2; // distance, agent_hit

    /// Observation length: `12 + 2 × R`.
    pub fn observation_dim(&self) -> usize {
        Self::BASE_FEATURE_DIM + self.vision.ray_count * Self::RAY_FEATURE_DIM
    }

    /// Seconds per physics tick.
    pub fn tick_dt(&self) -> f64 {
        1.0 / self.tick_rate_hz
    }

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key/value source.
    ///
    /// Unset keys keep their defaults; the result is validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let src = Source { lookup: &lookup };

        if let Some(names) = src.raw("AI_AGENT_NAMES") {
            cfg.agent_names = names
                .split(',')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
        }
        if let Some(name) = src.raw("AI_IS_IT") {
            let name = name.trim();
            if !name.is_empty() {
                cfg.starting_seeker = Some(name.to_string());
            }
        }
        cfg.policy_enabled = src.flag("AI_POLICY_ENABLED", cfg.policy_enabled)?;
        cfg.control_all_agents = src.flag("AI_CONTROL_ALL_AGENTS", cfg.control_all_agents)?;

        cfg.tick_rate_hz = src.parse("AI_TICK_RATE_HZ", cfg.tick_rate_hz)?;
        cfg.request_interval_ticks =
            src.parse("AI_STEP_TICK_INTERVAL", cfg.request_interval_ticks)?;
        cfg.transition_interval_ticks =
            src.parse("AI_TRANSITION_TICK_INTERVAL", cfg.transition_interval_ticks)?;
        cfg.training_mode = src.flag("AI_TRAINING_MODE", cfg.training_mode)?;
        cfg.legacy_single_act = src.flag("AI_LEGACY_SINGLE_ACT", cfg.legacy_single_act)?;
        cfg.legacy_transitions = src.flag("AI_LEGACY_TRANSITIONS", cfg.legacy_transitions)?;
        cfg.max_steps_per_episode =
            src.parse("AI_MAX_STEPS_PER_EPISODE", cfg.max_steps_per_episode)?;

        cfg.time_limit_secs = src.parse("AI_EPISODE_TIME_LIMIT", cfg.time_limit_secs)?;
        cfg.post_tag_immunity_secs =
            src.parse("AI_POST_TAG_IMMUNITY", cfg.post_tag_immunity_secs)?;
        cfg.rounds = src.parse("SELF_PLAY_ROUNDS", cfg.rounds)?;
        cfg.seed = src.parse("AI_SEED", cfg.seed)?;
        cfg.arena_half_extent = src.parse("AI_ARENA_HALF_EXTENT", cfg.arena_half_extent)?;

        cfg.log_trajectories = src.flag("AI_LOG_TRAJECTORIES", cfg.log_trajectories)?;
        if let Some(dir) = src.raw("AI_TRAJECTORIES_DIR") {
            cfg.trajectories_dir = PathBuf::from(dir);
        }

        let r = &mut cfg.reward;
        r.distance_scale = src.parse("AI_DISTANCE_REWARD_SCALE", r.distance_scale)?;
        r.seeker_time_penalty = src.parse("AI_SEEKER_TIME_PENALTY", r.seeker_time_penalty)?;
        r.hider_survival_bonus = src.parse("AI_HIDER_SURVIVAL_BONUS", r.hider_survival_bonus)?;
        r.high_ground_bonus = src.parse("AI_HIGH_GROUND_BONUS", r.high_ground_bonus)?;
        r.near_jump_bonus = src.parse("AI_NEAR_JUMP_BONUS", r.near_jump_bonus)?;
        r.win_bonus = src.parse("AI_WIN_BONUS", r.win_bonus)?;
        r.tag_penalty = src.parse("AI_TAG_PENALTY", r.tag_penalty)?;
        r.timeout_bonus = src.parse("AI_TIMEOUT_BONUS", r.timeout_bonus)?;
        r.timeout_penalty = src.parse("AI_TIMEOUT_PENALTY", r.timeout_penalty)?;

        cfg.vision.ray_count = src.parse("AI_RAY_COUNT", cfg.vision.ray_count)?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks invariants that must hold before a session starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_names.is_empty() {
            return Err(ConfigError::NoAgents);
        }
        let mut seen = HashSet::new();
        for name in &self.agent_names {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateAgent(name.clone()));
            }
        }
        if let Some(seeker) = &self.starting_seeker {
            if !seen.contains(seeker.as_str()) {
                return Err(ConfigError::UnknownSeeker(seeker.clone()));
            }
        }
        if self.request_interval_ticks == 0 {
            return Err(ConfigError::ZeroCadence("AI_STEP_TICK_INTERVAL"));
        }
        if self.transition_interval_ticks == 0 {
            return Err(ConfigError::ZeroCadence("AI_TRANSITION_TICK_INTERVAL"));
        }
        positive("AI_TICK_RATE_HZ", self.tick_rate_hz)?;
        positive("AI_EPISODE_TIME_LIMIT", self.time_limit_secs)?;
        positive("AI_ARENA_HALF_EXTENT", self.arena_half_extent)?;
        positive("max_speed", self.body.max_speed)?;
        positive("max_range", self.vision.max_range)?;
        positive("reward_clip", self.reward.reward_clip)?;
        if !self.post_tag_immunity_secs.is_finite() || self.post_tag_immunity_secs < 0.0 {
            return Err(ConfigError::NotPositive {
                name: "AI_POST_TAG_IMMUNITY",
                value: self.post_tag_immunity_secs,
            });
        }
        Ok(())
    }

    /// Index of the agent that starts as seeker.
    pub fn starting_seeker_index(&self) -> usize {
        self.starting_seeker
            .as_ref()
            .and_then(|name| self.agent_names.iter().position(|n| n == name))
            .unwrap_or(0)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            agent_names: vec!["Agent1".to_string(), "Agent2".to_string()],
            starting_seeker: None,
            policy_enabled: true,
            control_all_agents: false,
            tick_rate_hz: 60.0,
            request_interval_ticks: 5,
            transition_interval_ticks: 5,
            training_mode: false,
            legacy_single_act: false,
            legacy_transitions: false,
            max_steps_per_episode: 0,
            time_limit_secs: 60.0,
            post_tag_immunity_secs: 1.5,
            tag_radius: 1.0,
            min_spawn_separation: 6.0,
            spawn_attempts: 32,
            rounds: 10,
            seed: 42,
            arena_half_extent: 15.0,
            log_trajectories: false,
            trajectories_dir: PathBuf::from("data/trajectories"),
            reward: RewardConfig::default(),
            vision: VisionConfig::default(),
            controller: ControllerConfig::default(),
            body: BodyConfig::default(),
        }
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

struct Source<'a, F> {
    lookup: &'a F,
}

impl<F> Source<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.raw(key) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.raw(key) {
            None => Ok(default),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" | "" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value,
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = SessionConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.agent_names.len(), 2);
        assert!(!cfg.legacy_single_act);
    }

    #[test]
    fn observation_dim_matches() {
        let mut cfg = SessionConfig::default();
        for rays in [0, 1, 8, 36] {
            cfg.vision.ray_count = rays;
            assert_eq!(cfg.observation_dim(), 12 + 2 * rays);
        }
    }

    #[test]
    fn env_overrides_apply() {
        let cfg = SessionConfig::from_lookup(lookup(&[
            ("AI_TRAINING_MODE", "1"),
            ("AI_IS_IT", "Agent2"),
            ("AI_STEP_TICK_INTERVAL", "3"),
            ("AI_DISTANCE_REWARD_SCALE", "0.25"),
            ("AI_EPISODE_TIME_LIMIT", "30"),
            ("AI_LOG_TRAJECTORIES", "yes"),
            ("AI_TRAJECTORIES_DIR", "/tmp/traj"),
        ]))
        .unwrap();
        assert!(cfg.training_mode);
        assert_eq!(cfg.starting_seeker_index(), 1);
        assert_eq!(cfg.request_interval_ticks, 3);
        assert_eq!(cfg.reward.distance_scale, 0.25);
        assert_eq!(cfg.time_limit_secs, 30.0);
        assert!(cfg.log_trajectories);
        assert_eq!(cfg.trajectories_dir, PathBuf::from("/tmp/traj"));
    }

    #[test]
    fn zero_cadence_fails_fast() {
        let err = SessionConfig::from_lookup(lookup(&[("AI_STEP_TICK_INTERVAL", "0")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroCadence("AI_STEP_TICK_INTERVAL"));
    }

    #[test]
    fn unparsable_value_is_rejected() {
        let err = SessionConfig::from_lookup(lookup(&[("AI_WIN_BONUS", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        let err = SessionConfig::from_lookup(lookup(&[("AI_TRAINING_MODE", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn unknown_starting_seeker_is_rejected() {
        let err = SessionConfig::from_lookup(lookup(&[("AI_IS_IT", "Nobody")])).unwrap_err();
        assert_eq!(err, ConfigError::UnknownSeeker("Nobody".into()));
    }

    #[test]
    fn duplicate_agent_names_are_rejected() {
        let err = SessionConfig::from_lookup(lookup(&[("AI_AGENT_NAMES", "A, B, A")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateAgent("A".into()));
    }

    #[test]
    fn starting_seeker_defaults_to_first() {
        assert_eq!(SessionConfig::default().starting_seeker_index(), 0);
    }
}
