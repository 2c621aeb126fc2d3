//! Observation encoding for the arena.
//!
//! Builds the fixed-length per-agent feature vector sent to the policy:
//!
//! ```text
//! [pos(2), vel(2), rel_pos(2), rel_vel(2), is_seeker, opp_is_seeker, heading(2)]
//!     ++ [ray_1_distance, ray_1_agent_hit, ..., ray_R_distance, ray_R_agent_hit]
//! ```

use serde::{Deserialize, Serialize};

use crate::agent::DrivableAgent;
use crate::config::SessionConfig;
use crate::types::{Role, Vec3};
use crate::vision::{RayReading, VisionSample};

/// Index of the self-is-seeker flag.
pub const SEEKER_FLAG_INDEX: usize = 8;

/// Index of the opponent-relative position (x, z).
pub const REL_POS_INDEX: usize = 4;

/// A fixed-length observation. Produced fresh for every request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservationVector(Vec<f64>);

impl ObservationVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    /// True if the vector belongs to the seeker (flag at index 8).
    pub fn is_seeker(&self) -> bool {
        self.0
            .get(SEEKER_FLAG_INDEX)
            .is_some_and(|flag| *flag >= 0.5)
    }
}

impl From<Vec<f64>> for ObservationVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Read-only kinematic snapshot of one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentView {
    pub position: Vec3,
    pub velocity: Vec3,
    pub forward: (f64, f64),
    pub role: Option<Role>,
}

impl AgentView {
    /// Captures the current state of a drivable body.
    pub fn of<A: DrivableAgent + ?Sized>(body: &A, role: Option<Role>) -> Self {
        Self {
            position: body.position(),
            velocity: body.velocity(),
            forward: body.forward(),
            role,
        }
    }

    fn seeker_flag(&self) -> f64 {
        self.role.map(|r| r.seeker_flag()).unwrap_or(0.0)
    }
}

/// Encodes agent state into [`ObservationVector`]s.
#[derive(Debug, Clone)]
pub struct ObservationEncoder {
    half_extent: f64,
    max_speed: f64,
    ray_count: usize,
}

impl ObservationEncoder {
    /// Creates an encoder.
    ///
    /// # Arguments
    ///
    /// * `half_extent` - Position normalization scale (arena half-size)
    /// * `max_speed` - Velocity normalization scale
    /// * `ray_count` - Number of vision rays R
    pub fn new(half_extent: f64, max_speed: f64, ray_count: usize) -> Self {
        Self {
            half_extent,
            max_speed,
            ray_count,
        }
    }

    /// Creates an encoder from session settings.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.arena_half_extent,
            config.body.max_speed,
            config.vision.ray_count,
        )
    }

    /// Length of every vector this encoder produces.
    pub fn dim(&self) -> usize {
        SessionConfig::BASE_FEATURE_DIM + SessionConfig::RAY_FEATURE_DIM * self.ray_count
    }

    /// Builds the observation for `agent`.
    ///
    /// A missing opponent encodes as zero relative state. Vision samples
    /// shorter than the ray budget are padded with clear readings; longer
    /// ones are truncated.
    pub fn encode(
        &self,
        agent: &AgentView,
        opponent: Option<&AgentView>,
        vision: &VisionSample,
    ) -> ObservationVector {
        let mut obs = Vec::with_capacity(self.dim());

        // --- Self kinematics ---
        obs.push(scaled(agent.position.x, self.half_extent));
        obs.push(scaled(agent.position.z, self.half_extent));
        obs.push(scaled(agent.velocity.x, self.max_speed));
        obs.push(scaled(agent.velocity.z, self.max_speed));

        // --- Opponent-relative ---
        match opponent {
            Some(other) => {
                let rel_pos = other.position - agent.position;
                let rel_vel = other.velocity - agent.velocity;
                obs.push(scaled(rel_pos.x, 2.0 * self.half_extent));
                obs.push(scaled(rel_pos.z, 2.0 * self.half_extent));
                obs.push(scaled(rel_vel.x, 2.0 * self.max_speed));
                obs.push(scaled(rel_vel.z, 2.0 * self.max_speed));
            }
            None => obs.extend([0.0; 4]),
        }

        // --- Roles ---
        obs.push(agent.seeker_flag());
        obs.push(opponent.map(AgentView::seeker_flag).unwrap_or(0.0));

        // --- Heading ---
        obs.push(scaled(agent.forward.0, 1.0));
        obs.push(scaled(agent.forward.1, 1.0));

        // --- Vision ---
        for i in 0..self.ray_count {
            let ray = vision.rays.get(i).copied().unwrap_or(RayReading::CLEAR);
            obs.push(unit(ray.distance));
            obs.push(ray.agent_flag());
        }

        ObservationVector(obs)
    }
}

/// `value / scale` clamped to [-1, 1]; non-finite input becomes 0.
fn scaled(value: f64, scale: f64) -> f64 {
    let v = value / scale;
    if v.is_finite() {
        v.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Ray distance clamped to [0, 1]; an unusable reading counts as clear.
fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        RayReading::CLEAR.distance
    }
}
