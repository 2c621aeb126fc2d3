//! Flat-floor kinematic body.
//!
//! The only [`DrivableAgent`] implementation: velocity chases the movement
//! intent, jumps are a vertical impulse under constant gravity, and the body
//! is clamped to the floor and the arena walls.

use serde::Serialize;

use crate::agent::DrivableAgent;
use crate::config::BodyConfig;
use crate::types::{normalize2, Vec3};
use crate::wire::Action;

/// Out-of-bounds state corrected by the body during integration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhysicsAnomaly {
    /// The body sank below the floor by more than the tolerance.
    BelowFloor { depth: f64 },
    /// Position or velocity became non-finite; the body was recentred.
    NonFinite,
}

/// A point-mass body on a flat walled floor.
#[derive(Debug, Clone)]
pub struct KinematicBody {
    config: BodyConfig,
    half_extent: f64,
    position: Vec3,
    velocity: Vec3,
    forward: (f64, f64),
    grounded: bool,
    intent: Action,
}

impl KinematicBody {
    /// Creates a body at the arena centre facing +z.
    pub fn new(config: BodyConfig, half_extent: f64) -> Self {
        Self {
            config,
            half_extent,
            position: Vec3::zero(),
            velocity: Vec3::zero(),
            forward: (0.0, 1.0),
            grounded: true,
            intent: Action::ZERO,
        }
    }

    /// The intent applied on the next [`integrate`](Self::integrate).
    pub fn intent(&self) -> Action {
        self.intent
    }

    /// Advances the body by `dt` seconds.
    ///
    /// Returns the anomaly that had to be corrected, if any.
    pub fn integrate(&mut self, dt: f64) -> Option<PhysicsAnomaly> {
        if !self.position.is_finite() || !self.velocity.is_finite() {
            self.position = Vec3::zero();
            self.velocity = Vec3::zero();
            self.grounded = true;
            return Some(PhysicsAnomaly::NonFinite);
        }

        // Horizontal: approach the desired velocity at bounded acceleration.
        let want_x = self.intent.move_x * self.config.max_speed;
        let want_z = self.intent.move_z * self.config.max_speed;
        let (dvx, dvz) = (want_x - self.velocity.x, want_z - self.velocity.z);
        let dv = (dvx * dvx + dvz * dvz).sqrt();
        let max_dv = self.config.acceleration * dt;
        if dv <= max_dv {
            self.velocity.x = want_x;
            self.velocity.z = want_z;
        } else {
            self.velocity.x += dvx / dv * max_dv;
            self.velocity.z += dvz / dv * max_dv;
        }

        // Vertical.
        if self.grounded && self.intent.wants_jump() {
            self.velocity.y = self.config.jump_speed;
            self.grounded = false;
        }
        if !self.grounded {
            self.velocity.y -= self.config.gravity * dt;
        }

        self.position = self.position + self.velocity * dt;

        let mut anomaly = None;
        if self.position.y <= 0.0 {
            let depth = -self.position.y;
            if depth > self.config.floor_tolerance {
                anomaly = Some(PhysicsAnomaly::BelowFloor { depth });
            }
            self.position.y = 0.0;
            self.velocity.y = 0.0;
            self.grounded = true;
        }

        let limit = (self.half_extent - self.config.radius).max(0.0);
        if self.position.x.abs() > limit {
            self.position.x = self.position.x.clamp(-limit, limit);
            self.velocity.x = 0.0;
        }
        if self.position.z.abs() > limit {
            self.position.z = self.position.z.clamp(-limit, limit);
            self.velocity.z = 0.0;
        }

        let heading = normalize2(self.velocity.x, self.velocity.z);
        if heading != (0.0, 0.0) {
            self.forward = heading;
        }
        anomaly
    }
}

impl DrivableAgent for KinematicBody {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn forward(&self) -> (f64, f64) {
        self.forward
    }

    fn is_grounded(&self) -> bool {
        self.grounded
    }

    fn radius(&self) -> f64 {
        self.config.radius
    }

    fn apply_intent(&mut self, action: Action) {
        self.intent = action;
    }

    fn place_at(&mut self, position: Vec3) {
        self.position = position;
        self.velocity = Vec3::zero();
        self.grounded = position.y <= 0.0;
        self.intent = Action::ZERO;
    }
}
