//! Core value types for the arena.
//!
//! Defines agent roles, 3D positions/velocities and the clock unit used
//! throughout the episode lifecycle.

use std::fmt;
use std::ops::{Add, Mul, Sub};

use qtty::{Quantity, Second};
use serde::{Deserialize, Serialize};

/// Simulation time in seconds.
pub type Seconds = Quantity<Second>;

/// Builds a [`Seconds`] quantity from a raw value.
pub const fn secs(value: f64) -> Seconds {
    Quantity::<Second>::new(value)
}

/// Index of an agent in the session's [`AgentRegistry`](crate::agent::AgentRegistry).
pub type AgentId = usize;

/// Role an agent plays in the current episode.
///
/// Exactly one agent holds each role per episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Seeker,
    Hider,
}

impl Role {
    /// Returns true for [`Role::Seeker`].
    pub fn is_seeker(&self) -> bool {
        matches!(self, Role::Seeker)
    }

    /// Binary feature used in observations (1.0 for the seeker).
    pub fn seeker_flag(&self) -> f64 {
        if self.is_seeker() {
            1.0
        } else {
            0.0
        }
    }

    /// The role on the other side of the pursuit.
    pub fn opponent(&self) -> Role {
        match self {
            Role::Seeker => Role::Hider,
            Role::Hider => Role::Seeker,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Seeker => write!(f, "seeker"),
            Role::Hider => write!(f, "hider"),
        }
    }
}

/// A point or vector in arena space. `y` is up; the floor is the x/z plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new vector.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// A point on the floor plane.
    pub const fn on_floor(x: f64, z: f64) -> Self {
        Self::new(x, 0.0, z)
    }

    /// Euclidean length.
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Vec3) -> f64 {
        (*other - *self).length()
    }

    /// Distance to another point ignoring elevation.
    pub fn horizontal_distance_to(&self, other: &Vec3) -> f64 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        (dx * dx + dz * dz).sqrt()
    }

    /// Returns the unit `(x, z)` direction from `self` toward `target`.
    ///
    /// Returns `(0, 0)` if the points coincide on the floor plane.
    pub fn direction_to(&self, target: &Vec3) -> (f64, f64) {
        normalize2(target.x - self.x, target.z - self.z)
    }

    /// True if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Components as `[x, y, z]`.
    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Normalizes a 2D vector, returning `(0, 0)` for degenerate input.
pub fn normalize2(x: f64, z: f64) -> (f64, f64) {
    let len = (x * x + z * z).sqrt();
    if !len.is_finite() || len < 1e-12 {
        (0.0, 0.0)
    } else {
        (x / len, z / len)
    }
}
