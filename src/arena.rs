//! Arena geometry: a square walled floor with optional box obstacles.
//!
//! All queries are 2D on the floor plane `(x, z)`.

use rand::Rng;

use crate::types::{AgentId, Vec3};

/// Axis-aligned box on the floor plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min_x: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_z: f64,
}

impl Aabb {
    /// Creates a box from its centre and half-sizes.
    pub fn centered(x: f64, z: f64, half_x: f64, half_z: f64) -> Self {
        Self {
            min_x: x - half_x,
            min_z: z - half_z,
            max_x: x + half_x,
            max_z: z + half_z,
        }
    }

    /// True if the point lies inside the box grown by `margin`.
    pub fn contains(&self, x: f64, z: f64, margin: f64) -> bool {
        x >= self.min_x - margin
            && x <= self.max_x + margin
            && z >= self.min_z - margin
            && z <= self.max_z + margin
    }

    /// Slab test. Returns the entry distance along a unit ray, if any.
    fn ray_entry(&self, ox: f64, oz: f64, dx: f64, dz: f64) -> Option<f64> {
        let (mut t_min, mut t_max) = (0.0_f64, f64::INFINITY);
        for (o, d, lo, hi) in [
            (ox, dx, self.min_x, self.max_x),
            (oz, dz, self.min_z, self.max_z),
        ] {
            if d.abs() < 1e-12 {
                if o < lo || o > hi {
                    return None;
                }
            } else {
                let t1 = (lo - o) / d;
                let t2 = (hi - o) / d;
                t_min = t_min.max(t1.min(t2));
                t_max = t_max.min(t1.max(t2));
                if t_min > t_max {
                    return None;
                }
            }
        }
        Some(t_min)
    }
}

/// Something a ray can strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayTarget {
    /// Arena wall or obstacle.
    Wall,
    /// Another agent's body.
    Agent(AgentId),
}

/// First hit along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f64,
    pub target: RayTarget,
}

/// An agent's footprint for ray queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub id: AgentId,
    pub x: f64,
    pub z: f64,
    pub radius: f64,
}

impl Circle {
    fn ray_entry(&self, ox: f64, oz: f64, dx: f64, dz: f64) -> Option<f64> {
        let (fx, fz) = (ox - self.x, oz - self.z);
        let c = fx * fx + fz * fz - self.radius * self.radius;
        if c <= 0.0 {
            return Some(0.0);
        }
        let b = fx * dx + fz * dz;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let t = -b - disc.sqrt();
        (t >= 0.0).then_some(t)
    }
}

/// Static arena layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ArenaGeometry {
    half_extent: f64,
    obstacles: Vec<Aabb>,
}

impl ArenaGeometry {
    /// An empty square arena spanning `[-half_extent, half_extent]` on both axes.
    pub fn open(half_extent: f64) -> Self {
        Self {
            half_extent,
            obstacles: Vec::new(),
        }
    }

    /// Adds box obstacles.
    pub fn with_obstacles(mut self, obstacles: impl IntoIterator<Item = Aabb>) -> Self {
        self.obstacles.extend(obstacles);
        self
    }

    pub fn half_extent(&self) -> f64 {
        self.half_extent
    }

    pub fn obstacles(&self) -> &[Aabb] {
        &self.obstacles
    }

    /// Casts a ray from `(ox, oz)` along the unit direction `(dx, dz)`.
    ///
    /// Returns the closest wall, obstacle or agent circle within `max_range`.
    /// The caller is responsible for leaving the casting agent out of `agents`.
    pub fn cast_ray(
        &self,
        ox: f64,
        oz: f64,
        (dx, dz): (f64, f64),
        max_range: f64,
        agents: &[Circle],
    ) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        let mut consider = |distance: f64, target: RayTarget| {
            if distance.is_finite()
                && distance <= max_range
                && best.is_none_or(|b| distance < b.distance)
            {
                best = Some(RayHit { distance, target });
            }
        };

        consider(self.wall_distance(ox, oz, dx, dz), RayTarget::Wall);
        for obstacle in &self.obstacles {
            if let Some(t) = obstacle.ray_entry(ox, oz, dx, dz) {
                consider(t, RayTarget::Wall);
            }
        }
        for circle in agents {
            if let Some(t) = circle.ray_entry(ox, oz, dx, dz) {
                consider(t, RayTarget::Agent(circle.id));
            }
        }
        best
    }

    fn wall_distance(&self, ox: f64, oz: f64, dx: f64, dz: f64) -> f64 {
        let h = self.half_extent;
        let axis = |o: f64, d: f64| {
            if d > 1e-12 {
                ((h - o) / d).max(0.0)
            } else if d < -1e-12 {
                ((-h - o) / d).max(0.0)
            } else {
                f64::INFINITY
            }
        };
        axis(ox, dx).min(axis(oz, dz))
    }

    /// Samples a floor point at least `margin` away from walls and obstacles.
    ///
    /// Falls back to an unchecked point if no clear spot is found quickly.
    pub fn sample_spawn<R: Rng + ?Sized>(&self, rng: &mut R, margin: f64) -> Vec3 {
        let limit = (self.half_extent - margin).max(0.0);
        let mut sample = || {
            if limit > 0.0 {
                Vec3::on_floor(rng.gen_range(-limit..=limit), rng.gen_range(-limit..=limit))
            } else {
                Vec3::zero()
            }
        };
        let mut point = sample();
        for _ in 0..16 {
            if !self.blocked(point.x, point.z, margin) {
                break;
            }
            point = sample();
        }
        point
    }

    /// True if the point is inside an obstacle (grown by `margin`).
    pub fn blocked(&self, x: f64, z: f64, margin: f64) -> bool {
        self.obstacles.iter().any(|o| o.contains(x, z, margin))
    }
}
