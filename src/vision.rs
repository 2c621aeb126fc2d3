//! Ray-fan vision sensor.
//!
//! Each agent casts R rays spread evenly over a field of view centred on its
//! forward axis. Samples are taken once per physics tick and cached so the
//! observation encoder never triggers a ray query itself.

use crate::agent::DrivableAgent;
use crate::arena::{ArenaGeometry, Circle, RayTarget};
use crate::config::VisionConfig;
use crate::types::AgentId;

/// What a ray struck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitKind {
    None,
    Wall,
    Agent,
}

/// One ray's reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayReading {
    /// Hit distance divided by the sensor range, in [0, 1].
    pub distance: f64,
    pub kind: HitKind,
}

impl RayReading {
    /// Nothing within range.
    pub const CLEAR: RayReading = RayReading {
        distance: 1.0,
        kind: HitKind::None,
    };

    /// 1.0 if the ray struck an agent.
    pub fn agent_flag(&self) -> f64 {
        if self.kind == HitKind::Agent {
            1.0
        } else {
            0.0
        }
    }
}

/// All ray readings for one agent at one tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VisionSample {
    pub rays: Vec<RayReading>,
}

impl VisionSample {
    /// A sample with every ray clear.
    pub fn clear(ray_count: usize) -> Self {
        Self {
            rays: vec![RayReading::CLEAR; ray_count],
        }
    }
}

/// Casts and caches per-agent ray fans.
#[derive(Debug, Clone)]
pub struct VisionSensor {
    config: VisionConfig,
    cache: Vec<VisionSample>,
    blank: VisionSample,
}

impl VisionSensor {
    pub fn new(config: VisionConfig, agent_count: usize) -> Self {
        let blank = VisionSample::clear(config.ray_count);
        Self {
            cache: vec![blank.clone(); agent_count],
            blank,
            config,
        }
    }

    /// Unit ray directions for a body facing `forward`.
    ///
    /// A single ray points straight ahead; otherwise rays span the full
    /// field of view edge to edge.
    pub fn ray_directions(&self, forward: (f64, f64)) -> Vec<(f64, f64)> {
        let n = self.config.ray_count;
        let heading = forward.1.atan2(forward.0);
        let fov = self.config.fov_degrees.to_radians();
        (0..n)
            .map(|i| {
                let offset = if n == 1 {
                    0.0
                } else {
                    -fov / 2.0 + fov * i as f64 / (n - 1) as f64
                };
                let angle = heading + offset;
                (angle.cos(), angle.sin())
            })
            .collect()
    }

    /// Samples vision for agent `id` against the arena and the other bodies.
    pub fn cast<B: DrivableAgent>(
        &self,
        id: AgentId,
        bodies: &[B],
        arena: &ArenaGeometry,
    ) -> VisionSample {
        let Some(body) = bodies.get(id) else {
            return self.blank.clone();
        };
        let others: Vec<Circle> = bodies
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != id)
            .map(|(other, b)| {
                let p = b.position();
                Circle {
                    id: other,
                    x: p.x,
                    z: p.z,
                    radius: b.radius(),
                }
            })
            .collect();

        // Rays stay in the floor plane.
        let origin = body.position();
        let range = self.config.max_range;
        let rays = self
            .ray_directions(body.forward())
            .into_iter()
            .map(|dir| match arena.cast_ray(origin.x, origin.z, dir, range, &others) {
                Some(hit) => RayReading {
                    distance: (hit.distance / range).clamp(0.0, 1.0),
                    kind: match hit.target {
                        RayTarget::Wall => HitKind::Wall,
                        RayTarget::Agent(_) => HitKind::Agent,
                    },
                },
                None => RayReading::CLEAR,
            })
            .collect();
        VisionSample { rays }
    }

    /// Refreshes the cached sample of every agent. Call once per tick.
    pub fn sample_all<B: DrivableAgent>(&mut self, bodies: &[B], arena: &ArenaGeometry) {
        self.cache = (0..bodies.len())
            .map(|id| self.cast(id, bodies, arena))
            .collect();
    }

    /// Latest cached sample; all-clear before the first tick.
    pub fn latest(&self, id: AgentId) -> &VisionSample {
        self.cache.get(id).unwrap_or(&self.blank)
    }
}
