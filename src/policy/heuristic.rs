//! Fallback ("NPC") controller for agents the external policy does not drive.
//!
//! Two modes share one jump heuristic:
//!
//! - **Wander**: a random direction resampled every `wander_interval_ticks`,
//!   blended with a pull toward the arena centre.
//! - **Chase**: direct pursuit of a target plus a randomized lateral strafe
//!   and a weak centre pull. Inside `close_range` the blend favours strafing.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ControllerConfig;
use crate::types::{normalize2, AgentId, Vec3};
use crate::wire::Action;

/// What the controller is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerMode {
    Wander,
    Chase { target: AgentId },
}

/// Deterministic (seeded) wander/chase controller for one agent.
#[derive(Debug, Clone)]
pub struct FallbackController {
    config: ControllerConfig,
    half_extent: f64,
    mode: ControllerMode,
    rng: StdRng,
    tick: u64,
    wander_dir: (f64, f64),
    strafe_sign: f64,
    grounded_ticks: u32,
    jump_cooldown: u32,
}

impl FallbackController {
    /// Creates a wandering controller.
    ///
    /// # Arguments
    ///
    /// * `config` - Controller tuning
    /// * `half_extent` - Arena half-size, used to scale the centre pull
    /// * `seed` - RNG seed; equal seeds give equal action streams
    pub fn new(config: ControllerConfig, half_extent: f64, seed: u64) -> Self {
        Self {
            config,
            half_extent,
            mode: ControllerMode::Wander,
            rng: StdRng::seed_from_u64(seed),
            tick: 0,
            wander_dir: (0.0, 0.0),
            strafe_sign: 1.0,
            grounded_ticks: 0,
            jump_cooldown: 0,
        }
    }

    pub fn mode(&self) -> ControllerMode {
        self.mode
    }

    /// Switches mode and restarts the wander/strafe timers.
    pub fn set_mode(&mut self, mode: ControllerMode) {
        self.mode = mode;
        self.tick = 0;
    }

    /// Produces this tick's action.
    ///
    /// # Arguments
    ///
    /// * `position` - The controlled agent's position
    /// * `grounded` - Whether the agent is on the floor
    /// * `target` - Position of the chase target; `None` degrades chase to wander
    pub fn next_action(&mut self, position: Vec3, grounded: bool, target: Option<Vec3>) -> Action {
        let (mx, mz) = match (self.mode, target) {
            (ControllerMode::Chase { .. }, Some(target)) => self.chase(position, target),
            _ => self.wander(position),
        };
        let jump = if self.jump_heuristic(grounded) { 1.0 } else { 0.0 };
        self.tick += 1;
        Action::new(mx, mz, jump)
    }

    /// Pull toward the centre, growing linearly with distance from it.
    fn centre_pull(&self, position: Vec3) -> (f64, f64) {
        let scale = self.half_extent.max(1e-6);
        (-position.x / scale, -position.z / scale)
    }

    fn wander(&mut self, position: Vec3) -> (f64, f64) {
        let interval = u64::from(self.config.wander_interval_ticks.max(1));
        if self.tick % interval == 0 || self.wander_dir == (0.0, 0.0) {
            let angle = self.rng.gen_range(0.0..std::f64::consts::TAU);
            self.wander_dir = (angle.cos(), angle.sin());
        }
        let (cx, cz) = self.centre_pull(position);
        let c = &self.config;
        normalize2(
            c.wander_center_weight * cx + c.wander_direction_weight * self.wander_dir.0,
            c.wander_center_weight * cz + c.wander_direction_weight * self.wander_dir.1,
        )
    }

    fn chase(&mut self, position: Vec3, target: Vec3) -> (f64, f64) {
        let flip = u64::from(self.config.strafe_flip_ticks.max(1));
        if self.tick % flip == 0 {
            self.strafe_sign = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        }
        let (dx, dz) = position.direction_to(&target);
        let (sx, sz) = (-dz * self.strafe_sign, dx * self.strafe_sign);
        let (cx, cz) = self.centre_pull(position);

        let c = &self.config;
        let (direct, strafe) = if position.horizontal_distance_to(&target) <= c.close_range {
            (c.close_direct_weight, c.close_strafe_weight)
        } else {
            (c.chase_direct_weight, c.chase_strafe_weight)
        };
        normalize2(
            direct * dx + strafe * sx + c.chase_center_weight * cx,
            direct * dz + strafe * sz + c.chase_center_weight * cz,
        )
    }

    /// Jumps after enough grounded ticks, then waits out a random cooldown.
    fn jump_heuristic(&mut self, grounded: bool) -> bool {
        self.jump_cooldown = self.jump_cooldown.saturating_sub(1);
        if !grounded {
            self.grounded_ticks = 0;
            return false;
        }
        self.grounded_ticks += 1;
        if self.grounded_ticks < self.config.min_grounded_ticks || self.jump_cooldown > 0 {
            return false;
        }
        let (lo, hi) = self.config.jump_cooldown_ticks;
        self.jump_cooldown = self.rng.gen_range(lo.min(hi)..=hi.max(lo));
        self.grounded_ticks = 0;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(seed: u64) -> FallbackController {
        FallbackController::new(ControllerConfig::default(), 15.0, seed)
    }

    #[test]
    fn wander_is_deterministic_per_seed() {
        let mut a = controller(3);
        let mut b = controller(3);
        for i in 0..300 {
            let p = Vec3::on_floor(i as f64 * 0.01, 0.0);
            assert_eq!(a.next_action(p, true, None), b.next_action(p, true, None));
        }
    }

    #[test]
    fn wander_direction_holds_between_resamples() {
        let mut c = controller(5);
        let first = c.next_action(Vec3::zero(), false, None);
        for _ in 1..ControllerConfig::default().wander_interval_ticks {
            assert_eq!(c.next_action(Vec3::zero(), false, None), first);
        }
    }

    #[test]
    fn wander_is_pulled_home_from_the_edge() {
        let mut c = controller(11);
        let mut inward = 0;
        for _ in 0..50 {
            let a = c.next_action(Vec3::on_floor(15.0, 0.0), false, None);
            if a.move_x < 0.0 {
                inward += 1;
            }
            c.set_mode(ControllerMode::Wander);
        }
        // 0.6 pull vs 0.4 random direction always wins at the wall.
        assert_eq!(inward, 50);
    }

    #[test]
    fn chase_heads_toward_target() {
        let mut c = controller(1);
        c.set_mode(ControllerMode::Chase { target: 1 });
        for _ in 0..200 {
            let a = c.next_action(Vec3::on_floor(-1.0, 0.0), false, Some(Vec3::on_floor(12.0, 0.0)));
            assert!(a.move_x > 0.9);
        }
    }

    #[test]
    fn chase_without_target_wanders() {
        let mut c = controller(1);
        c.set_mode(ControllerMode::Chase { target: 1 });
        let a = c.next_action(Vec3::zero(), false, None);
        assert!((a.move_x.hypot(a.move_z) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn jumps_after_grounded_streak_then_cools_down() {
        let mut c = controller(7);
        let cfg = ControllerConfig::default();
        let mut jumps = Vec::new();
        for tick in 0..400u32 {
            if c.next_action(Vec3::zero(), true, None).wants_jump() {
                jumps.push(tick);
            }
        }
        assert_eq!(jumps[0] + 1, cfg.min_grounded_ticks);
        for pair in jumps.windows(2) {
            assert!(pair[1] - pair[0] >= cfg.jump_cooldown_ticks.0);
        }
    }

    #[test]
    fn airborne_never_jumps() {
        let mut c = controller(7);
        for _ in 0..400 {
            assert!(!c.next_action(Vec3::zero(), false, None).wants_jump());
        }
    }
}
