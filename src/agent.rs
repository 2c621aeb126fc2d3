//! Agent identity, roles and the drivable-body interface.

use crate::types::{secs, AgentId, Role, Seconds, Vec3};
use crate::wire::Action;

/// A body the core can read kinematics from and write intent to.
///
/// The core never integrates motion itself; it only reads the state below
/// and hands the body one [`Action`] per tick.
pub trait DrivableAgent {
    /// Current position (y is up).
    fn position(&self) -> Vec3;

    /// Current velocity.
    fn velocity(&self) -> Vec3;

    /// Unit forward heading on the floor plane.
    fn forward(&self) -> (f64, f64);

    /// Whether the body is standing on the floor.
    fn is_grounded(&self) -> bool;

    /// Collision radius.
    fn radius(&self) -> f64;

    /// Sets the desired movement and jump intent for the next physics step.
    fn apply_intent(&mut self, action: Action);

    /// Teleports the body (round reset / revive), clearing its motion.
    fn place_at(&mut self, position: Vec3);
}

/// Per-agent bookkeeping owned by the session.
#[derive(Debug, Clone)]
pub struct AgentRecord {
    /// Stable name; also the key used on the wire.
    pub name: String,
    /// Role this episode. `None` for bystanders outside the current pair.
    pub role: Option<Role>,
    /// Tag attempts before this instant are ignored.
    pub immune_until: Seconds,
    /// Cleared to take the agent out of play; reset restores it.
    pub is_alive: bool,
    /// Driven by the external policy rather than the fallback controller.
    pub is_controlled: bool,
}

impl AgentRecord {
    /// Creates a record with no role and no immunity.
    pub fn new(name: impl Into<String>, is_controlled: bool) -> Self {
        Self {
            name: name.into(),
            role: None,
            immune_until: NOT_IMMUNE,
            is_alive: true,
            is_controlled,
        }
    }

    /// True if a tag attempt at `now` would be ignored.
    pub fn is_immune(&self, now: Seconds) -> bool {
        now.value() < self.immune_until.value()
    }
}

/// Sentinel for "no immunity window".
pub const NOT_IMMUNE: Seconds = secs(f64::NEG_INFINITY);

/// Ordered collection of every agent in the session.
///
/// Registry order is stable for the whole session; [`AgentId`]s index into it.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<AgentRecord>,
}

impl AgentRegistry {
    /// Creates a registry from records in order.
    pub fn new(agents: Vec<AgentRecord>) -> Self {
        Self { agents }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn get(&self, id: AgentId) -> Option<&AgentRecord> {
        self.agents.get(id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut AgentRecord> {
        self.agents.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &AgentRecord)> {
        self.agents.iter().enumerate()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AgentRecord> {
        self.agents.iter_mut()
    }

    /// Looks up an agent by its wire name.
    pub fn index_of(&self, name: &str) -> Option<AgentId> {
        self.agents.iter().position(|a| a.name == name)
    }

    /// Name of an agent, or `""` for an unknown id.
    pub fn name(&self, id: AgentId) -> &str {
        self.agents.get(id).map(|a| a.name.as_str()).unwrap_or("")
    }

    /// Role of an agent this episode.
    pub fn role(&self, id: AgentId) -> Option<Role> {
        self.agents.get(id).and_then(|a| a.role)
    }

    /// Number of agents currently holding `role`.
    pub fn count_role(&self, role: Role) -> usize {
        self.agents.iter().filter(|a| a.role == Some(role)).count()
    }

    /// Ids of policy-controlled agents, in registry order.
    pub fn controlled(&self) -> Vec<AgentId> {
        self.iter()
            .filter(|(_, a)| a.is_controlled)
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AgentRegistry {
        AgentRegistry::new(vec![
            AgentRecord::new("Agent1", true),
            AgentRecord::new("Agent2", false),
        ])
    }

    #[test]
    fn new_record_is_not_immune() {
        let a = AgentRecord::new("a", false);
        assert!(!a.is_immune(secs(0.0)));
        assert!(!a.is_immune(secs(-1e9)));
        assert!(a.role.is_none());
        assert!(a.is_alive);
    }

    #[test]
    fn immunity_window_is_half_open() {
        let mut a = AgentRecord::new("a", false);
        a.immune_until = secs(2.0);
        assert!(a.is_immune(secs(1.99)));
        assert!(!a.is_immune(secs(2.0)));
    }

    #[test]
    fn lookup_by_name() {
        let reg = registry();
        assert_eq!(reg.index_of("Agent2"), Some(1));
        assert_eq!(reg.index_of("nobody"), None);
        assert_eq!(reg.name(0), "Agent1");
        assert_eq!(reg.name(7), "");
    }

    #[test]
    fn controlled_in_registry_order() {
        let reg = registry();
        assert_eq!(reg.controlled(), vec![0]);
    }

    #[test]
    fn count_role() {
        let mut reg = registry();
        reg.get_mut(0).unwrap().role = Some(Role::Seeker);
        reg.get_mut(1).unwrap().role = Some(Role::Hider);
        assert_eq!(reg.count_role(Role::Seeker), 1);
        assert_eq!(reg.count_role(Role::Hider), 1);
    }
}
