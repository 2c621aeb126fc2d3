//! Latest-action cache, one entry per agent.

use crate::types::AgentId;
use crate::wire::Action;

/// A cached action and when it arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedAction {
    pub action: Action,
    /// Scheduler tick at which the reply was received; `None` after a reset.
    pub received_tick: Option<u64>,
}

impl Default for CachedAction {
    fn default() -> Self {
        Self {
            action: Action::ZERO,
            received_tick: None,
        }
    }
}

/// Holds the last received action per agent.
///
/// Entries are overwritten only when a reply arrives and cleared only at
/// episode reset; a missing reply leaves the previous action in force.
#[derive(Debug, Clone)]
pub struct ActionCache {
    entries: Vec<CachedAction>,
}

impl ActionCache {
    /// Creates a cache of zero actions.
    pub fn new(agent_count: usize) -> Self {
        Self {
            entries: vec![CachedAction::default(); agent_count],
        }
    }

    /// Action currently in force for `id` (zero for unknown ids).
    pub fn get(&self, id: AgentId) -> Action {
        self.entries
            .get(id)
            .map(|e| e.action)
            .unwrap_or(Action::ZERO)
    }

    pub fn entry(&self, id: AgentId) -> Option<&CachedAction> {
        self.entries.get(id)
    }

    /// Overwrites the entry for `id`. Returns false for unknown ids.
    pub fn store(&mut self, id: AgentId, action: Action, tick: u64) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                *entry = CachedAction {
                    action,
                    received_tick: Some(tick),
                };
                true
            }
            None => false,
        }
    }

    /// Resets every entry to the zero action.
    pub fn clear(&mut self) {
        self.entries.fill(CachedAction::default());
    }

    /// Ticks since the entry for `id` was last written.
    pub fn age(&self, id: AgentId, now_tick: u64) -> Option<u64> {
        self.entries
            .get(id)
            .and_then(|e| e.received_tick)
            .map(|t| now_tick.saturating_sub(t))
    }
}
