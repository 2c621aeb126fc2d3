//! Policy trait for the external decision-maker.

use crate::wire::Action;

/// A policy that maps observation vectors to actions.
///
/// Implementations answer `act_batch` / `act` frames on the far side of a
/// [`PolicyLink`](crate::link::PolicyLink); the arena itself never calls them.
pub trait Policy: Send {
    /// Selects one action per observation.
    ///
    /// # Arguments
    ///
    /// * `observations` - Observation vectors (from [`ObservationEncoder`](crate::observation::ObservationEncoder))
    ///
    /// # Returns
    ///
    /// A vector of actions, one per observation, in the same order.
    fn select_actions(&mut self, observations: &[Vec<f64>]) -> Vec<Action>;

    /// Returns a human-readable name for this policy.
    fn name(&self) -> &str;
}
