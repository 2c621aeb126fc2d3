//! Policies: the remote-side stand-ins and the in-arena fallback controller.

pub mod heuristic;
pub mod pursuit;
pub mod random;
pub mod trait_;

pub use heuristic::{ControllerMode, FallbackController};
pub use pursuit::PursuitPolicy;
pub use random::RandomPolicy;
pub use trait_::Policy;
