//! tag-arena - simulation core of a two-agent pursuit ("tag") environment.
//!
//! Runs a fixed-rate arena in which a seeker tries to tag a hider before the
//! clock runs out. The crate derives per-agent observations, applies actions
//! supplied by an external policy over a JSON message contract, computes
//! shaped rewards and enforces the episode lifecycle.

pub mod agent;
pub mod arena;
pub mod body;
pub mod config;
pub mod episode;
pub mod error;
pub mod link;
pub mod metrics;
pub mod observation;
pub mod policy;
pub mod reward;
pub mod scheduler;
pub mod session;
pub mod trajectory;
pub mod types;
pub mod vision;
pub mod wire;

pub use config::SessionConfig;
pub use episode::{EpisodeStatus, Outcome, TerminalReason};
pub use error::{ConfigError, LinkError, TrajectoryError, WireError};
pub use link::{channel_pair, ChannelLink, NullLink, PolicyEndpoint, PolicyLink};
pub use session::Session;
pub use types::{AgentId, Role, Vec3};
pub use wire::Action;

/// Identifier type used for runs and log files.
pub type Id = String;

/// Generates a new unique identifier (UUID v4).
pub fn generate_id() -> Id {
    uuid::Uuid::new_v4().to_string()
}
