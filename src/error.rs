use thiserror::Error;

/// Startup configuration errors. These are fatal; nothing mid-episode returns them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("{0} must be at least 1 tick")]
    ZeroCadence(&'static str),

    #[error("{name} must be a positive finite number, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("At least one agent must be configured")]
    NoAgents,

    #[error("Duplicate agent name: {0}")]
    DuplicateAgent(String),

    #[error("Starting seeker {0:?} is not a configured agent")]
    UnknownSeeker(String),
}

/// Errors decoding a frame received from the policy process.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid action: {0}")]
    InvalidAction(String),
}

/// Errors sending a frame to the policy process.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Policy link is disconnected")]
    Disconnected,

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors writing the trajectory event log.
#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("Trajectory I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Trajectory encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_cadence_display() {
        let e = ConfigError::ZeroCadence("AI_STEP_TICK_INTERVAL");
        assert_eq!(e.to_string(), "AI_STEP_TICK_INTERVAL must be at least 1 tick");
    }

    #[test]
    fn invalid_value_display() {
        let e = ConfigError::InvalidValue {
            key: "AI_WIN_BONUS".into(),
            value: "lots".into(),
        };
        assert_eq!(e.to_string(), "Invalid value for AI_WIN_BONUS: \"lots\"");
    }

    #[test]
    fn malformed_payload_wraps_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let e = WireError::from(err);
        assert!(e.to_string().starts_with("Malformed payload"));
    }

    #[test]
    fn error_equality() {
        assert_eq!(ConfigError::NoAgents, ConfigError::NoAgents);
        assert_ne!(
            ConfigError::NoAgents,
            ConfigError::DuplicateAgent("Agent1".into())
        );
    }
}
