//! JSON message contract between the arena and the external policy process.
//!
//! Every frame is a `type`-tagged JSON object:
//!
//! ```text
//! arena  → policy   act_batch        {obs: {agent: [f64..]}}
//! policy → arena    action_batch     {actions: {agent: [move_x, move_z, jump]}}
//! arena  → policy   act              {obs: [f64..]}                 (legacy)
//! policy → arena    action           {action: [move_x, move_z, jump]} (legacy)
//! arena  → policy   transition_batch {transitions: [Transition..]}
//! arena  → policy   transition       {obs, action, reward, next_obs, done, info} (legacy)
//! ```
//!
//! Inbound frames are decoded leniently: each action entry is validated on
//! its own so one bad entry never poisons the rest of a batch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::episode::TerminalReason;
use crate::error::WireError;
use crate::observation::ObservationVector;
use crate::types::Role;

/// Movement and jump intent for one agent.
///
/// Move components always lie in the unit disc; `jump_intent` is a raw
/// scalar that consumers threshold at 0.5.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "[f64; 3]", try_from = "Vec<f64>")]
pub struct Action {
    pub move_x: f64,
    pub move_z: f64,
    pub jump_intent: f64,
}

impl Action {
    /// Jump threshold applied by consumers.
    pub const JUMP_THRESHOLD: f64 = 0.5;

    /// The neutral action: stand still, no jump.
    pub const ZERO: Action = Action {
        move_x: 0.0,
        move_z: 0.0,
        jump_intent: 0.0,
    };

    /// Creates an action, clamping movement to the unit disc.
    ///
    /// Non-finite components are replaced by zero.
    pub fn new(move_x: f64, move_z: f64, jump_intent: f64) -> Self {
        let mut x = finite_or_zero(move_x);
        let mut z = finite_or_zero(move_z);
        let len = (x * x + z * z).sqrt();
        if len > 1.0 {
            x /= len;
            z /= len;
        }
        Self {
            move_x: x,
            move_z: z,
            jump_intent: finite_or_zero(jump_intent),
        }
    }

    /// True if the jump intent crosses the threshold.
    pub fn wants_jump(&self) -> bool {
        self.jump_intent > Self::JUMP_THRESHOLD
    }

    /// Parses an action from a JSON value.
    ///
    /// Accepts `[move_x, move_z]` or `[move_x, move_z, jump]`; extra trailing
    /// numbers are ignored. Anything else is rejected.
    pub fn from_json(value: &Value) -> Result<Self, WireError> {
        let items = value
            .as_array()
            .ok_or_else(|| WireError::InvalidAction(format!("expected array, got {value}")))?;
        let mut numbers = Vec::with_capacity(3);
        for item in items.iter().take(3) {
            let n = item
                .as_f64()
                .ok_or_else(|| WireError::InvalidAction(format!("non-numeric entry {item}")))?;
            numbers.push(n);
        }
        Self::try_from(numbers)
    }
}

impl From<Action> for [f64; 3] {
    fn from(a: Action) -> Self {
        [a.move_x, a.move_z, a.jump_intent]
    }
}

impl TryFrom<Vec<f64>> for Action {
    type Error = WireError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        if values.len() < 2 {
            return Err(WireError::InvalidAction(format!(
                "expected 2 or 3 components, got {}",
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(WireError::InvalidAction("non-finite component".into()));
        }
        let jump = values.get(2).copied().unwrap_or(0.0);
        Ok(Action::new(values[0], values[1], jump))
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Side information attached to every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionInfo {
    pub agent: String,
    pub role: Role,
    pub episode: u64,
    pub distance_to_other: f64,
    pub time_elapsed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_reason: Option<TerminalReason>,
}

/// One agent's experience over one scheduler cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub obs: ObservationVector,
    pub action: Action,
    pub reward: f64,
    pub next_obs: ObservationVector,
    pub done: bool,
    pub info: TransitionInfo,
}

/// Frames sent by the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    ActBatch {
        obs: BTreeMap<String, ObservationVector>,
    },
    Act {
        obs: ObservationVector,
    },
    TransitionBatch {
        transitions: Vec<Transition>,
    },
    Transition(Transition),
}

impl OutboundMessage {
    /// Encodes the frame as a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frames received from the policy process.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    ActionBatch {
        #[serde(default)]
        actions: BTreeMap<String, Value>,
    },
    Action {
        #[serde(default)]
        action: Value,
    },
    #[serde(other)]
    Other,
}

impl InboundMessage {
    /// Decodes a raw frame.
    pub fn parse(frame: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(frame)?)
    }
}

/// Frames produced by a policy process (the reply side of the contract).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyReply {
    ActionBatch { actions: BTreeMap<String, Action> },
    Action { action: Action },
    /// Unknown frames are echoed back unchanged.
    Echo { recv: Value },
}

impl PolicyReply {
    /// Encodes the reply as a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn action_clamps_to_unit_disc() {
        let a = Action::new(3.0, 4.0, 1.0);
        assert!((a.move_x - 0.6).abs() < 1e-12);
        assert!((a.move_z - 0.8).abs() < 1e-12);
        let inside = Action::new(0.3, -0.2, 0.0);
        assert_eq!(inside.move_x, 0.3);
        assert_eq!(inside.move_z, -0.2);
    }

    #[test]
    fn jump_threshold_is_strict() {
        assert!(!Action::new(0.0, 0.0, 0.5).wants_jump());
        assert!(Action::new(0.0, 0.0, 0.51).wants_jump());
    }

    #[test]
    fn action_from_json_accepts_two_or_three() {
        let a = Action::from_json(&json!([0.5, -0.5, 0.9])).unwrap();
        assert!(a.wants_jump());
        let b = Action::from_json(&json!([0.1, 0.2])).unwrap();
        assert_eq!(b.jump_intent, 0.0);
    }

    #[test]
    fn action_from_json_rejects_garbage() {
        assert!(Action::from_json(&json!("left")).is_err());
        assert!(Action::from_json(&json!([0.1])).is_err());
        assert!(Action::from_json(&json!([0.1, "x", 0.0])).is_err());
        assert!(Action::from_json(&json!({"x": 1})).is_err());
    }

    #[test]
    fn act_batch_wire_shape() {
        let mut obs = BTreeMap::new();
        obs.insert("Agent1".to_string(), ObservationVector::from(vec![0.5, 1.0]));
        let frame = OutboundMessage::ActBatch { obs }.to_json().unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "act_batch");
        assert_eq!(value["obs"]["Agent1"], json!([0.5, 1.0]));
    }

    #[test]
    fn legacy_transition_is_flat() {
        let t = Transition {
            obs: ObservationVector::from(vec![1.0]),
            action: Action::new(0.0, 1.0, 0.0),
            reward: 0.5,
            next_obs: ObservationVector::from(vec![2.0]),
            done: true,
            info: TransitionInfo {
                agent: "Agent1".into(),
                role: Role::Seeker,
                episode: 3,
                distance_to_other: 4.0,
                time_elapsed: 1.5,
                winner: Some("Agent1".into()),
                terminal_reason: Some(TerminalReason::Tag),
            },
        };
        let value: Value =
            serde_json::from_str(&OutboundMessage::Transition(t).to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "transition");
        assert_eq!(value["action"], json!([0.0, 1.0, 0.0]));
        assert_eq!(value["info"]["role"], "seeker");
        assert_eq!(value["info"]["terminal_reason"], "tag");
        assert_eq!(value["done"], true);
    }

    #[test]
    fn inbound_batch_keeps_raw_entries() {
        let msg = InboundMessage::parse(
            r#"{"type":"action_batch","actions":{"A":[1,0,0],"X":"bad"},"info":{}}"#,
        )
        .unwrap();
        match msg {
            InboundMessage::ActionBatch { actions } => {
                assert!(Action::from_json(&actions["A"]).is_ok());
                assert!(Action::from_json(&actions["X"]).is_err());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn inbound_unknown_type_is_other() {
        let msg = InboundMessage::parse(r#"{"type":"echo","recv":{}}"#).unwrap();
        assert_eq!(msg, InboundMessage::Other);
    }

    #[test]
    fn inbound_garbage_is_error() {
        assert!(InboundMessage::parse("not json").is_err());
        assert!(InboundMessage::parse(r#"{"no_type":1}"#).is_err());
    }

    #[test]
    fn policy_reply_round_trips_through_inbound() {
        let mut actions = BTreeMap::new();
        actions.insert("Agent2".to_string(), Action::new(0.0, -1.0, 1.0));
        let frame = PolicyReply::ActionBatch { actions }.to_json().unwrap();
        let InboundMessage::ActionBatch { actions } = InboundMessage::parse(&frame).unwrap()
        else {
            panic!("expected action_batch");
        };
        let a = Action::from_json(&actions["Agent2"]).unwrap();
        assert_eq!(a, Action::new(0.0, -1.0, 1.0));
    }
}
