//! Transport between the arena and the external policy.
//!
//! The arena only needs fire-and-forget sends and a non-blocking poll, so the
//! link is a two-method trait. [`ChannelLink`] carries JSON frames over
//! `crossbeam_channel` to a [`PolicyEndpoint`] that may live on another
//! thread; [`NullLink`] drops everything for offline sessions.

use crossbeam_channel::{Receiver, Sender};
use serde_json::Value;
use tracing::debug;

use crate::error::LinkError;
use crate::policy::Policy;
use crate::wire::{Action, OutboundMessage, PolicyReply};

/// Frame transport used by the session.
pub trait PolicyLink {
    /// Sends a frame without waiting for a reply.
    fn send(&mut self, message: &OutboundMessage) -> Result<(), LinkError>;

    /// Returns every frame received since the last poll. Never blocks.
    fn poll(&mut self) -> Vec<String>;
}

/// A link with nobody on the other end.
#[derive(Debug, Default)]
pub struct NullLink {
    dropped: u64,
}

impl NullLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames sent into the void so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl PolicyLink for NullLink {
    fn send(&mut self, _message: &OutboundMessage) -> Result<(), LinkError> {
        self.dropped += 1;
        Ok(())
    }

    fn poll(&mut self) -> Vec<String> {
        Vec::new()
    }
}

/// Arena side of an in-process channel pair.
#[derive(Debug)]
pub struct ChannelLink {
    tx: Sender<String>,
    rx: Receiver<String>,
}

/// Policy side of an in-process channel pair.
#[derive(Debug)]
pub struct PolicyEndpoint {
    tx: Sender<String>,
    rx: Receiver<String>,
    stats: ServeStats,
}

/// Counters kept by a [`PolicyEndpoint`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    /// `act_batch` and `act` frames answered.
    pub requests: u64,
    /// Transitions received, counting every entry of a batch.
    pub transitions: u64,
    /// Unknown frames echoed back.
    pub echoed: u64,
    /// Frames that were not valid JSON.
    pub malformed: u64,
}

/// Creates a connected, unbounded link pair.
pub fn channel_pair() -> (ChannelLink, PolicyEndpoint) {
    let (to_policy, from_arena) = crossbeam_channel::unbounded();
    let (to_arena, from_policy) = crossbeam_channel::unbounded();
    (
        ChannelLink {
            tx: to_policy,
            rx: from_policy,
        },
        PolicyEndpoint {
            tx: to_arena,
            rx: from_arena,
            stats: ServeStats::default(),
        },
    )
}

impl PolicyLink for ChannelLink {
    fn send(&mut self, message: &OutboundMessage) -> Result<(), LinkError> {
        let frame = message.to_json()?;
        self.tx.send(frame).map_err(|_| LinkError::Disconnected)
    }

    fn poll(&mut self) -> Vec<String> {
        self.rx.try_iter().collect()
    }
}

impl PolicyEndpoint {
    pub fn stats(&self) -> ServeStats {
        self.stats
    }

    /// Takes every frame the arena has sent so far without answering.
    pub fn drain(&self) -> Vec<String> {
        self.rx.try_iter().collect()
    }

    /// Sends a raw frame to the arena.
    pub fn send_raw(&self, frame: impl Into<String>) -> Result<(), LinkError> {
        self.tx.send(frame.into()).map_err(|_| LinkError::Disconnected)
    }

    /// Sends a reply frame to the arena.
    pub fn reply(&self, reply: &PolicyReply) -> Result<(), LinkError> {
        self.send_raw(reply.to_json()?)
    }

    /// Computes the reply to one arena frame, if it needs one.
    ///
    /// Transitions are counted and not answered; unknown frame types are
    /// echoed; invalid JSON is skipped.
    pub fn respond(&mut self, frame: &str, policy: &mut dyn Policy) -> Option<PolicyReply> {
        let Ok(value) = serde_json::from_str::<Value>(frame) else {
            self.stats.malformed += 1;
            return None;
        };
        match serde_json::from_value::<OutboundMessage>(value.clone()) {
            Ok(OutboundMessage::ActBatch { obs }) => {
                self.stats.requests += 1;
                let (names, vectors): (Vec<String>, Vec<Vec<f64>>) =
                    obs.into_iter().map(|(n, o)| (n, o.into_inner())).unzip();
                let actions = policy.select_actions(&vectors);
                Some(PolicyReply::ActionBatch {
                    actions: names.into_iter().zip(actions).collect(),
                })
            }
            Ok(OutboundMessage::Act { obs }) => {
                self.stats.requests += 1;
                let action = policy
                    .select_actions(&[obs.into_inner()])
                    .into_iter()
                    .next()
                    .unwrap_or(Action::ZERO);
                Some(PolicyReply::Action { action })
            }
            Ok(OutboundMessage::TransitionBatch { transitions }) => {
                self.stats.transitions += transitions.len() as u64;
                None
            }
            Ok(OutboundMessage::Transition(_)) => {
                self.stats.transitions += 1;
                None
            }
            Err(_) => {
                self.stats.echoed += 1;
                Some(PolicyReply::Echo { recv: value })
            }
        }
    }

    /// Answers frames until the arena side hangs up.
    pub fn serve(mut self, policy: &mut dyn Policy) -> ServeStats {
        while let Ok(frame) = self.rx.recv() {
            if let Some(reply) = self.respond(&frame, policy) {
                if let Err(e) = self.reply(&reply) {
                    debug!(error = %e, "Arena hung up; stopping policy endpoint");
                    break;
                }
            }
        }
        debug!(policy = policy.name(), stats = ?self.stats, "Policy endpoint finished");
        self.stats
    }
}
