//! Append-only JSON-lines trajectory log, one file per episode.
//!
//! Each line is a `type`-tagged event. A file always opens with
//! `episode_start`; `episode_end` closes it. I/O failures never interrupt the
//! simulation: the logger warns once and disables itself.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::body::PhysicsAnomaly;
use crate::episode::{Outcome, TerminalReason};
use crate::error::TrajectoryError;
use crate::Id;

/// One line of the trajectory log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrajectoryEvent {
    EpisodeStart {
        episode: u64,
        seeker: String,
        hider: String,
        time_limit: f64,
        time: f64,
    },
    Step {
        agent: String,
        pos: [f64; 3],
        vel: [f64; 3],
        /// True for the seeker.
        is_it: bool,
        time: f64,
    },
    Tag {
        attacker: String,
        target: String,
        time: f64,
    },
    Timeout {
        time: f64,
    },
    EpisodeEnd {
        episode: u64,
        outcome: Outcome,
        reason: TerminalReason,
        winner: String,
        duration: f64,
        time: f64,
    },
    Anomaly {
        agent: String,
        #[serde(flatten)]
        anomaly: PhysicsAnomaly,
        time: f64,
    },
}

/// Writes [`TrajectoryEvent`]s under `<dir>/<run_id>_ep<NNNNN>.jsonl`.
#[derive(Debug)]
pub struct TrajectoryLogger {
    dir: PathBuf,
    run_id: Id,
    writer: Option<BufWriter<File>>,
    enabled: bool,
}

impl TrajectoryLogger {
    /// Creates a logger. Nothing touches the disk until the first episode.
    pub fn new(dir: impl Into<PathBuf>, run_id: Id) -> Self {
        Self {
            dir: dir.into(),
            run_id,
            writer: None,
            enabled: true,
        }
    }

    /// A logger that never writes.
    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            run_id: Id::new(),
            writer: None,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Path of the file for episode `episode`.
    pub fn episode_path(&self, episode: u64) -> PathBuf {
        self.dir.join(format!("{}_ep{:05}.jsonl", self.run_id, episode))
    }

    /// Opens the file for a new episode and writes its `episode_start` line.
    pub fn begin_episode(&mut self, start: TrajectoryEvent) {
        let TrajectoryEvent::EpisodeStart { episode, .. } = start else {
            return;
        };
        if !self.enabled {
            return;
        }
        let path = self.episode_path(episode);
        match open_append(&self.dir, &path) {
            Ok(file) => self.writer = Some(BufWriter::new(file)),
            Err(e) => return self.guard(Err(e)),
        }
        self.record(&start);
    }

    /// Appends one event to the current episode file.
    pub fn record(&mut self, event: &TrajectoryEvent) {
        if !self.enabled {
            return;
        }
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let result = write_line(writer, event);
        self.guard(result);
    }

    /// Writes `episode_end` and closes the episode file.
    pub fn end_episode(&mut self, end: &TrajectoryEvent) {
        self.record(end);
        if let Some(mut writer) = self.writer.take() {
            let flushed = writer.flush().map_err(TrajectoryError::from);
            self.guard(flushed);
        }
    }

    fn guard(&mut self, result: Result<(), TrajectoryError>) {
        if let Err(e) = result {
            warn!(error = %e, dir = %self.dir.display(), "Trajectory logging disabled");
            self.enabled = false;
            self.writer = None;
        }
    }
}

fn open_append(dir: &Path, path: &Path) -> Result<File, TrajectoryError> {
    fs::create_dir_all(dir)?;
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn write_line<W: Write>(writer: &mut W, event: &TrajectoryEvent) -> Result<(), TrajectoryError> {
    serde_json::to_writer(&mut *writer, event)?;
    writer.write_all(b"\n")?;
    Ok(())
}
