use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::camera::{CameraSummary, SkippedCamera};
use super::diagnostics::FrameStatsSnapshot;
use super::state::{RunState, StopReason};
use crate::trigger::policy::TriggerPolicy;

/// A recoverable problem encountered during a run.
///
/// None of these abort the run; they are collected and reported at the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunIssue {
    DeviceError { message: String },
    InvalidFrames { count: u64 },
    CameraSkipped { camera_id: String, reason: String },
    StreamStartFailed { camera_id: String, reason: String },
    StreamStopFailed { camera_id: String, reason: String },
    RecordingFailed { message: String },
    AcquisitionStopFailed { message: String },
    Backpressure { slow_callbacks: u64, max_callback_micros: u64 },
}

/// A file that appeared in the output directory during a take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256: Option<String>,
}

/// Failure to start one camera's stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStartError {
    pub camera_id: String,
    pub reason: String,
}

/// Failure to stop one camera's stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStopError {
    pub camera_id: String,
    pub reason: String,
}

/// Result of stopping a recording session: the files it produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiffReport {
    pub output_directory: PathBuf,
    /// Regular files present after stop and absent from the pre-start
    /// snapshot, sorted by path.
    pub files: Vec<RecordedFile>,
    pub stopped_cameras: Vec<String>,
    pub stop_errors: Vec<StreamStopError>,
}

impl FileDiffReport {
    pub fn empty(output_directory: PathBuf) -> Self {
        Self {
            output_directory,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.stopped_cameras.is_empty() && self.stop_errors.is_empty()
    }
}

/// Final summary of a run, handed to the caller and optionally persisted
/// as a JSON manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub elapsed_secs: f64,
    pub final_state: RunState,
    pub stop_reason: Option<StopReason>,
    pub trigger: TriggerPolicy,
    pub trigger_timestamp: Option<u64>,
    pub cameras: Vec<CameraSummary>,
    pub skipped_cameras: Vec<SkippedCamera>,
    pub output_directory: PathBuf,
    pub recorded_files: Vec<RecordedFile>,
    pub issues: Vec<RunIssue>,
    pub stats: FrameStatsSnapshot,
}

impl RunReport {
    pub fn recorded_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.recorded_files.iter().map(|f| &f.path)
    }

    pub fn recording_triggered(&self) -> bool {
        self.trigger_timestamp.is_some()
    }
}
