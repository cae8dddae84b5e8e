use crate::models::diagnostics::FrameStatsSnapshot;
use crate::models::report::{RunIssue, RunReport};
use crate::models::state::RunState;

/// A take that has just started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingStarted {
    pub trigger_timestamp: u64,
    pub camera_ids: Vec<String>,
}

/// Event observer for a run.
///
/// Methods are called from the controller thread, the recorder worker, or
/// (for `on_issue`) the frame callback. Implementations must be cheap and
/// must not block.
pub trait RunObserver: Send + Sync {
    /// Called when the controller observes a run state change.
    fn on_state_changed(&self, state: RunState);

    /// Called once per poll tick while the run is active.
    fn on_progress(&self, stats: &FrameStatsSnapshot);

    /// Called when the recording session has started its streams.
    fn on_recording_started(&self, started: &RecordingStarted);

    /// Called for every recorded recoverable issue.
    fn on_issue(&self, issue: &RunIssue);

    /// Called with the final report once shutdown completes.
    fn on_run_finished(&self, report: &RunReport);
}
