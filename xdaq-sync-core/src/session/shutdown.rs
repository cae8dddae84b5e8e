use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::models::camera::CameraSummary;
use crate::models::diagnostics::FrameStats;
use crate::models::report::{RunIssue, RunReport};
use crate::models::state::{AtomicRunState, StopReason};
use crate::session::issues::IssueLog;
use crate::session::recorder::RecorderWorker;
use crate::traits::acquisition_source::{AcquisitionSource, ReceiveScope};
use crate::traits::run_observer::RunObserver;
use crate::trigger::policy::Trigger;

/// Per-run bookkeeping the coordinator turns into a [`RunReport`].
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub clock: Instant,
    pub trigger: Arc<Trigger>,
    pub cameras: Vec<CameraSummary>,
    pub output_directory: PathBuf,
    pub stats: Arc<FrameStats>,
    pub issues: Arc<IssueLog>,
}

/// Ordered teardown of a run.
///
/// ```text
/// stop_requested → source.stop(wait) → stopped → close delivery scope
///                → stop recording → report
/// ```
///
/// The run state is `Stopped` before the delivery scope closes, so frames
/// still being flushed short-circuit in the callback. The recording is
/// stopped only after delivery has been torn down.
pub struct ShutdownCoordinator<'a, A: AcquisitionSource> {
    source: &'a mut A,
    run_state: &'a AtomicRunState,
    observer: Option<Arc<dyn RunObserver>>,
}

impl<'a, A: AcquisitionSource> ShutdownCoordinator<'a, A> {
    pub fn new(source: &'a mut A, run_state: &'a AtomicRunState) -> Self {
        Self {
            source,
            run_state,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Option<Arc<dyn RunObserver>>) -> Self {
        self.observer = observer;
        self
    }

    pub fn shutdown(self, scope: ReceiveScope, recorder: RecorderWorker, run: RunContext) -> RunReport {
        if self.run_state.request_stop(StopReason::Cancelled) {
            log::warn!("Shutdown entered while running, treating as cancellation");
            self.notify_state();
        }

        log::info!("Stopping acquisition");
        if let Err(e) = self.source.stop(true) {
            log::error!("Acquisition stop failed: {}", e);
            run.issues.push(RunIssue::AcquisitionStopFailed {
                message: e.to_string(),
            });
        }

        self.run_state.mark_stopped();
        self.notify_state();

        scope.close();
        log::info!("Frame delivery closed");

        let outcome = recorder.shutdown();

        let stats = run.stats.snapshot();
        let mut issues = run.issues.take();
        if run.issues.suppressed() > 0 {
            log::warn!("{} further issue(s) were not recorded", run.issues.suppressed());
        }
        if stats.invalid_frames > 0 {
            issues.push(RunIssue::InvalidFrames {
                count: stats.invalid_frames,
            });
        }
        if stats.slow_callbacks > 0 {
            issues.push(RunIssue::Backpressure {
                slow_callbacks: stats.slow_callbacks,
                max_callback_micros: stats.max_callback_micros,
            });
        }
        issues.extend(outcome.skipped.iter().map(|s| RunIssue::CameraSkipped {
            camera_id: s.camera_id.clone(),
            reason: s.reason.clone(),
        }));
        issues.extend(outcome.start_errors.iter().map(|e| RunIssue::StreamStartFailed {
            camera_id: e.camera_id.clone(),
            reason: e.reason.clone(),
        }));
        if let Some(ref failure) = outcome.failure {
            issues.push(RunIssue::RecordingFailed {
                message: failure.to_string(),
            });
        }

        let recorded_files = match outcome.report {
            Some(diff) => {
                issues.extend(diff.stop_errors.iter().map(|e| RunIssue::StreamStopFailed {
                    camera_id: e.camera_id.clone(),
                    reason: e.reason.clone(),
                }));
                diff.files
            }
            None => Vec::new(),
        };

        let report = RunReport {
            run_id: run.run_id,
            started_at: run.started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            elapsed_secs: run.clock.elapsed().as_secs_f64(),
            final_state: self.run_state.load(),
            stop_reason: self.run_state.stop_reason(),
            trigger: run.trigger.policy(),
            trigger_timestamp: run.trigger.fired_at(),
            cameras: run.cameras,
            skipped_cameras: outcome.skipped,
            output_directory: run.output_directory,
            recorded_files,
            issues,
            stats,
        };

        log::info!(
            "Run finished: {} frame(s), {} file(s) recorded, {} issue(s)",
            report.stats.frames,
            report.recorded_files.len(),
            report.issues.len()
        );

        if let Some(ref observer) = self.observer {
            observer.on_run_finished(&report);
        }
        report
    }

    fn notify_state(&self) {
        if let Some(ref observer) = self.observer {
            observer.on_state_changed(self.run_state.load());
        }
    }
}
