use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::decoding::frame_decoder::FrameLayout;
use crate::models::camera::{Camera, CameraSummary};
use crate::models::config::SyncConfiguration;
use crate::models::diagnostics::FrameStats;
use crate::models::error::SyncError;
use crate::models::report::{RunIssue, RunReport};
use crate::models::state::{AtomicRunState, RunState, StopReason};
use crate::session::issues::IssueLog;
use crate::session::recorder::{RecorderSettings, RecorderWorker, StartRequester};
use crate::session::shutdown::{RunContext, ShutdownCoordinator};
use crate::traits::acquisition_source::{AcquisitionSource, FrameCallback, FrameDelivery, ReceiveScope};
use crate::traits::camera_client::CameraClient;
use crate::traits::run_observer::RunObserver;
use crate::trigger::policy::{Trigger, TriggerAction, TriggerPolicy};

/// Clonable cancellation handle for a run.
///
/// `cancel` is a single atomic compare-exchange: no locking, allocation or
/// I/O, so it may be called from a signal handler.
#[derive(Debug, Clone)]
pub struct RunControl {
    state: Arc<AtomicRunState>,
}

impl RunControl {
    /// Request a graceful stop. Returns `false` if the run was already
    /// stopping.
    pub fn cancel(&self) -> bool {
        self.state.request_stop(StopReason::Cancelled)
    }

    pub fn state(&self) -> RunState {
        self.state.load()
    }
}

/// List the cameras the client can see, failing if there are none.
pub fn discover_cameras<C: CameraClient + ?Sized>(client: &C) -> Result<Vec<Camera>, SyncError> {
    let cameras = client.list_cameras()?;
    if cameras.is_empty() {
        return Err(SyncError::NoCamerasFound);
    }
    for camera in &cameras {
        log::debug!(
            "Found camera {} ({}) with {} capabilities",
            camera.id,
            camera.name,
            camera.capabilities.len()
        );
    }
    Ok(cameras)
}

/// Top-level orchestrator for one synchronized run.
///
/// ```text
/// [AcquisitionSource] → callback → FrameDecoder → Trigger ─Fire→ [RecorderWorker] → RecordingSession
///        ↑                                                                   ↑
///   start/stop ←──────── poll loop (deadline, cancellation) ──→ ShutdownCoordinator
/// ```
///
/// A controller runs once; its run state never returns to `Running`.
pub struct AcquisitionController<A: AcquisitionSource, C: CameraClient + 'static> {
    source: A,
    client: Arc<C>,
    config: SyncConfiguration,
    run_state: Arc<AtomicRunState>,
    observer: Option<Arc<dyn RunObserver>>,
}

impl<A: AcquisitionSource, C: CameraClient + 'static> AcquisitionController<A, C> {
    pub fn new(source: A, client: Arc<C>, config: SyncConfiguration) -> Self {
        Self {
            source,
            client,
            config,
            run_state: Arc::new(AtomicRunState::new()),
            observer: None,
        }
    }

    pub fn set_observer(&mut self, observer: Arc<dyn RunObserver>) {
        self.observer = Some(observer);
    }

    pub fn run_control(&self) -> RunControl {
        RunControl {
            state: Arc::clone(&self.run_state),
        }
    }

    pub fn state(&self) -> RunState {
        self.run_state.load()
    }

    pub fn source(&self) -> &A {
        &self.source
    }

    /// Acquire for up to `duration`, recording with `cameras` once
    /// `trigger` fires, then shut down in order and report.
    ///
    /// Blocks the calling thread. Returns early on cancellation through
    /// [`RunControl`]. Fails before acquisition starts if `cameras` is
    /// empty or the device cannot be initialised.
    pub fn run(
        &mut self,
        duration: Duration,
        trigger: TriggerPolicy,
        cameras: Vec<Camera>,
    ) -> Result<RunReport, SyncError> {
        self.config.validate().map_err(SyncError::Configuration)?;
        if cameras.is_empty() {
            return Err(SyncError::NoCamerasFound);
        }
        if self.run_state.load().is_stopped() {
            return Err(SyncError::InvalidState("controller has already run".into()));
        }

        let started_at = chrono::Utc::now();
        let clock = Instant::now();

        self.source
            .enable_streams(&self.config.stream_selector)
            .map_err(|e| SyncError::AcquisitionInit(e.to_string()))?;
        let num_streams = self.source.num_active_streams();
        let layout = FrameLayout::from_device(self.source.sample_size_bytes(), num_streams)
            .map_err(|e| SyncError::AcquisitionInit(e.to_string()))?;
        let sample_rate_hz = self.source.sample_rate_hz();
        log::info!(
            "Enabled {} stream(s): frame size {} bytes at {} Hz",
            num_streams,
            layout.frame_size_bytes(),
            sample_rate_hz
        );

        let trigger = Arc::new(Trigger::new(trigger));
        let stats = Arc::new(FrameStats::new());
        let issues = Arc::new(IssueLog::new(self.config.max_recorded_issues));
        let camera_summaries = cameras.iter().map(CameraSummary::from).collect();

        let recorder = RecorderWorker::spawn(
            Arc::clone(&self.client),
            cameras,
            RecorderSettings {
                output_directory: self.config.output_directory.clone(),
                media_type: self.config.required_media_type.clone(),
                recording_duration: self.config.recording_duration,
                checksum_recordings: self.config.checksum_recordings,
            },
            self.observer.clone(),
        )?;

        let handler = Arc::new(FrameHandler {
            layout,
            sample_rate_hz,
            run_state: Arc::clone(&self.run_state),
            trigger: Arc::clone(&trigger),
            stats: Arc::clone(&stats),
            issues: Arc::clone(&issues),
            recorder: recorder.requester(),
            observer: self.observer.clone(),
            stop_on_device_error: self.config.stop_on_device_error,
        });
        let callback: FrameCallback = Arc::new(move |delivery: FrameDelivery<'_>| handler.handle(delivery));

        let scope = match self.source.start_receiving(callback) {
            Ok(scope) => scope,
            Err(e) => return Err(self.abort_start(None, recorder, e)),
        };
        if let Err(e) = self.source.start(true) {
            return Err(self.abort_start(Some(scope), recorder, e));
        }
        log::info!("Acquisition started (trigger: {})", trigger.policy());

        if self.run_state.load().is_running() {
            self.notify_state(RunState::Running);
        }
        self.poll_until_stop_requested(clock, duration, &stats);
        self.notify_state(self.run_state.load());

        let run = RunContext {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at,
            clock,
            trigger,
            cameras: camera_summaries,
            output_directory: self.config.output_directory.clone(),
            stats,
            issues,
        };

        let report = ShutdownCoordinator::new(&mut self.source, &self.run_state)
            .with_observer(self.observer.clone())
            .shutdown(scope, recorder, run);
        Ok(report)
    }

    /// Cooperative poll loop: sleeps in `poll_interval` ticks until the run
    /// leaves `Running`, flipping it on the deadline.
    fn poll_until_stop_requested(&self, clock: Instant, duration: Duration, stats: &FrameStats) {
        let poll_interval = self.config.poll_interval;

        while self.run_state.load().is_running() {
            let elapsed = clock.elapsed();
            if elapsed >= duration {
                if self.run_state.request_stop(StopReason::DeadlineElapsed) {
                    log::info!("Run duration of {:.1}s elapsed", duration.as_secs_f64());
                }
                break;
            }

            if let Some(ref observer) = self.observer {
                observer.on_progress(&stats.snapshot());
            }

            thread::sleep(poll_interval.min(duration - elapsed));
        }

        if let Some(reason) = self.run_state.stop_reason() {
            log::info!("Stop requested ({:?})", reason);
        }
    }

    /// Unwind a run whose acquisition never started, leaving the source
    /// free for another receiver.
    fn abort_start(
        &mut self,
        scope: Option<ReceiveScope>,
        recorder: RecorderWorker,
        error: SyncError,
    ) -> SyncError {
        log::error!("Acquisition failed to start: {}", error);
        if self.run_state.request_stop(StopReason::StartFailed) {
            self.notify_state(RunState::StopRequested);
        }
        if let Err(e) = self.source.stop(false) {
            log::warn!("Acquisition stop after failed start: {}", e);
        }
        self.run_state.mark_stopped();
        if let Some(scope) = scope {
            scope.close();
        }
        recorder.shutdown();
        self.notify_state(RunState::Stopped);
        SyncError::AcquisitionInit(error.to_string())
    }

    fn notify_state(&self, state: RunState) {
        if let Some(ref observer) = self.observer {
            observer.on_state_changed(state);
        }
    }
}

/// Everything the frame callback touches. Runs on the source's delivery
/// thread and performs only decode, trigger evaluation and dispatch.
struct FrameHandler {
    layout: FrameLayout,
    sample_rate_hz: f64,
    run_state: Arc<AtomicRunState>,
    trigger: Arc<Trigger>,
    stats: Arc<FrameStats>,
    issues: Arc<IssueLog>,
    recorder: StartRequester,
    observer: Option<Arc<dyn RunObserver>>,
    stop_on_device_error: bool,
}

impl FrameHandler {
    fn handle(&self, delivery: FrameDelivery<'_>) {
        match delivery {
            FrameDelivery::Error(message) => self.on_device_error(message),
            FrameDelivery::Data(raw) => self.on_data(raw),
        }
    }

    /// Device errors are surfaced in every run state.
    fn on_device_error(&self, message: &str) {
        let count = self.stats.record_device_error();
        log::error!("Device error #{}: {}", count, message);

        let issue = RunIssue::DeviceError {
            message: message.to_string(),
        };
        if let Some(ref observer) = self.observer {
            observer.on_issue(&issue);
        }
        self.issues.push(issue);

        if self.stop_on_device_error && self.run_state.request_stop(StopReason::DeviceError) {
            log::warn!("Stopping run after device error");
        }
    }

    fn on_data(&self, raw: &[u8]) {
        if raw.is_empty() {
            return;
        }

        let state = self.run_state.load();
        if state.is_stopped() {
            // Trailing flush after stop.
            self.stats.record_dropped_after_stop();
            return;
        }

        let began = Instant::now();
        let batch = match self.layout.decode(raw) {
            Ok(batch) => batch,
            Err(e) => {
                let count = self.stats.record_invalid();
                log::warn!("Dropping frame: {} ({} invalid so far)", e, count);
                return;
            }
        };

        let first_timestamp = batch.first_timestamp();
        self.stats
            .record_frame(raw.len(), batch.num_samples(), first_timestamp);

        if state.is_running()
            && self.trigger.evaluate(first_timestamp) == TriggerAction::Fire
            && !self.recorder.request_start(first_timestamp)
        {
            log::error!("Recorder unavailable, trigger at ts {} dropped", first_timestamp);
        }

        let budget = if self.sample_rate_hz > 0.0 {
            Duration::from_secs_f64(batch.num_samples() as f64 / self.sample_rate_hz)
        } else {
            Duration::ZERO
        };
        if let Some(slow) = self.stats.record_callback_latency(began.elapsed(), budget) {
            if slow == 1 || slow % 100 == 0 {
                log::warn!(
                    "Frame callback overran its {:?} budget ({} time(s)); delivery queue is backing up",
                    budget,
                    slow
                );
            }
        }
    }
}
