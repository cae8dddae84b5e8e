use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::models::camera::{Camera, SkippedCamera};
use crate::models::error::SyncError;
use crate::models::report::{FileDiffReport, StreamStartError};
use crate::session::recording::RecordingSession;
use crate::traits::camera_client::CameraClient;
use crate::traits::run_observer::{RecordingStarted, RunObserver};

/// Commands accepted by the recorder worker, processed in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderCommand {
    Start { trigger_timestamp: u64 },
    Shutdown,
}

/// Settings for the take started by the worker.
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    pub output_directory: PathBuf,
    pub media_type: String,
    pub recording_duration: Option<Duration>,
    pub checksum_recordings: bool,
}

/// Everything the worker learned by the time it exits.
#[derive(Debug, Clone, Default)]
pub struct RecorderOutcome {
    pub trigger_timestamp: Option<u64>,
    pub skipped: Vec<SkippedCamera>,
    pub start_errors: Vec<StreamStartError>,
    pub report: Option<FileDiffReport>,
    pub failure: Option<SyncError>,
}

/// Non-blocking handle the frame callback uses to request a take.
#[derive(Debug, Clone)]
pub struct StartRequester {
    commands: Sender<RecorderCommand>,
}

impl StartRequester {
    /// Queue a start. Never blocks; returns `false` if the worker is gone.
    pub fn request_start(&self, trigger_timestamp: u64) -> bool {
        self.commands
            .try_send(RecorderCommand::Start { trigger_timestamp })
            .is_ok()
    }
}

/// Dedicated thread owning the recording session.
///
/// Camera start/stop may block on device I/O for seconds, so it never runs
/// on the frame-callback thread. Commands arrive over an unbounded channel;
/// the optional recording duration is enforced with `recv_deadline`.
pub struct RecorderWorker {
    commands: Sender<RecorderCommand>,
    handle: Option<thread::JoinHandle<RecorderOutcome>>,
}

impl RecorderWorker {
    pub fn spawn<C: CameraClient + 'static>(
        client: Arc<C>,
        cameras: Vec<Camera>,
        settings: RecorderSettings,
        observer: Option<Arc<dyn RunObserver>>,
    ) -> Result<Self, SyncError> {
        let (tx, rx) = crossbeam_channel::unbounded();

        let handle = thread::Builder::new()
            .name("xdaq-recorder".into())
            .spawn(move || recorder_loop(client, cameras, settings, observer, rx))
            .map_err(|e| SyncError::InvalidState(format!("failed to spawn recorder thread: {}", e)))?;

        Ok(Self {
            commands: tx,
            handle: Some(handle),
        })
    }

    pub fn requester(&self) -> StartRequester {
        StartRequester {
            commands: self.commands.clone(),
        }
    }

    /// Stop any active take, wait for the worker to exit, and collect its
    /// outcome. Commands queued before this call are processed first.
    pub fn shutdown(mut self) -> RecorderOutcome {
        self.join()
    }

    fn join(&mut self) -> RecorderOutcome {
        let Some(handle) = self.handle.take() else {
            return RecorderOutcome::default();
        };
        let _ = self.commands.send(RecorderCommand::Shutdown);
        match handle.join() {
            Ok(outcome) => outcome,
            Err(_) => {
                log::error!("Recorder worker panicked");
                RecorderOutcome {
                    failure: Some(SyncError::InvalidState("recorder worker panicked".into())),
                    ..Default::default()
                }
            }
        }
    }
}

impl Drop for RecorderWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.join();
        }
    }
}

fn recorder_loop<C: CameraClient>(
    client: Arc<C>,
    cameras: Vec<Camera>,
    settings: RecorderSettings,
    observer: Option<Arc<dyn RunObserver>>,
    commands: Receiver<RecorderCommand>,
) -> RecorderOutcome {
    let mut outcome = RecorderOutcome::default();
    let mut session: Option<RecordingSession<C>> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        let received = match deadline {
            Some(at) => commands.recv_deadline(at),
            None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(RecorderCommand::Start { trigger_timestamp }) => {
                if outcome.trigger_timestamp.is_some() {
                    log::warn!("Ignoring repeated start request at ts {}", trigger_timestamp);
                    continue;
                }
                outcome.trigger_timestamp = Some(trigger_timestamp);
                log::info!("Trigger fired at ts {}, starting cameras", trigger_timestamp);

                match RecordingSession::start(
                    Arc::clone(&client),
                    &cameras,
                    &settings.output_directory,
                    &settings.media_type,
                ) {
                    Ok(mut started) => {
                        started.set_checksum_recordings(settings.checksum_recordings);
                        outcome.skipped = started.skipped().to_vec();
                        outcome.start_errors = started.start_errors().to_vec();

                        if let Some(ref observer) = observer {
                            observer.on_recording_started(&RecordingStarted {
                                trigger_timestamp,
                                camera_ids: started.active_camera_ids(),
                            });
                        }
                        if started.is_active() {
                            deadline = settings.recording_duration.map(|d| Instant::now() + d);
                        }
                        session = Some(started);
                    }
                    Err(e) => {
                        log::error!("Failed to start recording session: {}", e);
                        outcome.failure = Some(e);
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                deadline = None;
                if let Some(mut active) = session.take() {
                    log::info!(
                        "Recording duration elapsed after {:.1}s, stopping cameras",
                        active.elapsed().as_secs_f64()
                    );
                    outcome.report = Some(active.stop());
                }
            }
            Ok(RecorderCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Some(mut active) = session.take() {
        log::info!("Stopping in-progress recording");
        outcome.report = Some(active.stop());
    }
    outcome
}
