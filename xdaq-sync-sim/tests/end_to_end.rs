use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use xdaq_sync_core::{
    discover_cameras, read_manifest, write_manifest, AcquisitionController, FrameStatsSnapshot,
    RecordingStarted, RunIssue, RunObserver, RunReport, RunState, StopReason, SyncConfiguration,
    SyncError, TriggerPolicy,
};
use xdaq_sync_sim::{SyntheticAcquisition, SyntheticAcquisitionConfig, SyntheticCameraService};

#[derive(Default)]
struct EventLog {
    states: Mutex<Vec<RunState>>,
    recordings: Mutex<Vec<RecordingStarted>>,
    stop_requested_at: Mutex<Option<Instant>>,
}

impl RunObserver for EventLog {
    fn on_state_changed(&self, state: RunState) {
        if state == RunState::StopRequested {
            *self.stop_requested_at.lock() = Some(Instant::now());
        }
        self.states.lock().push(state);
    }

    fn on_progress(&self, _stats: &FrameStatsSnapshot) {}

    fn on_recording_started(&self, started: &RecordingStarted) {
        self.recordings.lock().push(started.clone());
    }

    fn on_issue(&self, _issue: &RunIssue) {}

    fn on_run_finished(&self, _report: &RunReport) {}
}

fn config(dir: &Path) -> SyncConfiguration {
    SyncConfiguration {
        output_directory: dir.to_path_buf(),
        poll_interval: Duration::from_millis(20),
        ..Default::default()
    }
}

fn controller(
    acquisition: SyntheticAcquisitionConfig,
    cameras: &Arc<SyntheticCameraService>,
    dir: &Path,
) -> (AcquisitionController<SyntheticAcquisition, SyntheticCameraService>, Arc<EventLog>) {
    let events = Arc::new(EventLog::default());
    let mut controller =
        AcquisitionController::new(SyntheticAcquisition::new(acquisition), Arc::clone(cameras), config(dir));
    controller.set_observer(events.clone());
    (controller, events)
}

#[test]
fn records_only_jpeg_cameras_and_only_new_files() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("cam0_0000.mjpeg"), b"yesterday").unwrap();
    fs::write(tmp.path().join("session.log"), b"notes").unwrap();

    let service = Arc::new(SyntheticCameraService::with_rig(3, 2));
    let cameras = discover_cameras(service.as_ref()).unwrap();
    let (mut controller, events) = controller(SyntheticAcquisitionConfig::default(), &service, tmp.path());

    let report = controller
        .run(Duration::from_millis(400), TriggerPolicy::Immediate, cameras)
        .unwrap();

    assert_eq!(report.stop_reason, Some(StopReason::DeadlineElapsed));
    assert_eq!(report.trigger_timestamp, Some(0));
    assert_eq!(report.skipped_cameras.len(), 1);
    assert_eq!(report.skipped_cameras[0].camera_id, "cam2");

    let mut names: Vec<String> = report
        .recorded_paths()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["cam0_0001.mjpeg", "cam1_0000.mjpeg"]);
    assert!(report.recorded_files.iter().all(|f| f.size_bytes > 0));

    let recordings = events.recordings.lock();
    assert_eq!(recordings.len(), 1);
    assert_eq!(recordings[0].camera_ids, vec!["cam0", "cam1"]);
    assert_eq!(service.active_streams(), 0);
}

#[test]
fn state_moves_forward_once_and_late_frames_never_record() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(SyntheticCameraService::with_rig(2, 2));
    let cameras = discover_cameras(service.as_ref()).unwrap();
    let acquisition = SyntheticAcquisitionConfig {
        trailing_partial_frame: true,
        ..Default::default()
    };
    let (mut controller, events) = controller(acquisition, &service, tmp.path());

    // Far beyond anything reached in 300ms at 30 kHz.
    let report = controller
        .run(Duration::from_millis(300), TriggerPolicy::Threshold(1 << 30), cameras)
        .unwrap();

    assert_eq!(
        *events.states.lock(),
        vec![RunState::Running, RunState::StopRequested, RunState::Stopped]
    );
    assert_eq!(report.final_state, RunState::Stopped);
    assert!(!report.recording_triggered());
    assert!(report.recorded_files.is_empty());
    assert!(events.recordings.lock().is_empty());
    // The truncated flush lands either before or after the run is marked stopped.
    assert!(report.stats.invalid_frames <= 1);
    assert!(report.stats.invalid_frames + report.stats.dropped_after_stop >= 1);
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn threshold_trigger_starts_recording_mid_run() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(SyntheticCameraService::with_rig(2, 1));
    let cameras = discover_cameras(service.as_ref()).unwrap();
    let (mut controller, _) = controller(SyntheticAcquisitionConfig::default(), &service, tmp.path());

    let report = controller
        .run(Duration::from_millis(500), TriggerPolicy::Threshold(3_000), cameras)
        .unwrap();

    let fired_at = report.trigger_timestamp.unwrap();
    assert!(fired_at >= 3_000);
    assert!(fired_at < 3_000 + 256, "fired on first crossing block: {}", fired_at);
    assert_eq!(report.recorded_files.len(), 1);
}

#[test]
fn cancellation_during_long_run_still_finalizes_recording() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(SyntheticCameraService::with_rig(3, 2));
    let cameras = discover_cameras(service.as_ref()).unwrap();
    let (mut controller, events) = controller(SyntheticAcquisitionConfig::default(), &service, tmp.path());
    let control = controller.run_control();

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        let cancelled_at = Instant::now();
        control.cancel();
        cancelled_at
    });

    let report = controller
        .run(Duration::from_secs(30), TriggerPolicy::Immediate, cameras)
        .unwrap();
    let returned_at = Instant::now();
    let cancelled_at = canceller.join().unwrap();

    let noticed = events
        .stop_requested_at
        .lock()
        .unwrap()
        .duration_since(cancelled_at);
    assert!(noticed < Duration::from_millis(200), "stop noticed after {:?}", noticed);
    assert!(returned_at.duration_since(cancelled_at) < Duration::from_secs(2));
    assert_eq!(report.stop_reason, Some(StopReason::Cancelled));
    assert_eq!(report.recorded_files.len(), 2);
    assert!(report.recorded_files.iter().all(|f| f.size_bytes > 0));
    assert_eq!(service.active_streams(), 0);
}

#[test]
fn manifest_round_trips_a_real_run() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("recordings");
    let service = Arc::new(SyntheticCameraService::with_rig(1, 1));
    let cameras = discover_cameras(service.as_ref()).unwrap();
    let mut controller = AcquisitionController::new(
        SyntheticAcquisition::default(),
        Arc::clone(&service),
        SyncConfiguration {
            checksum_recordings: true,
            recording_duration: Some(Duration::from_millis(100)),
            ..config(&dir)
        },
    );

    let report = controller
        .run(Duration::from_millis(300), TriggerPolicy::Immediate, cameras)
        .unwrap();
    assert_eq!(report.recorded_files.len(), 1);
    assert!(report.recorded_files[0].sha256.is_some());

    let manifest = tmp.path().join("manifest.json");
    write_manifest(&report, &manifest).unwrap();
    let restored = read_manifest(&manifest).unwrap();
    assert_eq!(restored.run_id, report.run_id);
    assert_eq!(restored.recorded_files, report.recorded_files);
    assert_eq!(restored.trigger, TriggerPolicy::Immediate);
    assert_eq!(restored.final_state, RunState::Stopped);
}

#[test]
fn no_cameras_exits_before_acquisition() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(SyntheticCameraService::with_rig(0, 0));
    assert_eq!(discover_cameras(service.as_ref()).unwrap_err(), SyncError::NoCamerasFound);

    let (mut controller, events) = controller(SyntheticAcquisitionConfig::default(), &service, tmp.path());
    let err = controller
        .run(Duration::from_secs(1), TriggerPolicy::Immediate, Vec::new())
        .unwrap_err();
    assert_eq!(err, SyncError::NoCamerasFound);
    assert!(events.states.lock().is_empty());
    assert!(!controller.source().is_running());
}
