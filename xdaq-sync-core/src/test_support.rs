//! In-process fakes shared by the unit tests.
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::decoding::frame_decoder::{encode_frame, FrameLayout};
use crate::models::camera::{Camera, Capability, StreamToken};
use crate::models::config::StreamSelector;
use crate::models::diagnostics::FrameStatsSnapshot;
use crate::models::error::SyncError;
use crate::models::report::{RunIssue, RunReport};
use crate::models::state::RunState;
use crate::traits::acquisition_source::{AcquisitionSource, FrameCallback, FrameDelivery, ReceiveScope};
use crate::traits::camera_client::CameraClient;
use crate::traits::run_observer::{RecordingStarted, RunObserver};

pub fn camera(id: &str, media_types: &[&str]) -> Camera {
    Camera {
        id: id.into(),
        name: format!("Camera {}", id),
        capabilities: media_types.iter().map(|&m| Capability::new(m)).collect(),
    }
}

/// Camera service fake that writes one file per started stream.
#[derive(Default)]
pub struct MockCameraClient {
    cameras: Vec<Camera>,
    fail_start: HashSet<String>,
    fail_stop: HashSet<String>,
    start_delay: Option<Duration>,
    started: Mutex<Vec<String>>,
    stop_calls: Mutex<Vec<String>>,
    streams_opened: AtomicUsize,
}

impl MockCameraClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cameras(mut self, cameras: Vec<Camera>) -> Self {
        self.cameras = cameras;
        self
    }

    pub fn fail_start(mut self, camera_id: &str) -> Self {
        self.fail_start.insert(camera_id.into());
        self
    }

    pub fn fail_stop(mut self, camera_id: &str) -> Self {
        self.fail_stop.insert(camera_id.into());
        self
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = Some(delay);
        self
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn stop_calls(&self) -> Vec<String> {
        self.stop_calls.lock().clone()
    }
}

impl CameraClient for MockCameraClient {
    fn list_cameras(&self) -> Result<Vec<Camera>, SyncError> {
        Ok(self.cameras.clone())
    }

    fn start_stream_with_recording(
        &self,
        camera: &Camera,
        _capability: &Capability,
        output_dir: &Path,
    ) -> Result<StreamToken, SyncError> {
        if let Some(delay) = self.start_delay {
            thread::sleep(delay);
        }
        if self.fail_start.contains(&camera.id) {
            return Err(SyncError::StreamStart {
                camera_id: camera.id.clone(),
                reason: "device busy".into(),
            });
        }

        let n = self.streams_opened.fetch_add(1, Ordering::SeqCst);
        let storage = |e: std::io::Error| SyncError::Storage(e.to_string());
        fs::create_dir_all(output_dir).map_err(storage)?;
        fs::write(output_dir.join(format!("{}_{}.mjpeg", camera.id, n)), [0xFF, 0xD8, 0xFF, 0xD9])
            .map_err(storage)?;

        self.started.lock().push(camera.id.clone());
        Ok(StreamToken(format!("stream-{}", n)))
    }

    fn stop_stream(&self, camera_id: &str) -> Result<(), SyncError> {
        self.stop_calls.lock().push(camera_id.into());
        if self.fail_stop.contains(camera_id) {
            return Err(SyncError::StreamStop {
                camera_id: camera_id.into(),
                reason: "pipeline hung".into(),
            });
        }
        Ok(())
    }
}

/// A delivery injected by a test.
#[derive(Debug, Clone)]
pub enum Scripted {
    Data(Vec<u8>),
    Error(String),
}

impl From<Vec<u8>> for Scripted {
    fn from(raw: Vec<u8>) -> Self {
        Self::Data(raw)
    }
}

impl From<&str> for Scripted {
    fn from(message: &str) -> Self {
        Self::Error(message.into())
    }
}

fn deliver(callback: &FrameCallback, item: &Scripted) {
    match item {
        Scripted::Data(raw) => callback(FrameDelivery::Data(raw)),
        Scripted::Error(message) => callback(FrameDelivery::Error(message)),
    }
}

/// Acquisition fake: a producer thread emits well-formed blocks with
/// consecutive timestamps until stopped.
///
/// `scripted` is delivered before the first block, `after_stop` while
/// `stop` is flushing and `on_release` while the receive scope closes.
pub struct MockAcquisition {
    pub streams: usize,
    pub sample_size_bytes: usize,
    pub sample_rate_hz: f64,
    pub samples_per_block: usize,
    pub block_interval: Duration,
    pub scripted: Vec<Scripted>,
    pub after_stop: Vec<Scripted>,
    pub on_release: Vec<Scripted>,
    pub fail_start: bool,
    pub fail_stop: bool,
    events: Arc<Mutex<Vec<String>>>,
    stopped_at: Option<Instant>,
    callback: Arc<Mutex<Option<FrameCallback>>>,
    running: Arc<AtomicBool>,
    producer: Option<thread::JoinHandle<()>>,
}

impl MockAcquisition {
    pub fn new() -> Self {
        Self {
            streams: 2,
            sample_size_bytes: 32,
            sample_rate_hz: 30_000.0,
            samples_per_block: 128,
            block_interval: Duration::from_millis(10),
            scripted: Vec::new(),
            after_stop: Vec::new(),
            on_release: Vec::new(),
            fail_start: false,
            fail_stop: false,
            events: Arc::new(Mutex::new(Vec::new())),
            stopped_at: None,
            callback: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            producer: None,
        }
    }

    /// One well-formed block whose first timestamp is `first_timestamp`.
    pub fn block(&self, first_timestamp: u32) -> Vec<u8> {
        let mut out = Vec::new();
        if let Ok(layout) = FrameLayout::from_device(self.sample_size_bytes, self.streams) {
            for i in 0..self.samples_per_block {
                encode_frame(&layout, first_timestamp.wrapping_add(i as u32), &mut out);
            }
        }
        out
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// When `stop` was first called.
    pub fn stopped_at(&self) -> Option<Instant> {
        self.stopped_at
    }

    fn current_callback(&self) -> Option<FrameCallback> {
        self.callback.lock().clone()
    }
}

impl AcquisitionSource for MockAcquisition {
    fn enable_streams(&mut self, _selector: &StreamSelector) -> Result<(), SyncError> {
        self.events.lock().push("enable".into());
        Ok(())
    }

    fn num_active_streams(&self) -> usize {
        self.streams
    }

    fn sample_size_bytes(&self) -> usize {
        self.sample_size_bytes
    }

    fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    fn start_receiving(&mut self, callback: FrameCallback) -> Result<ReceiveScope, SyncError> {
        self.events.lock().push("receive".into());
        *self.callback.lock() = Some(callback);

        let slot = Arc::clone(&self.callback);
        let events = Arc::clone(&self.events);
        let on_release = std::mem::take(&mut self.on_release);
        Ok(ReceiveScope::new(move || {
            let callback = slot.lock().take();
            if let Some(callback) = callback {
                for item in &on_release {
                    deliver(&callback, item);
                }
            }
            events.lock().push("release".into());
        }))
    }

    fn start(&mut self, _continuous: bool) -> Result<(), SyncError> {
        self.events.lock().push("start".into());
        if self.fail_start {
            return Err(SyncError::DeviceError("FPGA not configured".into()));
        }
        let Some(callback) = self.current_callback() else {
            return Err(SyncError::InvalidState("no callback registered".into()));
        };

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let scripted = std::mem::take(&mut self.scripted);
        let template = self.block(0);
        let block_len = self.samples_per_block as u32;
        let frame_size = self.sample_size_bytes * self.streams;
        let interval = self.block_interval;

        self.producer = Some(thread::spawn(move || {
            for item in &scripted {
                deliver(&callback, item);
            }
            let mut block = template;
            let mut first_timestamp = 0u32;
            while running.load(Ordering::SeqCst) {
                callback(FrameDelivery::Data(&block));
                first_timestamp = first_timestamp.wrapping_add(block_len);
                for (i, frame) in block.chunks_exact_mut(frame_size.max(1)).enumerate() {
                    frame[8..12].copy_from_slice(&first_timestamp.wrapping_add(i as u32).to_le_bytes());
                }
                thread::sleep(interval);
            }
        }));
        Ok(())
    }

    fn stop(&mut self, _wait: bool) -> Result<(), SyncError> {
        self.events.lock().push("stop".into());
        self.stopped_at.get_or_insert_with(Instant::now);
        self.running.store(false, Ordering::SeqCst);
        if let Some(producer) = self.producer.take() {
            let _ = producer.join();
        }
        if let Some(callback) = self.current_callback() {
            for item in std::mem::take(&mut self.after_stop) {
                deliver(&callback, &item);
            }
        }
        if self.fail_stop {
            return Err(SyncError::DeviceError("stop timed out".into()));
        }
        Ok(())
    }
}

/// Observer that records every event.
#[derive(Default)]
pub struct RecordingObserver {
    states: Mutex<Vec<(RunState, Instant)>>,
    issues: Mutex<Vec<RunIssue>>,
    progress_ticks: AtomicUsize,
    recordings_started: AtomicUsize,
    finished_reports: AtomicUsize,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<RunState> {
        self.states.lock().iter().map(|&(state, _)| state).collect()
    }

    pub fn state_changed_at(&self, state: RunState) -> Option<Instant> {
        self.states
            .lock()
            .iter()
            .find(|&&(s, _)| s == state)
            .map(|&(_, at)| at)
    }

    pub fn issues(&self) -> Vec<RunIssue> {
        self.issues.lock().clone()
    }

    pub fn progress_ticks(&self) -> usize {
        self.progress_ticks.load(Ordering::SeqCst)
    }

    pub fn recordings_started(&self) -> usize {
        self.recordings_started.load(Ordering::SeqCst)
    }

    pub fn finished_reports(&self) -> usize {
        self.finished_reports.load(Ordering::SeqCst)
    }
}

impl RunObserver for RecordingObserver {
    fn on_state_changed(&self, state: RunState) {
        self.states.lock().push((state, Instant::now()));
    }

    fn on_progress(&self, _stats: &FrameStatsSnapshot) {
        self.progress_ticks.fetch_add(1, Ordering::SeqCst);
    }

    fn on_recording_started(&self, _started: &RecordingStarted) {
        self.recordings_started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_issue(&self, issue: &RunIssue) {
        self.issues.lock().push(issue.clone());
    }

    fn on_run_finished(&self, _report: &RunReport) {
        self.finished_reports.fetch_add(1, Ordering::SeqCst);
    }
}
