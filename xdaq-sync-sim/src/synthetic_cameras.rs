//! Synthetic camera streaming service.
//!
//! Every started stream gets a writer thread appending fake MJPEG frames
//! to a new file in the requested output directory until stopped.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use xdaq_sync_core::models::camera::{Camera, Capability, StreamToken, JPEG_MEDIA_TYPE};
use xdaq_sync_core::models::error::SyncError;
use xdaq_sync_core::traits::camera_client::CameraClient;

const RAW_MEDIA_TYPE: &str = "video/x-raw";
const DEFAULT_FPS: u32 = 30;

/// Minimal JPEG: SOI, a comment segment carrying the frame number, EOI.
fn fake_jpeg(frame: u64) -> Vec<u8> {
    let comment = format!("synthetic frame {}", frame);
    let mut out = Vec::with_capacity(comment.len() + 8);
    out.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xFE]);
    out.extend_from_slice(&((comment.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(comment.as_bytes());
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

struct ActiveStream {
    path: PathBuf,
    running: Arc<AtomicBool>,
    writer: thread::JoinHandle<io::Result<u64>>,
}

/// In-process stand-in for the camera streaming service.
pub struct SyntheticCameraService {
    cameras: Vec<Camera>,
    active: Mutex<HashMap<String, ActiveStream>>,
    next_token: AtomicU64,
}

impl SyntheticCameraService {
    pub fn new(cameras: Vec<Camera>) -> Self {
        Self {
            cameras,
            active: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// `total` cameras `cam0..`, of which the first `jpeg_capable` offer
    /// MJPEG. The rest only offer raw video.
    pub fn with_rig(total: usize, jpeg_capable: usize) -> Self {
        let cameras = (0..total)
            .map(|i| {
                let mut capabilities = vec![Capability::new(RAW_MEDIA_TYPE).with_resolution(640, 480, 60)];
                if i < jpeg_capable {
                    capabilities.push(Capability::new(JPEG_MEDIA_TYPE).with_resolution(1280, 720, DEFAULT_FPS));
                }
                Camera {
                    id: format!("cam{}", i),
                    name: format!("Synthetic camera {}", i),
                    capabilities,
                }
            })
            .collect();
        Self::new(cameras)
    }

    pub fn active_streams(&self) -> usize {
        self.active.lock().len()
    }

    /// Path of the file `camera_id` is currently recording into.
    pub fn recording_path(&self, camera_id: &str) -> Option<PathBuf> {
        self.active.lock().get(camera_id).map(|s| s.path.clone())
    }
}

/// Create `{camera_id}_{n}.mjpeg` with the first free `n`.
fn create_recording_file(output_dir: &Path, camera_id: &str) -> io::Result<(PathBuf, File)> {
    fs::create_dir_all(output_dir)?;
    for n in 0u32.. {
        let path = output_dir.join(format!("{}_{:04}.mjpeg", camera_id, n));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(io::ErrorKind::AlreadyExists, "no free recording file name"))
}

fn write_frames(file: File, fps: u32, running: &AtomicBool) -> io::Result<u64> {
    let mut out = BufWriter::new(file);
    let period = Duration::from_secs(1) / fps.max(1);
    let mut frames = 0u64;
    loop {
        out.write_all(&fake_jpeg(frames))?;
        frames += 1;
        if !running.load(Ordering::SeqCst) {
            break;
        }
        thread::sleep(period);
    }
    out.flush()?;
    Ok(frames)
}

impl CameraClient for SyntheticCameraService {
    fn list_cameras(&self) -> Result<Vec<Camera>, SyncError> {
        Ok(self.cameras.clone())
    }

    fn start_stream_with_recording(
        &self,
        camera: &Camera,
        capability: &Capability,
        output_dir: &Path,
    ) -> Result<StreamToken, SyncError> {
        let start_error = |reason: String| SyncError::StreamStart {
            camera_id: camera.id.clone(),
            reason,
        };

        if !self.cameras.iter().any(|c| c.id == camera.id) {
            return Err(start_error("unknown camera".into()));
        }
        if capability.media_type != JPEG_MEDIA_TYPE {
            return Err(start_error(format!("cannot record {}", capability.media_type)));
        }

        let mut active = self.active.lock();
        if active.contains_key(&camera.id) {
            return Err(start_error("already streaming".into()));
        }

        let (path, file) = create_recording_file(output_dir, &camera.id).map_err(|e| start_error(e.to_string()))?;
        let running = Arc::new(AtomicBool::new(true));
        let fps = capability.fps.unwrap_or(DEFAULT_FPS);
        let writer = {
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name(format!("camera-{}", camera.id))
                .spawn(move || write_frames(file, fps, &running))
                .map_err(|e| start_error(format!("failed to spawn writer: {}", e)))?
        };

        log::debug!("Camera {} recording to {}", camera.id, path.display());
        active.insert(
            camera.id.clone(),
            ActiveStream {
                path,
                running,
                writer,
            },
        );

        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        Ok(StreamToken(format!("{}#{}", camera.id, token)))
    }

    fn stop_stream(&self, camera_id: &str) -> Result<(), SyncError> {
        let stop_error = |reason: String| SyncError::StreamStop {
            camera_id: camera_id.to_string(),
            reason,
        };

        let stream = self
            .active
            .lock()
            .remove(camera_id)
            .ok_or_else(|| stop_error("not streaming".into()))?;

        stream.running.store(false, Ordering::SeqCst);
        let frames = stream
            .writer
            .join()
            .map_err(|_| stop_error("writer thread panicked".into()))?
            .map_err(|e| stop_error(e.to_string()))?;
        log::debug!("Camera {} wrote {} frame(s)", camera_id, frames);
        Ok(())
    }
}

impl Drop for SyntheticCameraService {
    fn drop(&mut self) {
        for (camera_id, stream) in self.active.lock().drain() {
            log::warn!("Camera {} still streaming at shutdown", camera_id);
            stream.running.store(false, Ordering::SeqCst);
            let _ = stream.writer.join();
        }
    }
}
