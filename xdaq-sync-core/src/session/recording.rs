use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::camera::{Camera, SkippedCamera, StreamHandle};
use crate::models::error::SyncError;
use crate::models::report::{FileDiffReport, StreamStartError, StreamStopError};
use crate::storage::checksum;
use crate::storage::snapshot::DirectorySnapshot;
use crate::traits::camera_client::CameraClient;

/// One take: a set of camera streams recording into a shared directory.
///
/// ```text
/// start: snapshot dir → start eligible streams
/// stop:  stop every stream (best effort) → diff dir against snapshot
/// ```
///
/// `start` returns as soon as the collaborator has accepted every stream;
/// files may still be empty. Callers wanting a fixed-length take wait
/// before calling `stop`.
pub struct RecordingSession<C: CameraClient + ?Sized> {
    client: Arc<C>,
    output_directory: PathBuf,
    snapshot: DirectorySnapshot,
    handles: Vec<StreamHandle>,
    skipped: Vec<SkippedCamera>,
    start_errors: Vec<StreamStartError>,
    checksum_recordings: bool,
    started_at: Instant,
}

impl<C: CameraClient + ?Sized> RecordingSession<C> {
    /// Snapshot `output_dir`, then start a recording stream for every
    /// camera offering `media_type`.
    ///
    /// Fails only if the snapshot cannot be taken, in which case nothing
    /// has been started. Cameras without the capability are skipped and
    /// per-camera start failures are collected; neither aborts the take.
    pub fn start(
        client: Arc<C>,
        cameras: &[Camera],
        output_dir: &Path,
        media_type: &str,
    ) -> Result<Self, SyncError> {
        let snapshot = DirectorySnapshot::capture(output_dir)?;
        log::debug!(
            "Snapshot of {} holds {} entries",
            output_dir.display(),
            snapshot.len()
        );

        let mut handles: Vec<StreamHandle> = Vec::new();
        let mut skipped = Vec::new();
        let mut start_errors = Vec::new();
        let mut seen_ids = HashSet::new();

        for camera in cameras {
            if !seen_ids.insert(camera.id.as_str()) {
                log::warn!("Camera {} listed twice, skipping duplicate", camera.id);
                skipped.push(SkippedCamera {
                    camera_id: camera.id.clone(),
                    reason: "duplicate camera id".into(),
                });
                continue;
            }

            let Some(capability) = camera.find_capability(media_type) else {
                log::info!("No {} capability for {}, skipping", media_type, camera.id);
                skipped.push(SkippedCamera {
                    camera_id: camera.id.clone(),
                    reason: format!("no {} capability", media_type),
                });
                continue;
            };

            match client.start_stream_with_recording(camera, capability, output_dir) {
                Ok(token) => {
                    log::debug!("Started stream {:?} for {} ({})", token, camera.id, camera.name);
                    handles.push(StreamHandle {
                        camera: camera.clone(),
                        capability: capability.clone(),
                        token,
                        started_at: Instant::now(),
                    });
                }
                Err(e) => {
                    log::error!("Failed to start stream for {}: {}", camera.id, e);
                    start_errors.push(StreamStartError {
                        camera_id: camera.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        log::info!(
            "Recording session started: {} stream(s), {} skipped, {} failed",
            handles.len(),
            skipped.len(),
            start_errors.len()
        );

        Ok(Self {
            client,
            output_directory: output_dir.to_path_buf(),
            snapshot,
            handles,
            skipped,
            start_errors,
            checksum_recordings: false,
            started_at: Instant::now(),
        })
    }

    /// Hash every recorded file when the session stops.
    pub fn set_checksum_recordings(&mut self, enabled: bool) {
        self.checksum_recordings = enabled;
    }

    pub fn active_streams(&self) -> &[StreamHandle] {
        &self.handles
    }

    pub fn active_camera_ids(&self) -> Vec<String> {
        self.handles.iter().map(|h| h.camera.id.clone()).collect()
    }

    pub fn skipped(&self) -> &[SkippedCamera] {
        &self.skipped
    }

    pub fn start_errors(&self) -> &[StreamStartError] {
        &self.start_errors
    }

    pub fn is_active(&self) -> bool {
        !self.handles.is_empty()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stop every active stream and report the files created since start.
    ///
    /// A camera that fails to stop is logged and reported; the remaining
    /// cameras are still stopped. With no active streams (including a
    /// second call) the report is empty.
    pub fn stop(&mut self) -> FileDiffReport {
        if self.handles.is_empty() {
            return FileDiffReport::empty(self.output_directory.clone());
        }

        let mut stopped_cameras = Vec::new();
        let mut stop_errors = Vec::new();

        for handle in self.handles.drain(..) {
            let camera_id = handle.camera.id;
            match self.client.stop_stream(&camera_id) {
                Ok(()) => {
                    log::info!(
                        "Stopped stream for {} after {:.1}s",
                        camera_id,
                        handle.started_at.elapsed().as_secs_f64()
                    );
                    stopped_cameras.push(camera_id);
                }
                Err(e) => {
                    log::warn!("Error stopping stream for {}: {}", camera_id, e);
                    stop_errors.push(StreamStopError {
                        camera_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let files = match self.snapshot.new_files() {
            Ok(paths) => paths
                .iter()
                .map(|path| checksum::describe_file(path, self.checksum_recordings))
                .collect(),
            Err(e) => {
                log::error!("Failed to list recordings: {}", e);
                Vec::new()
            }
        };

        FileDiffReport {
            output_directory: self.output_directory.clone(),
            files,
            stopped_cameras,
            stop_errors,
        }
    }
}

impl<C: CameraClient + ?Sized> Drop for RecordingSession<C> {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            log::warn!(
                "Recording session dropped with {} active stream(s), stopping",
                self.handles.len()
            );
            self.stop();
        }
    }
}
