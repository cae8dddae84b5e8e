use std::path::Path;

use crate::models::camera::{Camera, Capability, StreamToken};
use crate::models::error::SyncError;

/// Interface to the camera streaming service.
///
/// Calls may block on device or network I/O; the core only invokes them
/// from the recorder worker thread, never from the frame callback.
pub trait CameraClient: Send + Sync {
    /// Enumerate connected cameras and their capabilities.
    fn list_cameras(&self) -> Result<Vec<Camera>, SyncError>;

    /// Start streaming `camera` with `capability`, recording into
    /// `output_dir`. File names are chosen by the service.
    fn start_stream_with_recording(
        &self,
        camera: &Camera,
        capability: &Capability,
        output_dir: &Path,
    ) -> Result<StreamToken, SyncError>;

    /// Stop the stream of `camera_id` and finalize its file.
    fn stop_stream(&self, camera_id: &str) -> Result<(), SyncError>;
}
