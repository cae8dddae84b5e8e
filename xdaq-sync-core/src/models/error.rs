use thiserror::Error;

/// A raw acquisition buffer whose length is not a positive multiple of the
/// negotiated frame size.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid frame length {length} (frame size {frame_size_bytes} bytes)")]
pub struct InvalidFrame {
    pub length: usize,
    pub frame_size_bytes: usize,
}

/// Errors that can occur while orchestrating acquisition and recording.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("device error: {0}")]
    DeviceError(String),

    #[error("no cameras found")]
    NoCamerasFound,

    #[error("acquisition init failed: {0}")]
    AcquisitionInit(String),

    #[error("failed to start stream for camera {camera_id}: {reason}")]
    StreamStart { camera_id: String, reason: String },

    #[error("failed to stop stream for camera {camera_id}: {reason}")]
    StreamStop { camera_id: String, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration failed: {0}")]
    Configuration(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}
