//! # xdaq-sync-core
//!
//! Synchronizes an electrophysiology acquisition device with a set of
//! cameras: acquisition frames are decoded as they arrive, and once their
//! device timestamp satisfies a trigger policy every eligible camera starts
//! recording into a shared directory.
//!
//! Device and camera backends implement [`AcquisitionSource`] and
//! [`CameraClient`] and plug into the generic [`AcquisitionController`].
//!
//! ## Architecture
//!
//! ```text
//! xdaq-sync-core (this crate)
//! ├── traits/     ← AcquisitionSource, CameraClient, RunObserver
//! ├── models/     ← SyncError, RunState, SyncConfiguration, Camera, RunReport, FrameStats
//! ├── decoding/   ← FrameLayout, SampleBatch
//! ├── trigger/    ← TriggerPolicy, Trigger (fire-once latch)
//! ├── session/    ← AcquisitionController, RecorderWorker, RecordingSession, ShutdownCoordinator
//! └── storage/    ← directory snapshots, checksums, JSON run manifest
//! ```

pub mod decoding;
pub mod models;
pub mod session;
pub mod storage;
pub mod traits;
pub mod trigger;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types at crate root for convenience.
pub use decoding::frame_decoder::{decode, encode_frame, FrameLayout, SampleBatch, FRAME_MAGIC};
pub use models::camera::{Camera, Capability, SkippedCamera, StreamHandle, StreamToken, JPEG_MEDIA_TYPE};
pub use models::config::{StreamSelector, SyncConfiguration};
pub use models::diagnostics::{FrameStats, FrameStatsSnapshot};
pub use models::error::{InvalidFrame, SyncError};
pub use models::report::{FileDiffReport, RecordedFile, RunIssue, RunReport};
pub use models::state::{AtomicRunState, RunState, StopReason};
pub use session::controller::{discover_cameras, AcquisitionController, RunControl};
pub use session::recording::RecordingSession;
pub use storage::manifest::{read_manifest, write_manifest};
pub use traits::acquisition_source::{AcquisitionSource, FrameCallback, FrameDelivery, ReceiveScope};
pub use traits::camera_client::CameraClient;
pub use traits::run_observer::{RecordingStarted, RunObserver};
pub use trigger::policy::{Trigger, TriggerAction, TriggerPolicy, TriggerState};
