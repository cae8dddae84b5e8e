//! # xdaq-sync-sim
//!
//! Synthetic backends for xdaq-sync, usable without hardware.
//!
//! Provides:
//! - `SyntheticAcquisition`: frame producer implementing `AcquisitionSource`
//! - `SyntheticCameraService`: fake MJPEG recorder implementing `CameraClient`
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use xdaq_sync_core::{AcquisitionController, SyncConfiguration};
//! use xdaq_sync_sim::{SyntheticAcquisition, SyntheticCameraService};
//!
//! let cameras = Arc::new(SyntheticCameraService::with_rig(3, 2));
//! let mut controller =
//!     AcquisitionController::new(SyntheticAcquisition::default(), cameras, SyncConfiguration::default());
//! ```

pub mod synthetic_acquisition;
pub mod synthetic_cameras;

pub use synthetic_acquisition::{SyntheticAcquisition, SyntheticAcquisitionConfig};
pub use synthetic_cameras::SyntheticCameraService;
