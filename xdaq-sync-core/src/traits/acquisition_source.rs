use std::fmt;
use std::sync::Arc;

use crate::models::config::StreamSelector;
use crate::models::error::SyncError;

/// One delivery from the acquisition device.
#[derive(Debug, Clone, Copy)]
pub enum FrameDelivery<'a> {
    /// A raw buffer of one or more frames.
    Data(&'a [u8]),
    /// A hardware-reported error.
    Error(&'a str),
}

/// Callback invoked for every delivery.
///
/// Fires on the source's delivery thread. It must keep up with the
/// hardware data rate: no blocking I/O, no acquisition stop.
pub type FrameCallback = Arc<dyn Fn(FrameDelivery<'_>) + Send + Sync + 'static>;

/// Scoped registration of a [`FrameCallback`].
///
/// The callback may still run after [`AcquisitionSource::stop`] returns,
/// while buffered frames are flushed. It is guaranteed not to run after
/// the scope is closed or dropped.
pub struct ReceiveScope {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ReceiveScope {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Tear down delivery, waiting for any in-flight callback to return.
    pub fn close(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for ReceiveScope {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for ReceiveScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiveScope")
            .field("open", &self.release.is_some())
            .finish()
    }
}

/// Interface to the electrophysiology acquisition device.
///
/// Implemented by:
/// - `SyntheticAcquisition` (xdaq-sync-sim)
/// - Future: hardware XDAQ driver
pub trait AcquisitionSource: Send {
    /// Enable the data streams matching `selector`.
    fn enable_streams(&mut self, selector: &StreamSelector) -> Result<(), SyncError>;

    /// Number of streams currently enabled.
    fn num_active_streams(&self) -> usize;

    /// Bytes per sample per stream.
    fn sample_size_bytes(&self) -> usize;

    /// Device sample rate in Hz.
    fn sample_rate_hz(&self) -> f64;

    /// Register `callback` for deliveries until the returned scope closes.
    fn start_receiving(&mut self, callback: FrameCallback) -> Result<ReceiveScope, SyncError>;

    /// Start acquisition. `continuous = false` runs a single block.
    fn start(&mut self, continuous: bool) -> Result<(), SyncError>;

    /// Stop acquisition. With `wait`, return only once the hardware has
    /// ceased producing frames.
    fn stop(&mut self, wait: bool) -> Result<(), SyncError>;
}
