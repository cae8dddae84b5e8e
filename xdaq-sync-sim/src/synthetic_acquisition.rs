//! Synthetic acquisition device.
//!
//! Produces well-formed frames at the configured sample rate on a
//! producer thread and hands them to the registered callback on a
//! separate delivery thread, the way a USB driver decouples transfer
//! completion from user callbacks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use xdaq_sync_core::decoding::frame_decoder::{encode_frame, FrameLayout};
use xdaq_sync_core::models::config::StreamSelector;
use xdaq_sync_core::models::error::SyncError;
use xdaq_sync_core::traits::acquisition_source::{
    AcquisitionSource, FrameCallback, FrameDelivery, ReceiveScope,
};

/// Device parameters for [`SyntheticAcquisition`].
#[derive(Debug, Clone)]
pub struct SyntheticAcquisitionConfig {
    /// Streams the device reports as connected.
    pub available_streams: usize,
    /// Bytes per sample per stream.
    pub sample_size_bytes: usize,
    pub sample_rate_hz: f64,
    /// Samples per delivered buffer.
    pub block_samples: usize,
    /// Flush a truncated frame when stopped, like a hardware FIFO drain.
    pub trailing_partial_frame: bool,
    /// Report a device error every N blocks.
    pub error_every_blocks: Option<u64>,
}

impl Default for SyntheticAcquisitionConfig {
    fn default() -> Self {
        Self {
            available_streams: 4,
            sample_size_bytes: 32,
            sample_rate_hz: 30_000.0,
            block_samples: 256,
            trailing_partial_frame: false,
            error_every_blocks: None,
        }
    }
}

enum Delivery {
    Data(Vec<u8>),
    Error(String),
    Close,
}

/// In-process stand-in for the XDAQ acquisition device.
pub struct SyntheticAcquisition {
    config: SyntheticAcquisitionConfig,
    enabled_streams: usize,
    running: Arc<AtomicBool>,
    producer: Mutex<Option<thread::JoinHandle<()>>>,
    deliveries: Option<Sender<Delivery>>,
}

impl SyntheticAcquisition {
    pub fn new(config: SyntheticAcquisitionConfig) -> Self {
        Self {
            config,
            enabled_streams: 0,
            running: Arc::new(AtomicBool::new(false)),
            producer: Mutex::new(None),
            deliveries: None,
        }
    }

    pub fn config(&self) -> &SyntheticAcquisitionConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn layout(&self) -> Result<FrameLayout, SyncError> {
        FrameLayout::from_device(self.config.sample_size_bytes, self.enabled_streams)
    }
}

impl Default for SyntheticAcquisition {
    fn default() -> Self {
        Self::new(SyntheticAcquisitionConfig::default())
    }
}

impl AcquisitionSource for SyntheticAcquisition {
    fn enable_streams(&mut self, selector: &StreamSelector) -> Result<(), SyncError> {
        if self.is_running() {
            return Err(SyncError::InvalidState(
                "cannot change streams while acquiring".into(),
            ));
        }

        self.enabled_streams = match selector {
            StreamSelector::All => self.config.available_streams,
            StreamSelector::Streams(indices) => {
                let mut wanted = indices.clone();
                wanted.sort_unstable();
                wanted.dedup();
                if let Some(&bad) = wanted
                    .iter()
                    .find(|&&i| usize::from(i) >= self.config.available_streams)
                {
                    return Err(SyncError::DeviceError(format!(
                        "stream {} not connected ({} available)",
                        bad, self.config.available_streams
                    )));
                }
                wanted.len()
            }
        };
        log::debug!("Synthetic device: {} stream(s) enabled", self.enabled_streams);
        Ok(())
    }

    fn num_active_streams(&self) -> usize {
        self.enabled_streams
    }

    fn sample_size_bytes(&self) -> usize {
        self.config.sample_size_bytes
    }

    fn sample_rate_hz(&self) -> f64 {
        self.config.sample_rate_hz
    }

    fn start_receiving(&mut self, callback: FrameCallback) -> Result<ReceiveScope, SyncError> {
        if self.deliveries.is_some() {
            return Err(SyncError::InvalidState("a receiver is already registered".into()));
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name("synthetic-delivery".into())
            .spawn(move || delivery_loop(rx, callback))
            .map_err(|e| SyncError::AcquisitionInit(format!("failed to spawn delivery thread: {}", e)))?;

        self.deliveries = Some(tx.clone());
        Ok(ReceiveScope::new(move || {
            // Everything queued before Close is still delivered.
            let _ = tx.send(Delivery::Close);
            if handle.join().is_err() {
                log::error!("Synthetic delivery thread panicked");
            }
        }))
    }

    fn start(&mut self, continuous: bool) -> Result<(), SyncError> {
        if self.is_running() {
            return Err(SyncError::InvalidState("acquisition already running".into()));
        }
        let Some(deliveries) = self.deliveries.clone() else {
            return Err(SyncError::InvalidState("no receiver registered".into()));
        };
        let layout = self.layout()?;

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let config = self.config.clone();

        let handle = thread::Builder::new()
            .name("synthetic-acquisition".into())
            .spawn(move || {
                produce(&running, &config, layout, continuous, &deliveries);
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| SyncError::AcquisitionInit(format!("failed to spawn producer thread: {}", e)))?;

        *self.producer.lock() = Some(handle);
        log::info!(
            "Synthetic acquisition started: {} stream(s) at {} Hz",
            self.enabled_streams,
            self.config.sample_rate_hz
        );
        Ok(())
    }

    fn stop(&mut self, wait: bool) -> Result<(), SyncError> {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.producer.lock().take();
        // The open scope keeps its own sender; stopping frees the slot for
        // the next receiver.
        let deliveries = self.deliveries.take();
        let Some(handle) = handle else {
            return Ok(());
        };

        if !wait {
            return Ok(());
        }
        handle
            .join()
            .map_err(|_| SyncError::DeviceError("producer thread panicked".into()))?;

        if self.config.trailing_partial_frame {
            if let (Ok(layout), Some(deliveries)) = (self.layout(), deliveries.as_ref()) {
                let _ = deliveries.send(Delivery::Data(vec![0u8; layout.frame_size_bytes() / 2]));
            }
        }
        log::info!("Synthetic acquisition stopped");
        Ok(())
    }
}

fn delivery_loop(deliveries: Receiver<Delivery>, callback: FrameCallback) {
    for delivery in deliveries.iter() {
        match delivery {
            Delivery::Data(raw) => callback(FrameDelivery::Data(&raw)),
            Delivery::Error(message) => callback(FrameDelivery::Error(&message)),
            Delivery::Close => break,
        }
    }
}

/// Producer loop, paced against the wall clock so the average rate
/// matches `sample_rate_hz`.
fn produce(
    running: &AtomicBool,
    config: &SyntheticAcquisitionConfig,
    layout: FrameLayout,
    continuous: bool,
    deliveries: &Sender<Delivery>,
) {
    let block_period = Duration::from_secs_f64(config.block_samples as f64 / config.sample_rate_hz.max(1.0));
    let began = Instant::now();
    let mut timestamp: u32 = 0;
    let mut blocks: u64 = 0;

    while running.load(Ordering::SeqCst) {
        let mut block = Vec::with_capacity(layout.frame_size_bytes() * config.block_samples);
        for _ in 0..config.block_samples {
            encode_frame(&layout, timestamp, &mut block);
            timestamp = timestamp.wrapping_add(1);
        }
        if deliveries.send(Delivery::Data(block)).is_err() {
            break;
        }
        blocks += 1;

        if let Some(every) = config.error_every_blocks.filter(|&n| n > 0) {
            if blocks % every == 0 {
                let _ = deliveries.send(Delivery::Error(format!("simulated FIFO overflow at block {}", blocks)));
            }
        }

        if !continuous {
            break;
        }

        let next = began + block_period.saturating_mul(blocks.min(u32::MAX as u64) as u32);
        if let Some(wait) = next.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
    }
}
