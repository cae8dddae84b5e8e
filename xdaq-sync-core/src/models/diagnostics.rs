use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Counters updated from the frame callback.
///
/// All fields are independent relaxed atomics; a snapshot is not a
/// consistent cut across counters, which is fine for progress display.
#[derive(Debug, Default)]
pub struct FrameStats {
    frames: AtomicU64,
    bytes: AtomicU64,
    samples: AtomicU64,
    invalid_frames: AtomicU64,
    dropped_after_stop: AtomicU64,
    device_errors: AtomicU64,
    slow_callbacks: AtomicU64,
    max_callback_micros: AtomicU64,
    last_timestamp: AtomicU64,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&self, bytes: usize, samples: usize, first_timestamp: u64) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.samples.fetch_add(samples as u64, Ordering::Relaxed);
        self.last_timestamp.store(first_timestamp, Ordering::Relaxed);
    }

    /// Returns the new invalid-frame count.
    pub fn record_invalid(&self) -> u64 {
        self.invalid_frames.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_dropped_after_stop(&self) {
        self.dropped_after_stop.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the new device-error count.
    pub fn record_device_error(&self) -> u64 {
        self.device_errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Records how long one callback took against its real-time budget.
    /// Returns the new slow-callback count if this one overran.
    pub fn record_callback_latency(&self, elapsed: Duration, budget: Duration) -> Option<u64> {
        let micros = elapsed.as_micros().min(u64::MAX as u128) as u64;
        self.max_callback_micros.fetch_max(micros, Ordering::Relaxed);
        if !budget.is_zero() && elapsed > budget {
            Some(self.slow_callbacks.fetch_add(1, Ordering::Relaxed) + 1)
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> FrameStatsSnapshot {
        FrameStatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            invalid_frames: self.invalid_frames.load(Ordering::Relaxed),
            dropped_after_stop: self.dropped_after_stop.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            slow_callbacks: self.slow_callbacks.load(Ordering::Relaxed),
            max_callback_micros: self.max_callback_micros.load(Ordering::Relaxed),
            last_timestamp: self.last_timestamp.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`FrameStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStatsSnapshot {
    pub frames: u64,
    pub bytes: u64,
    pub samples: u64,
    pub invalid_frames: u64,
    pub dropped_after_stop: u64,
    pub device_errors: u64,
    pub slow_callbacks: u64,
    pub max_callback_micros: u64,
    pub last_timestamp: u64,
}
