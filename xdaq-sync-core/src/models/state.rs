use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Process-wide run state.
///
/// State transitions:
/// ```text
/// running → stop_requested → stopped
/// ```
/// No state is ever revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RunState {
    Running = 0,
    StopRequested = 1,
    Stopped = 2,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::StopRequested,
            _ => Self::Stopped,
        }
    }
}

/// Why the run left `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum StopReason {
    Cancelled = 1,
    DeadlineElapsed = 2,
    DeviceError = 3,
    StartFailed = 4,
}

impl StopReason {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Cancelled),
            2 => Some(Self::DeadlineElapsed),
            3 => Some(Self::DeviceError),
            4 => Some(Self::StartFailed),
            _ => None,
        }
    }
}

/// Lock-free holder for [`RunState`], shared between the poll loop, the
/// frame callback and the cancellation handler.
///
/// The state lives in the low two bits and the [`StopReason`] above them,
/// so a reader that observes `StopRequested` always observes its reason.
/// Every transition is a single compare-exchange, so it is safe to drive
/// from a signal handler.
#[derive(Debug)]
pub struct AtomicRunState {
    packed: AtomicU8,
}

const STATE_MASK: u8 = 0b11;
const REASON_SHIFT: u32 = 2;

impl AtomicRunState {
    pub fn new() -> Self {
        Self {
            packed: AtomicU8::new(RunState::Running as u8),
        }
    }

    pub fn load(&self) -> RunState {
        RunState::from_u8(self.packed.load(Ordering::Acquire) & STATE_MASK)
    }

    /// `Running → StopRequested`. Returns `false` if the run had already
    /// left `Running`; the first reason wins.
    pub fn request_stop(&self, reason: StopReason) -> bool {
        self.packed
            .compare_exchange(
                RunState::Running as u8,
                RunState::StopRequested as u8 | ((reason as u8) << REASON_SHIFT),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// `StopRequested → Stopped`, keeping the reason. Returns `false` from
    /// any other state.
    pub fn mark_stopped(&self) -> bool {
        self.packed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |packed| {
                (packed & STATE_MASK == RunState::StopRequested as u8)
                    .then_some((packed & !STATE_MASK) | RunState::Stopped as u8)
            })
            .is_ok()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        StopReason::from_u8(self.packed.load(Ordering::Acquire) >> REASON_SHIFT)
    }
}

impl Default for AtomicRunState {
    fn default() -> Self {
        Self::new()
    }
}
