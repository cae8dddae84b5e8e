use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// When a recording should begin, relative to the acquisition stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "timestamp", rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Fire on the first decoded batch.
    Immediate,
    /// Fire on the first batch whose first timestamp is `>= threshold`.
    Threshold(u64),
}

impl fmt::Display for TriggerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediate"),
            Self::Threshold(ts) => write!(f, "threshold(ts >= {})", ts),
        }
    }
}

/// Outcome of evaluating one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    NoAction,
    Fire,
}

/// Observable trigger state.
///
/// Transitions exactly once, `WaitingForThreshold → Fired`; never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    WaitingForThreshold,
    Fired,
}

/// At-most-once trigger shared between the frame callback and the
/// controller.
///
/// `evaluate` takes `&self` and is safe to call from several threads; the
/// fired flag is claimed with a single compare-exchange, so exactly one
/// caller ever sees [`TriggerAction::Fire`].
#[derive(Debug)]
pub struct Trigger {
    policy: TriggerPolicy,
    fired: AtomicBool,
    fired_at: AtomicU64,
}

impl Trigger {
    pub fn new(policy: TriggerPolicy) -> Self {
        Self {
            policy,
            fired: AtomicBool::new(false),
            fired_at: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> TriggerPolicy {
        self.policy
    }

    pub fn evaluate(&self, timestamp: u64) -> TriggerAction {
        if self.fired.load(Ordering::Acquire) {
            return TriggerAction::NoAction;
        }

        let condition_met = match self.policy {
            TriggerPolicy::Immediate => true,
            TriggerPolicy::Threshold(threshold) => timestamp >= threshold,
        };
        if !condition_met {
            return TriggerAction::NoAction;
        }

        match self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.fired_at.store(timestamp, Ordering::Release);
                TriggerAction::Fire
            }
            Err(_) => TriggerAction::NoAction,
        }
    }

    pub fn state(&self) -> TriggerState {
        if self.fired.load(Ordering::Acquire) {
            TriggerState::Fired
        } else {
            TriggerState::WaitingForThreshold
        }
    }

    /// Timestamp that fired the trigger, once it has fired.
    pub fn fired_at(&self) -> Option<u64> {
        if self.fired.load(Ordering::Acquire) {
            Some(self.fired_at.load(Ordering::Acquire))
        } else {
            None
        }
    }
}
