use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::models::report::RunIssue;

/// Bounded, thread-safe list of recoverable issues.
///
/// Only locked on error paths. Once full, further issues are counted but
/// not kept, so a device spewing errors cannot grow memory without bound.
#[derive(Debug)]
pub struct IssueLog {
    issues: Mutex<Vec<RunIssue>>,
    capacity: usize,
    suppressed: AtomicU64,
}

impl IssueLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            issues: Mutex::new(Vec::new()),
            capacity,
            suppressed: AtomicU64::new(0),
        }
    }

    /// Returns `false` if the issue was only counted.
    pub fn push(&self, issue: RunIssue) -> bool {
        let mut issues = self.issues.lock();
        if issues.len() >= self.capacity {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        issues.push(issue);
        true
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    pub fn take(&self) -> Vec<RunIssue> {
        std::mem::take(&mut *self.issues.lock())
    }
}
