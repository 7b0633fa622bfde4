//! Thread-shared run statistics.

use crate::ItemError;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Per-run aggregate, mutated by workers behind one lock.
#[derive(Debug, Default)]
pub struct RunStats {
    inner: Mutex<RunSummary>,
}

/// Snapshot of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items dispatched.
    pub total: usize,
    /// Items written.
    pub written: usize,
    /// `(item, reason)` for skipped items.
    pub skipped: Vec<(String, String)>,
    /// `(item, reason)` for failed items.
    pub failed: Vec<(String, String)>,
}

impl RunStats {
    /// Empty statistics for `total` items.
    pub fn new(total: usize) -> Self {
        Self {
            inner: Mutex::new(RunSummary {
                total,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunSummary> {
        // A panicking worker cannot leave the tallies half-updated.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Counts one written item.
    pub fn record_written(&self) {
        self.lock().written += 1;
    }

    /// Records a skip or failure.
    pub fn record_error(&self, item: &str, error: &ItemError) {
        let entry = (item.to_string(), error.reason().to_string());
        let mut inner = self.lock();
        match error {
            ItemError::Skipped(_) => inner.skipped.push(entry),
            ItemError::Failed(_) => inner.failed.push(entry),
        }
    }

    /// Final snapshot with entries sorted by item name.
    pub fn into_summary(self) -> RunSummary {
        let mut summary = self.inner.into_inner().unwrap_or_else(|e| e.into_inner());
        summary.skipped.sort();
        summary.failed.sort();
        summary
    }
}

impl RunSummary {
    /// No item failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Processed {}: {} written, {} skipped, {} failed",
            self.total,
            self.written,
            self.skipped.len(),
            self.failed.len()
        )?;
        for (item, reason) in &self.skipped {
            writeln!(f, "  skipped {item}: {reason}")?;
        }
        for (item, reason) in &self.failed {
            writeln!(f, "  failed  {item}: {reason}")?;
        }
        Ok(())
    }
}
