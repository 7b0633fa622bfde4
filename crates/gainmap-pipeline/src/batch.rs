//! Bounded-concurrency batch driver.
//!
//! Items run on a dedicated rayon pool sized to the configured concurrency,
//! so at most that many items are in flight. [`BatchDriver::run`] returns
//! only after every item has finished.

use crate::config::PipelineConfig;
use crate::item::{WorkItem, process_item};
use crate::stats::{RunStats, RunSummary};
use crate::{ItemError, PipelineResult};
use gainmap_engine::Engine;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{info, warn};

/// Receives per-item log lines and progress ticks from worker threads.
pub trait ProgressSink: Send + Sync {
    /// One log line about `item`.
    fn log(&self, item: &str, line: &str);

    /// `done` of `total` items have finished.
    fn advance(&self, done: usize, total: usize);
}

/// Sink that forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn log(&self, item: &str, line: &str) {
        info!(item, "{line}");
    }

    fn advance(&self, done: usize, total: usize) {
        info!(done, total, "progress");
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn log(&self, _item: &str, _line: &str) {}
    fn advance(&self, _done: usize, _total: usize) {}
}

/// Runs work items across a bounded worker pool.
pub struct BatchDriver<'a> {
    engine: &'a dyn Engine,
    config: PipelineConfig,
}

impl<'a> BatchDriver<'a> {
    /// Driver over `engine`; the config is validated up front.
    pub fn new(engine: &'a dyn Engine, config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self { engine, config })
    }

    /// Effective configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Processes every item and returns the aggregated summary.
    ///
    /// Item failures are recorded, never propagated. The only error is a
    /// worker pool that cannot be built.
    pub fn run(&self, items: &[WorkItem], sink: &dyn ProgressSink) -> PipelineResult<RunSummary> {
        let threads = self.config.effective_concurrency();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("gainmap-worker-{i}"))
            .build()?;

        let total = items.len();
        let stats = RunStats::new(total);
        let done = AtomicUsize::new(0);
        let start = Instant::now();
        info!(
            items = total,
            threads,
            engine = self.engine.name(),
            policy = %self.config.headroom(),
            "starting batch"
        );

        pool.install(|| {
            items.par_iter().for_each(|item| {
                match process_item(self.engine, &self.config, item, sink) {
                    Ok(_) => stats.record_written(),
                    Err(e) => {
                        match &e {
                            ItemError::Skipped(reason) => info!(item = %item.name, %reason, "skipped"),
                            ItemError::Failed(reason) => warn!(item = %item.name, %reason, "failed"),
                        }
                        sink.log(&item.name, &e.to_string());
                        stats.record_error(&item.name, &e);
                    }
                }
                let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                sink.advance(n, total);
            });
        });

        let summary = stats.into_summary();
        info!(
            written = summary.written,
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "batch complete"
        );
        Ok(summary)
    }
}
