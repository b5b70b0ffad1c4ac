use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::buffers::BatchBuffer;
use crate::config::Config;
use crate::daily_volume::{DailyVolume, StateError, StateFile};
use crate::exporter::{ExportError, Exporter};
use crate::schedule::Schedule;
use crate::stats::Stats;

/// Batches events and forwards each batch to the collector.
///
/// A batch is flushed when it holds `batch_size` events or when `batch_wait`
/// has passed since the previous flush, whichever comes first. The buffer is
/// emptied on every flush whatever the outcome; nothing is ever retried.
///
/// Only fatal delivery errors (see [`ExportError::is_fatal`]) are returned.
/// The caller is expected to stop feeding the queue after one.
pub struct EventQueue<E: Exporter> {
    exporter: E,
    batch: BatchBuffer,
    batch_size: usize,
    schedule: Schedule,
    stats: Stats,
    volume: DailyVolume,
    state_file: Option<StateFile>,
}

impl<E: Exporter> EventQueue<E> {
    /// Build the queue, restoring today's total from the state file if one is
    /// configured.
    pub fn new(exporter: E, config: &Config) -> Result<Self, StateError> {
        let state_file = config.state_file.as_ref().map(StateFile::new);
        let total = match &state_file {
            Some(file) => {
                let total = file.load()?;
                info!(path = %file.path().display(), total, "restored daily volume");
                total
            }
            None => 0,
        };

        Ok(Self {
            exporter,
            batch: BatchBuffer::new(),
            batch_size: config.batch_size.max(1),
            schedule: Schedule::new(config.batch_wait, config.stat_period),
            stats: Stats::new(),
            volume: DailyVolume::new(total, config.daily_cap),
            state_file,
        })
    }

    /// Buffer one event, flushing if the batch is now full. Empty events are
    /// ignored.
    pub async fn add(&mut self, event: &str) -> Result<(), ExportError> {
        if event.is_empty() {
            return Ok(());
        }
        self.batch.push(event);
        self.stats.record_event();
        debug!(pending = self.batch.len(), "event queued");
        if self.batch.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Flush if the batch wait has elapsed, then return how long the caller
    /// may block before the next time-triggered flush.
    pub async fn next_wake_delay(&mut self) -> Result<Duration, ExportError> {
        if self.schedule.flush_due() {
            self.flush().await?;
        }
        Ok(self.schedule.until_flush())
    }

    /// Deliver whatever is buffered and service the statistics and midnight
    /// timers. Safe to call on an empty buffer.
    pub async fn flush(&mut self) -> Result<(), ExportError> {
        if !self.batch.is_empty() {
            let events = self.batch.len();
            let bytes = self.batch.size_bytes() as u64;
            let payload = self.batch.take();

            if self.volume.admit(bytes) {
                match self.exporter.export(payload).await {
                    Ok(()) => {
                        debug!(events, bytes, "batch delivered");
                        self.stats.record_success(bytes);
                        self.volume.record(bytes);
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(error = %e, events, bytes, "batch not accepted, dropping it");
                        self.stats.record_failure();
                    }
                }
            } else {
                debug!(events, bytes, "daily cap exceeded, batch dropped");
            }
        }

        if self.schedule.stats_due() {
            self.report();
        }

        if self.schedule.midnight_passed() {
            self.report();
            self.volume.reset();
            self.schedule.advance_midnight();
            info!("midnight passed, daily volume reset");
            self.report();
        }

        self.schedule.rearm_flush();
        Ok(())
    }

    /// Emit statistics, start a new period and persist the daily total.
    pub fn report(&mut self) {
        self.stats.report(self.volume.total());
        self.schedule.rearm_stats();

        if let Some(file) = &self.state_file
            && let Err(e) = file.store(self.volume.total())
        {
            error!(error = %e, "failed to persist daily volume");
        }
    }

    /// Final drain: flush what is left, then report. The report runs even when
    /// the flush fails so the daily total is persisted.
    pub async fn shutdown(&mut self) -> Result<(), ExportError> {
        let flushed = self.flush().await;
        self.report();
        flushed
    }
}
