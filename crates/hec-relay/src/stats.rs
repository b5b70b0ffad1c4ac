use tokio::time::Instant;
use tracing::info;

/// Counters reset at every statistics report.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PeriodCounters {
    pub events_accepted: u64,
    pub requests_succeeded: u64,
    pub requests_failed: u64,
    pub bytes_sent: u64,
}

pub struct Stats {
    counters: PeriodCounters,
    last_report: Instant,
    reports: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            counters: PeriodCounters::default(),
            last_report: Instant::now(),
            reports: 0,
        }
    }

    #[cfg(test)]
    pub fn counters(&self) -> PeriodCounters {
        self.counters
    }

    /// Number of reports emitted since startup.
    #[cfg(test)]
    pub fn reports(&self) -> u64 {
        self.reports
    }

    pub fn record_event(&mut self) {
        self.counters.events_accepted += 1;
    }

    pub fn record_success(&mut self, bytes: u64) {
        self.counters.requests_succeeded += 1;
        self.counters.bytes_sent += bytes;
    }

    pub fn record_failure(&mut self) {
        self.counters.requests_failed += 1;
    }

    /// Log the period counters alongside the running daily total, then start
    /// a new period. Returns the counters of the period just closed.
    pub fn report(&mut self, total_today: u64) -> PeriodCounters {
        let now = Instant::now();
        let period = std::mem::take(&mut self.counters);
        self.reports += 1;

        info!(
            elapsed_secs = now.duration_since(self.last_report).as_secs(),
            events = period.events_accepted,
            succeeded = period.requests_succeeded,
            failed = period.requests_failed,
            bytes_sent = period.bytes_sent,
            total_today,
            report = self.reports,
            "statistics"
        );

        self.last_report = now;
        period
    }
}
