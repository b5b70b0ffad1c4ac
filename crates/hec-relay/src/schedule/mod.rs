use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use tokio::time::Instant;

const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Deadlines for the batch flush, the statistics report and the midnight
/// rollover of the daily total.
///
/// All deadlines are monotonic instants so that paused-clock tests can drive
/// them with `tokio::time::advance`. The midnight deadline is derived from the
/// local wall clock each time it is re-armed.
pub struct Schedule {
    batch_wait: Duration,
    stat_period: Duration,
    next_flush: Instant,
    next_stats: Instant,
    pub(crate) next_midnight: Instant,
}

impl Schedule {
    pub fn new(batch_wait: Duration, stat_period: Duration) -> Self {
        let now = Instant::now();
        Self {
            batch_wait,
            stat_period,
            next_flush: now + batch_wait,
            next_stats: now + stat_period,
            next_midnight: now + until_next_midnight(&Local::now()),
        }
    }

    /// Reaching the deadline counts as due, so a waiter sleeping exactly
    /// until it always makes progress.
    pub fn flush_due(&self) -> bool {
        Instant::now() >= self.next_flush
    }

    pub fn until_flush(&self) -> Duration {
        self.next_flush.saturating_duration_since(Instant::now())
    }

    pub fn stats_due(&self) -> bool {
        Instant::now() > self.next_stats
    }

    pub fn midnight_passed(&self) -> bool {
        Instant::now() > self.next_midnight
    }

    pub fn rearm_flush(&mut self) {
        self.next_flush = Instant::now() + self.batch_wait;
    }

    pub fn rearm_stats(&mut self) {
        self.next_stats = Instant::now() + self.stat_period;
    }

    pub fn advance_midnight(&mut self) {
        self.next_midnight = Instant::now() + until_next_midnight(&Local::now());
    }
}

/// Time left until the next local midnight after `now`.
///
/// Falls back to a full day when that midnight does not exist in the zone
/// (a DST jump over 00:00).
pub fn until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    now.date_naive()
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
        .and_then(|midnight| now.timezone().from_local_datetime(&midnight).earliest())
        .and_then(|midnight| midnight.signed_duration_since(now).to_std().ok())
        .unwrap_or(ONE_DAY)
}
