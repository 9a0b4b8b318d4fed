//! Recurring trigger of pipeline runs.
//!
//! Runs fire at `start_at + k * interval`. Fire times missed while a run was in progress or the
//! process was down are not caught up: at most one run happens for the latest due fire time.

use chrono::{DateTime, TimeDelta, Utc};
use fullsync::concurrency::shutdown::{ShutdownRx, is_shutdown_requested};
use fullsync_config::shared::ScheduleConfig;
use std::future::Future;
use tracing::{info, warn};

/// Fire time arithmetic of a [`ScheduleConfig`].
#[derive(Debug, Clone)]
pub struct Schedule {
    start_at: DateTime<Utc>,
    interval: TimeDelta,
}

impl Schedule {
    pub fn new(config: &ScheduleConfig) -> anyhow::Result<Self> {
        let interval = i64::try_from(config.interval_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .filter(|interval| *interval > TimeDelta::zero())
            .ok_or_else(|| {
                anyhow::anyhow!("invalid schedule interval of {} seconds", config.interval_secs)
            })?;

        Ok(Self {
            start_at: config.start_at,
            interval,
        })
    }

    /// Number of whole intervals between `start_at` and `now`, `None` before `start_at`.
    fn elapsed_intervals(&self, now: DateTime<Utc>) -> Option<i64> {
        if now < self.start_at {
            return None;
        }

        let elapsed = (now - self.start_at).num_milliseconds();
        Some(elapsed / self.interval.num_milliseconds())
    }

    /// `start_at + index * interval`, `None` when it is out of the representable range.
    fn fire_time(&self, index: i64) -> Option<DateTime<Utc>> {
        let offset = self
            .interval
            .num_milliseconds()
            .checked_mul(index)
            .and_then(TimeDelta::try_milliseconds)?;

        self.start_at.checked_add_signed(offset)
    }

    /// Latest fire time at or before `now`.
    pub fn latest_due(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.elapsed_intervals(now)
            .and_then(|index| self.fire_time(index))
    }

    /// First fire time strictly after `now`, `None` when the schedule has no further fire time.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.elapsed_intervals(now) {
            Some(index) => self.fire_time(index.checked_add(1)?),
            None => Some(self.start_at),
        }
    }

    /// Fire times strictly between `last_fired` and `due` that will never run.
    pub fn missed_between(&self, last_fired: Option<DateTime<Utc>>, due: DateTime<Utc>) -> u64 {
        let Some(due_index) = self.elapsed_intervals(due) else {
            return 0;
        };

        let first_pending = match last_fired.and_then(|last| self.elapsed_intervals(last)) {
            Some(last_index) => last_index.saturating_add(1),
            None => 0,
        };

        u64::try_from(due_index.saturating_sub(first_pending)).unwrap_or(0)
    }
}

/// Calls `run` for every due fire time until shutdown is requested.
///
/// Shutdown interrupts the wait between two runs. A run already in progress is expected to
/// observe the same signal and return on its own.
pub async fn run_scheduler<F, Fut>(
    schedule: Schedule,
    mut shutdown_rx: ShutdownRx,
    mut run: F,
) -> anyhow::Result<()>
where
    F: FnMut(DateTime<Utc>) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    info!(
        start_at = %schedule.start_at,
        interval_secs = schedule.interval.num_seconds(),
        "starting scheduler"
    );

    let mut last_fired: Option<DateTime<Utc>> = None;

    loop {
        if is_shutdown_requested(&shutdown_rx) {
            break;
        }

        let now = Utc::now();
        if let Some(due) = schedule.latest_due(now)
            && last_fired.is_none_or(|last| due > last)
        {
            let missed = schedule.missed_between(last_fired, due);
            if missed > 0 {
                warn!(missed, fire_time = %due, "skipping missed fire times");
            }

            info!(fire_time = %due, "starting scheduled run");
            run(due).await?;
            last_fired = Some(due);

            continue;
        }

        let Some(next) = schedule.next_after(now) else {
            anyhow::bail!("schedule has no fire time after {now}");
        };
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next_fire_time = %next, wait_secs = wait.as_secs(), "waiting for next fire time");

        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                info!("shutdown requested while waiting for the next run");
                break;
            }
            _ = tokio::time::sleep(wait) => {}
        }
    }

    info!("scheduler stopped");

    Ok(())
}
