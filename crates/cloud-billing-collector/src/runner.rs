//! The collection loop: catch-up days, scheduled ticks and cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cloud_billing_core::BILLING_TIMEZONE;

use crate::error::CollectorError;
use crate::jobs::BillingJob;
use crate::metrics::{CollectorMetrics, Counter};

/// Source of the reference instant for each run.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// When scheduled runs happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fixed interval between runs.
    Interval(Duration),
    /// Once a day at the given hour, billing timezone.
    DailyAt {
        /// Hour of day, 0 to 23.
        hour: u32,
    },
}

impl Schedule {
    /// Daily schedule.
    ///
    /// # Errors
    ///
    /// Returns an error if `hour` is not between 0 and 23.
    pub fn daily_at(hour: u32) -> Result<Self, CollectorError> {
        if hour > 23 {
            return Err(CollectorError::Configuration(format!(
                "billing hour must be between 0 and 23, got {hour}"
            )));
        }
        Ok(Self::DailyAt { hour })
    }

    /// Time from `now` until the next scheduled run.
    #[must_use]
    pub fn delay_after(&self, now: DateTime<Utc>) -> Duration {
        match *self {
            Self::Interval(interval) => interval,
            Self::DailyAt { hour } => {
                let today = now.with_timezone(&BILLING_TIMEZONE).date_naive();
                (0..=2)
                    .filter_map(|offset| today.checked_add_days(Days::new(offset)))
                    .filter_map(|day| local_hour(day, hour))
                    .find(|at| *at > now)
                    .and_then(|at| (at - now).to_std().ok())
                    .unwrap_or(Duration::from_secs(24 * 60 * 60))
            }
        }
    }
}

/// `hour:00` on `day` in the billing timezone. Inside a DST gap the first
/// valid instant after it is used.
fn local_hour(day: NaiveDate, hour: u32) -> Option<DateTime<Utc>> {
    let naive = day.and_hms_opt(hour, 0, 0)?;
    BILLING_TIMEZONE
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            BILLING_TIMEZONE
                .from_local_datetime(&(naive + chrono::Duration::hours(1)))
                .earliest()
        })
        .map(|at| at.with_timezone(&Utc))
}

/// Drives a [`BillingJob`] until cancelled.
///
/// On start the job runs for `today - N` through `today`, one day per
/// iteration; afterwards it runs on every scheduled tick. Catch-up days and
/// ticks share one select loop, so at most one run is in flight. Failed
/// runs are logged and counted, never fatal.
pub struct Runner {
    job: Arc<dyn BillingJob>,
    schedule: Schedule,
    catch_up_days: u32,
    clock: Arc<dyn Clock>,
    metrics: Arc<CollectorMetrics>,
}

impl Runner {
    /// Create a runner using the wall clock and no catch-up.
    #[must_use]
    pub fn new(job: Arc<dyn BillingJob>, schedule: Schedule, metrics: Arc<CollectorMetrics>) -> Self {
        Self {
            job,
            schedule,
            catch_up_days: 0,
            clock: Arc::new(SystemClock),
            metrics,
        }
    }

    /// Run for this many past days before following the schedule.
    #[must_use]
    pub fn with_catch_up(mut self, days: u32) -> Self {
        self.catch_up_days = days;
        self
    }

    /// Use a different clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let (days_tx, mut days_rx) = mpsc::channel::<u32>(1);
        // the channel is empty, so this cannot fail
        let _ = days_tx.try_send(self.catch_up_days);

        let sleep = time::sleep(self.schedule.delay_after(self.clock.now()));
        tokio::pin!(sleep);

        info!(job = self.job.name(), schedule = ?self.schedule, catch_up_days = self.catch_up_days, "Runner started");

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    info!(job = self.job.name(), "Runner stopped");
                    return;
                }

                Some(days) = days_rx.recv() => {
                    let reference = self.clock.now() - chrono::Duration::days(i64::from(days));
                    self.execute(reference, &cancel).await;
                    if days > 0 {
                        let _ = days_tx.try_send(days - 1);
                    }
                }

                () = &mut sleep => {
                    self.execute(self.clock.now(), &cancel).await;
                    let delay = self.schedule.delay_after(self.clock.now());
                    sleep.as_mut().reset(Instant::now() + delay);
                }
            }
        }
    }

    async fn execute(&self, reference: DateTime<Utc>, cancel: &CancellationToken) {
        info!(job = self.job.name(), reference = %reference, "Starting run");

        tokio::select! {
            () = cancel.cancelled() => {
                warn!(job = self.job.name(), "Run aborted");
            }
            result = self.job.run_once(reference) => match result {
                Ok(records) => info!(job = self.job.name(), records, "Run finished"),
                Err(e) => {
                    self.metrics.inc(Counter::RunsFailed);
                    error!(job = self.job.name(), error = %e, "Run failed");
                }
            },
        }
    }
}
