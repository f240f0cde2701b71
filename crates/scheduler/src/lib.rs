//! Background job driver.
//!
//! A single cooperative loop selects over per-job timers: the business-day
//! daily scan, the periodic timeout-escalation checker, the send-queue
//! drainer, the nightly stale cleanup, and the reminder nudger. Each job
//! body is fallible; failures feed the [`JobFailureMonitor`], which pauses
//! a job after repeated consecutive failures and alerts the ops fallback.
//!
//! Exactly one process in a fleet should run this (the `run_scheduler`
//! flag). The store's unique constraints keep alert and queue writes safe
//! even if two schedulers race, but cleanup and reminders would duplicate
//! work.

mod monitor;

pub use monitor::{JobFailureMonitor, JobId};

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use chrono_tz::Tz;
use croner::Cron;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use cadence_notify::{NotificationSink, render};
use cadence_orchestrator::AlertOrchestrator;
use cadence_store::HolidayCache;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Timezone cron expressions are evaluated in.
    pub timezone: String,
    /// Country for the business-day gate on the daily scan.
    pub default_country: String,
    pub daily_scan_cron: String,
    pub cleanup_cron: String,
    pub reminder_cron: String,
    pub escalation_check_interval: StdDuration,
    pub queue_drain_interval: StdDuration,
    /// Consecutive failures before a job is auto-paused.
    pub job_failure_threshold: u32,
    /// Soft per-run deadline; overruns count as failures.
    pub job_soft_deadline: StdDuration,
    /// Where the job-paused alert goes.
    pub ops_email: Option<String>,
    pub ops_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_owned(),
            default_country: "US".to_owned(),
            daily_scan_cron: "0 5 * * *".to_owned(),
            cleanup_cron: "0 2 * * *".to_owned(),
            reminder_cron: "0 10 * * *".to_owned(),
            escalation_check_interval: StdDuration::from_secs(30 * 60),
            queue_drain_interval: StdDuration::from_secs(5 * 60),
            job_failure_threshold: 2,
            job_soft_deadline: StdDuration::from_secs(10 * 60),
            ops_email: None,
            ops_name: "Operations Team".to_owned(),
        }
    }
}

/// Scheduler startup errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression '{pattern}': {message}")]
    InvalidCron { pattern: String, message: String },

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// The five-job background driver.
pub struct Scheduler {
    orchestrator: Arc<AlertOrchestrator>,
    holidays: Arc<HolidayCache>,
    sink: Arc<dyn NotificationSink>,
    config: SchedulerConfig,
    monitor: JobFailureMonitor,
    shutdown_rx: mpsc::Receiver<()>,
    tz: Tz,
    daily_scan: Cron,
    cleanup: Cron,
    reminder: Cron,
}

impl Scheduler {
    /// Build the scheduler, parsing cron expressions and timezone up front
    /// so misconfiguration refuses to start instead of failing at 05:00.
    pub fn new(
        orchestrator: Arc<AlertOrchestrator>,
        holidays: Arc<HolidayCache>,
        sink: Arc<dyn NotificationSink>,
        config: SchedulerConfig,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> Result<Self, SchedulerError> {
        let tz = Tz::from_str(&config.timezone)
            .map_err(|_| SchedulerError::InvalidTimezone(config.timezone.clone()))?;
        let parse = |pattern: &str| {
            Cron::new(pattern)
                .parse()
                .map_err(|e| SchedulerError::InvalidCron {
                    pattern: pattern.to_owned(),
                    message: e.to_string(),
                })
        };
        let daily_scan = parse(&config.daily_scan_cron)?;
        let cleanup = parse(&config.cleanup_cron)?;
        let reminder = parse(&config.reminder_cron)?;
        let monitor = JobFailureMonitor::new(config.job_failure_threshold);

        Ok(Self {
            orchestrator,
            holidays,
            sink,
            config,
            monitor,
            shutdown_rx,
            tz,
            daily_scan,
            cleanup,
            reminder,
        })
    }

    /// Seconds until the next occurrence of a cron expression in the
    /// configured timezone. Falls back to one hour if the expression has no
    /// future occurrence (should not happen for the shipped defaults).
    fn sleep_until_next(&self, cron: &Cron) -> StdDuration {
        let now = Utc::now().with_timezone(&self.tz);
        match cron.find_next_occurrence(&now, false) {
            Ok(next) => (next - now)
                .to_std()
                .unwrap_or(StdDuration::from_secs(60)),
            Err(e) => {
                warn!(error = %e, "cron has no next occurrence, retrying in an hour");
                StdDuration::from_secs(3600)
            }
        }
    }

    /// Run until shutdown is signaled.
    pub async fn run(&mut self) {
        info!(timezone = %self.tz, "scheduler starting");

        let mut escalation_tick = interval(self.config.escalation_check_interval);
        let mut queue_tick = interval(self.config.queue_drain_interval);
        // Skip the immediate first tick of the periodic jobs.
        escalation_tick.tick().await;
        queue_tick.tick().await;

        loop {
            let scan_sleep = tokio::time::sleep(self.sleep_until_next(&self.daily_scan));
            let cleanup_sleep = tokio::time::sleep(self.sleep_until_next(&self.cleanup));
            let reminder_sleep = tokio::time::sleep(self.sleep_until_next(&self.reminder));

            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("scheduler received shutdown signal");
                    break;
                }
                () = scan_sleep => self.run_job(JobId::DailyScan).await,
                () = cleanup_sleep => self.run_job(JobId::StaleCleanup).await,
                () = reminder_sleep => self.run_job(JobId::ReminderSender).await,
                _ = escalation_tick.tick() => self.run_job(JobId::EscalationChecker).await,
                _ = queue_tick.tick() => self.run_job(JobId::QueueProcessor).await,
            }
        }

        info!("scheduler stopped");
    }

    /// Run one job body under the soft deadline and feed the outcome to the
    /// failure monitor. A failing or overrunning job never crashes the
    /// driver.
    async fn run_job(&mut self, job: JobId) {
        if self.monitor.is_paused(job) {
            debug!(job = %job, "job is paused, skipping");
            return;
        }

        let outcome =
            tokio::time::timeout(self.config.job_soft_deadline, self.job_body(job)).await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(format!(
                "job exceeded soft deadline of {:?}",
                self.config.job_soft_deadline
            )),
        };

        match result {
            Ok(()) => self.monitor.record_success(job),
            Err(message) => {
                error!(job = %job, error = %message, "scheduled job failed");
                if self.monitor.record_failure(job) {
                    self.alert_job_paused(job).await;
                }
            }
        }
    }

    async fn job_body(&self, job: JobId) -> Result<(), String> {
        let now = Utc::now();
        match job {
            JobId::DailyScan => {
                let today = now.with_timezone(&self.tz).date_naive();
                let calendar = self
                    .holidays
                    .calendar_for(&self.config.default_country)
                    .await
                    .map_err(|e| e.to_string())?;
                if !calendar.is_business_day(today) {
                    debug!(%today, "skipping daily scan on non-business day");
                    return Ok(());
                }
                let summary = self.orchestrator.run_daily_scan(today).await;
                info!(
                    scanned = summary.tasks_scanned,
                    created = summary.alerts_created,
                    errors = summary.errors.len(),
                    "daily scan finished"
                );
                if summary.errors.is_empty() {
                    Ok(())
                } else {
                    Err(summary.errors.join("; "))
                }
            }
            JobId::EscalationChecker => self
                .orchestrator
                .check_and_escalate_timeouts(now)
                .await
                .map(|escalated| {
                    if !escalated.is_empty() {
                        info!(count = escalated.len(), "alerts escalated");
                    }
                })
                .map_err(|e| e.to_string()),
            JobId::QueueProcessor => self
                .orchestrator
                .drain_queue(now)
                .await
                .map(|summary| {
                    if summary.sent > 0 || summary.failed > 0 {
                        info!(sent = summary.sent, failed = summary.failed, "queue drained");
                    }
                })
                .map_err(|e| e.to_string()),
            JobId::StaleCleanup => self
                .orchestrator
                .cleanup_stale(now)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            JobId::ReminderSender => self
                .orchestrator
                .send_reminders(now)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
        }
    }

    /// Best-effort CRITICAL notice to ops when a job is auto-paused.
    async fn alert_job_paused(&self, job: JobId) {
        warn!(job = %job, "job auto-paused after repeated failures");
        let Some(ref email) = self.config.ops_email else {
            error!(job = %job, "no ops email configured; pause alert not delivered");
            return;
        };
        let message = render::job_paused(
            email,
            &self.config.ops_name,
            &job.to_string(),
            self.monitor.failure_count(job),
        );
        if let Err(e) = self.sink.send(&message).await {
            error!(job = %job, error = %e, "failed to deliver job-paused alert");
        }
    }
}
