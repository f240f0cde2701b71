use std::collections::HashMap;
use std::fmt;

/// The five scheduled jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobId {
    DailyScan,
    EscalationChecker,
    QueueProcessor,
    StaleCleanup,
    ReminderSender,
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DailyScan => "daily_scan",
            Self::EscalationChecker => "escalation_checker",
            Self::QueueProcessor => "queue_processor",
            Self::StaleCleanup => "stale_cleanup",
            Self::ReminderSender => "reminder_sender",
        };
        f.write_str(name)
    }
}

/// Per-job sliding failure counter with auto-pause.
///
/// A success clears the job's counter; consecutive failures reaching the
/// threshold pause the job until the process restarts (or `resume` is
/// called). Counters are only touched from the scheduler's single driver
/// task, so no locking is needed.
#[derive(Debug)]
pub struct JobFailureMonitor {
    threshold: u32,
    failures: HashMap<JobId, u32>,
    paused: HashMap<JobId, bool>,
}

impl JobFailureMonitor {
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            failures: HashMap::new(),
            paused: HashMap::new(),
        }
    }

    pub fn record_success(&mut self, job: JobId) {
        self.failures.remove(&job);
    }

    /// Record a failure. Returns `true` when this failure crossed the
    /// threshold and paused the job.
    pub fn record_failure(&mut self, job: JobId) -> bool {
        let count = self.failures.entry(job).or_insert(0);
        *count += 1;
        if *count >= self.threshold && !self.is_paused(job) {
            self.paused.insert(job, true);
            return true;
        }
        false
    }

    #[must_use]
    pub fn is_paused(&self, job: JobId) -> bool {
        self.paused.get(&job).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn failure_count(&self, job: JobId) -> u32 {
        self.failures.get(&job).copied().unwrap_or(0)
    }

    /// Manually resume a paused job and reset its counter.
    pub fn resume(&mut self, job: JobId) {
        self.paused.remove(&job);
        self.failures.remove(&job);
    }
}
