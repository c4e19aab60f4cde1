//! Durable, time-delayed workflows.
//!
//! Events fan out into [`StepRecord`]s persisted in a [`WorkflowStore`]. The
//! engine claims due steps, runs them, and schedules whatever step follows. A
//! failing step is retried with exponential backoff until `max_attempts`, then
//! parked as dead. Restarting the process loses nothing that reached the store.

pub mod digest;
pub mod expiration;
pub mod store;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::domain::{JobId, UserId};
use super::notifications::{MailError, Mailer};
use super::repository::{BoardRepository, RepositoryError};
use expiration::{ExpirationMode, ExpirationPlan};
pub use store::{
    InMemoryWorkflowStore, StepId, StepKind, StepRecord, StepStatus, WorkflowStore,
    WorkflowStoreError,
};

/// Events that start a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// A job post just became active through payment.
    JobActivated {
        job_id: JobId,
        expiration_days: u32,
    },
    JobSeekerCreated {
        user_id: UserId,
        email: Option<String>,
        name: Option<String>,
    },
}

impl WorkflowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::JobActivated { .. } => "job/activated",
            WorkflowEvent::JobSeekerCreated { .. } => "jobseeker/created",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub expiration: ExpirationMode,
    pub max_attempts: u32,
    pub public_url: String,
    /// Steps claimed per poll.
    pub batch_size: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            expiration: ExpirationMode::Production,
            max_attempts: 5,
            public_url: "http://localhost:3000".to_string(),
            batch_size: 32,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Store(#[from] WorkflowStoreError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Counts from one pass over due steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub completed: usize,
    pub retried: usize,
    pub dead: usize,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.completed + self.retried + self.dead
    }
}

/// Exponential backoff capped at one hour: 2s, 4s, 8s, ...
pub fn retry_delay(attempt: u32) -> Duration {
    let secs = 2_i64.saturating_pow(attempt.min(12));
    Duration::seconds(secs.min(3_600))
}

pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    repository: Arc<dyn BoardRepository>,
    mailer: Arc<dyn Mailer>,
    settings: WorkflowSettings,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        repository: Arc<dyn BoardRepository>,
        mailer: Arc<dyn Mailer>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            store,
            repository,
            mailer,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Persist the first step(s) of the workflow `event` starts.
    pub fn send(
        &self,
        event: WorkflowEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<StepRecord>, WorkflowError> {
        debug!(event = event.name(), "workflow event received");
        let mut scheduled = Vec::new();
        match event {
            WorkflowEvent::JobActivated {
                job_id,
                expiration_days,
            } => {
                let Some(ExpirationPlan {
                    reminder,
                    expire_after,
                }) = expiration::plan(expiration_days, self.settings.expiration)
                else {
                    info!(job_id = %job_id, "job expiration skipped in development");
                    return Ok(scheduled);
                };
                let first = match reminder {
                    Some(reminder) => StepRecord::pending(
                        StepKind::ExpiringSoonReminder {
                            job_id: job_id.clone(),
                            days_left: reminder.days_left,
                        },
                        now + reminder.after,
                        now,
                    ),
                    None => StepRecord::pending(
                        StepKind::ExpireJob {
                            job_id: job_id.clone(),
                        },
                        now + expire_after,
                        now,
                    ),
                };
                scheduled.push(self.store.schedule(first)?);
            }
            WorkflowEvent::JobSeekerCreated {
                user_id,
                email,
                name,
            } => {
                let Some(email) = email else {
                    warn!(user_id = %user_id, "job seeker has no email; workflows skipped");
                    return Ok(scheduled);
                };
                scheduled.push(self.store.schedule(StepRecord::pending(
                    StepKind::SendWelcome {
                        user_id: user_id.clone(),
                        email: email.clone(),
                        name,
                    },
                    now,
                    now,
                ))?);
                scheduled.push(self.store.schedule(StepRecord::pending(
                    StepKind::SendDigest {
                        user_id,
                        email,
                        round: 1,
                    },
                    now + Duration::days(digest::DIGEST_INTERVAL_DAYS),
                    now,
                ))?);
            }
        }
        Ok(scheduled)
    }

    /// Claim and execute every step due at `now`.
    pub fn run_due(&self, now: DateTime<Utc>) -> Result<RunReport, WorkflowError> {
        let mut report = RunReport::default();
        loop {
            let claimed = self.store.claim_due(now, self.settings.batch_size)?;
            if claimed.is_empty() {
                return Ok(report);
            }
            for record in claimed {
                match self.execute(&record, now) {
                    Ok(next) => {
                        if let Some(next) = next {
                            self.store.schedule(next)?;
                        }
                        self.store.complete(&record.id)?;
                        report.completed += 1;
                    }
                    Err(err) if record.attempts < self.settings.max_attempts => {
                        let retry_at = now + retry_delay(record.attempts);
                        warn!(
                            workflow = record.step.workflow(),
                            step = record.step.name(),
                            attempt = record.attempts,
                            error = %err,
                            %retry_at,
                            "workflow step failed; retrying"
                        );
                        self.store.retry_at(&record.id, retry_at, err.to_string())?;
                        report.retried += 1;
                    }
                    Err(err) => {
                        error!(
                            workflow = record.step.workflow(),
                            step = record.step.name(),
                            attempt = record.attempts,
                            error = %err,
                            "workflow step exhausted retries"
                        );
                        self.store.mark_dead(&record.id, err.to_string())?;
                        report.dead += 1;
                    }
                }
            }
        }
    }

    fn execute(
        &self,
        record: &StepRecord,
        now: DateTime<Utc>,
    ) -> Result<Option<StepRecord>, WorkflowError> {
        let repository = self.repository.as_ref();
        let mailer = self.mailer.as_ref();
        match &record.step {
            StepKind::ExpiringSoonReminder { job_id, days_left } => {
                expiration::send_reminder(
                    repository,
                    mailer,
                    &self.settings.public_url,
                    job_id,
                    *days_left,
                )?;
                // Anchored to the planned time so retries do not push expiration out.
                Ok(Some(StepRecord::pending(
                    StepKind::ExpireJob {
                        job_id: job_id.clone(),
                    },
                    record.run_at + Duration::days(i64::from(*days_left)),
                    now,
                )))
            }
            StepKind::ExpireJob { job_id } => {
                expiration::expire_job(repository, mailer, job_id, now)?;
                Ok(None)
            }
            StepKind::SendWelcome { email, name, .. } => {
                digest::send_welcome(mailer, email, name.as_deref())?;
                Ok(None)
            }
            StepKind::SendDigest {
                user_id,
                email,
                round,
            } => {
                digest::send_digest(repository, mailer, email)?;
                if *round >= digest::DIGEST_ROUNDS {
                    info!(user_id = %user_id, "job digest series finished");
                    return Ok(None);
                }
                Ok(Some(StepRecord::pending(
                    StepKind::SendDigest {
                        user_id: user_id.clone(),
                        email: email.clone(),
                        round: round + 1,
                    },
                    record.run_at + Duration::days(digest::DIGEST_INTERVAL_DAYS),
                    now,
                )))
            }
        }
    }

    /// Expire every active post whose listing window has passed, independent of
    /// scheduled steps.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, WorkflowError> {
        let due = self.repository.jobs_due_for_expiration(now)?;
        let mut expired = 0;
        for job in due {
            if expiration::expire_job(self.repository.as_ref(), self.mailer.as_ref(), &job.id, now)?
                .is_some()
            {
                expired += 1;
            }
        }
        Ok(expired)
    }

    /// Poll the store on a tokio task until the handle is shut down.
    pub fn spawn(self: Arc<Self>, poll_interval: StdDuration) -> WorkflowWorkerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            match self.store.recover_running() {
                Ok(0) => {}
                Ok(recovered) => info!(recovered, "requeued interrupted workflow steps"),
                Err(err) => error!(error = %err, "failed to requeue interrupted steps"),
            }
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.run_due(Utc::now()) {
                            Ok(report) if report.processed() > 0 => {
                                debug!(?report, "workflow steps processed");
                            }
                            Ok(_) => {}
                            Err(err) => error!(error = %err, "workflow poll failed"),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("workflow worker stopping");
                            break;
                        }
                    }
                }
            }
        });
        WorkflowWorkerHandle { shutdown, join }
    }
}

pub struct WorkflowWorkerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WorkflowWorkerHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.join.await {
            error!(error = %err, "workflow worker panicked");
        }
    }
}
