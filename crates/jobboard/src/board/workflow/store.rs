use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::board::domain::{JobId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub String);

impl StepId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::new()
    }
}

/// One unit of durable work. Each step runs at most once successfully and may
/// schedule the step that follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    ExpiringSoonReminder { job_id: JobId, days_left: u32 },
    ExpireJob { job_id: JobId },
    SendWelcome {
        user_id: UserId,
        email: String,
        name: Option<String>,
    },
    SendDigest {
        user_id: UserId,
        email: String,
        round: u32,
    },
}

impl StepKind {
    pub fn workflow(&self) -> &'static str {
        match self {
            StepKind::ExpiringSoonReminder { .. } | StepKind::ExpireJob { .. } => "job-expiration",
            StepKind::SendWelcome { .. } => "jobseeker-welcome",
            StepKind::SendDigest { .. } => "send-job-listings",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StepKind::ExpiringSoonReminder { .. } => "send-expiring-soon-email",
            StepKind::ExpireJob { .. } => "update-job-status",
            StepKind::SendWelcome { .. } => "send-welcome-email",
            StepKind::SendDigest { .. } => "send-email",
        }
    }

    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            StepKind::ExpiringSoonReminder { job_id, .. } | StepKind::ExpireJob { job_id } => {
                Some(job_id)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    /// Attempts exhausted.
    Dead,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: StepId,
    pub step: StepKind,
    pub run_at: DateTime<Utc>,
    pub status: StepStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn pending(step: StepKind, run_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: StepId::new(),
            step,
            run_at,
            status: StepStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
        }
    }
}

/// Durable step storage.
pub trait WorkflowStore: Send + Sync {
    fn schedule(&self, record: StepRecord) -> Result<StepRecord, WorkflowStoreError>;
    /// Atomically move up to `limit` due pending steps to running, bumping attempts.
    fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StepRecord>, WorkflowStoreError>;
    fn complete(&self, id: &StepId) -> Result<(), WorkflowStoreError>;
    fn retry_at(
        &self,
        id: &StepId,
        run_at: DateTime<Utc>,
        error: String,
    ) -> Result<(), WorkflowStoreError>;
    fn mark_dead(&self, id: &StepId, error: String) -> Result<(), WorkflowStoreError>;
    /// Return steps left running by a previous process to pending.
    fn recover_running(&self) -> Result<usize, WorkflowStoreError>;
    fn list(&self) -> Result<Vec<StepRecord>, WorkflowStoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowStoreError {
    #[error("step {0:?} not found")]
    NotFound(StepId),
    #[error("workflow store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Default, Clone)]
pub struct InMemoryWorkflowStore {
    steps: Arc<Mutex<BTreeMap<StepId, StepRecord>>>,
}

impl InMemoryWorkflowStore {
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<StepId, StepRecord>>, WorkflowStoreError> {
        self.steps
            .lock()
            .map_err(|_| WorkflowStoreError::Unavailable("workflow mutex poisoned".to_string()))
    }

    fn update<F>(&self, id: &StepId, apply: F) -> Result<(), WorkflowStoreError>
    where
        F: FnOnce(&mut StepRecord),
    {
        let mut steps = self.lock()?;
        let record = steps
            .get_mut(id)
            .ok_or_else(|| WorkflowStoreError::NotFound(id.clone()))?;
        apply(record);
        Ok(())
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn schedule(&self, record: StepRecord) -> Result<StepRecord, WorkflowStoreError> {
        self.lock()?.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StepRecord>, WorkflowStoreError> {
        let mut steps = self.lock()?;
        let mut due: Vec<&mut StepRecord> = steps
            .values_mut()
            .filter(|record| record.status == StepStatus::Pending && record.run_at <= now)
            .collect();
        due.sort_by_key(|record| record.run_at);

        Ok(due
            .into_iter()
            .take(limit)
            .map(|record| {
                record.status = StepStatus::Running;
                record.attempts += 1;
                record.clone()
            })
            .collect())
    }

    fn complete(&self, id: &StepId) -> Result<(), WorkflowStoreError> {
        self.update(id, |record| {
            record.status = StepStatus::Completed;
            record.last_error = None;
        })
    }

    fn retry_at(
        &self,
        id: &StepId,
        run_at: DateTime<Utc>,
        error: String,
    ) -> Result<(), WorkflowStoreError> {
        self.update(id, |record| {
            record.status = StepStatus::Pending;
            record.run_at = run_at;
            record.last_error = Some(error);
        })
    }

    fn mark_dead(&self, id: &StepId, error: String) -> Result<(), WorkflowStoreError> {
        self.update(id, |record| {
            record.status = StepStatus::Dead;
            record.last_error = Some(error);
        })
    }

    fn recover_running(&self) -> Result<usize, WorkflowStoreError> {
        let mut steps = self.lock()?;
        let mut recovered = 0;
        for record in steps.values_mut() {
            if record.status == StepStatus::Running {
                record.status = StepStatus::Pending;
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    fn list(&self) -> Result<Vec<StepRecord>, WorkflowStoreError> {
        let mut records: Vec<StepRecord> = self.lock()?.values().cloned().collect();
        records.sort_by_key(|record| record.run_at);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn expire(job: &str, run_at: DateTime<Utc>) -> StepRecord {
        StepRecord::pending(
            StepKind::ExpireJob {
                job_id: JobId::from(job),
            },
            run_at,
            now(),
        )
    }

    #[test]
    fn claims_only_due_steps_once() {
        let store = InMemoryWorkflowStore::default();
        store.schedule(expire("due", now())).expect("schedule");
        store
            .schedule(expire("later", now() + Duration::days(1)))
            .expect("schedule");

        let claimed = store.claim_due(now(), 10).expect("claim");
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].attempts, 1);
        assert_eq!(claimed[0].status, StepStatus::Running);
        assert!(store.claim_due(now(), 10).expect("claim").is_empty());
    }

    #[test]
    fn recover_running_returns_steps_to_pending() {
        let store = InMemoryWorkflowStore::default();
        let record = store.schedule(expire("job", now())).expect("schedule");
        store.claim_due(now(), 10).expect("claim");

        assert_eq!(store.recover_running().expect("recover"), 1);
        let again = store.claim_due(now(), 10).expect("claim");
        assert_eq!(again[0].id, record.id);
        assert_eq!(again[0].attempts, 2);
    }

    #[test]
    fn step_names_follow_workflow() {
        let step = StepKind::ExpiringSoonReminder {
            job_id: JobId::from("job"),
            days_left: 3,
        };
        assert_eq!(step.workflow(), "job-expiration");
        assert_eq!(step.job_id(), Some(&JobId::from("job")));
    }
}
