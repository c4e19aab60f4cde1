//! Expiration schedule for activated job posts.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::board::domain::{JobId, JobPost, JobPostStatus};
use crate::board::lifecycle::{Transition, TransitionOutcome};
use crate::board::notifications::{templates, Mailer};
use crate::board::repository::{company_owner_email, BoardRepository, RepositoryError};

use super::WorkflowError;

/// Days of notice given before a post expires.
pub const REMINDER_LEAD_DAYS: u32 = 3;
/// Compressed listing length, in days, used when expiration runs outside production.
pub const COMPRESSED_LISTING_DAYS: f64 = 0.0015;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationMode {
    /// Full schedule with the reminder.
    Production,
    /// Development opt-in: expire after a few minutes, no reminder.
    Compressed,
    /// Development default: nothing is scheduled.
    Disabled,
}

impl ExpirationMode {
    pub fn select(production: bool, expiration_in_dev: bool) -> Self {
        match (production, expiration_in_dev) {
            (true, _) => ExpirationMode::Production,
            (false, true) => ExpirationMode::Compressed,
            (false, false) => ExpirationMode::Disabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub after: Duration,
    pub days_left: u32,
}

/// When to remind and when to expire, both relative to activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirationPlan {
    pub reminder: Option<Reminder>,
    pub expire_after: Duration,
}

pub fn plan(listing_days: u32, mode: ExpirationMode) -> Option<ExpirationPlan> {
    match mode {
        ExpirationMode::Disabled => None,
        ExpirationMode::Compressed => Some(ExpirationPlan {
            reminder: None,
            expire_after: Duration::milliseconds(
                (COMPRESSED_LISTING_DAYS * 24.0 * 60.0 * 60.0 * 1000.0).round() as i64,
            ),
        }),
        ExpirationMode::Production if listing_days > REMINDER_LEAD_DAYS => Some(ExpirationPlan {
            reminder: Some(Reminder {
                after: Duration::days(i64::from(listing_days - REMINDER_LEAD_DAYS)),
                days_left: REMINDER_LEAD_DAYS,
            }),
            expire_after: Duration::days(i64::from(listing_days)),
        }),
        ExpirationMode::Production => Some(ExpirationPlan {
            reminder: None,
            expire_after: Duration::days(i64::from(listing_days)),
        }),
    }
}

/// Email the owner that the post expires soon, but only while it is still active.
pub fn send_reminder(
    repository: &dyn BoardRepository,
    mailer: &dyn Mailer,
    public_url: &str,
    job_id: &JobId,
    days_left: u32,
) -> Result<bool, WorkflowError> {
    let Some(job) = repository.fetch_job(job_id)? else {
        info!(job_id = %job_id, "job post gone before reminder");
        return Ok(false);
    };
    if job.status != JobPostStatus::Active {
        info!(job_id = %job_id, status = %job.status, "skipping reminder for inactive post");
        return Ok(false);
    }
    let Some(email) = company_owner_email(repository, &job.company_id)? else {
        warn!(job_id = %job_id, "no owner email for reminder");
        return Ok(false);
    };

    let url = format!("{}/job/{}", public_url.trim_end_matches('/'), job.id);
    mailer.send(templates::job_expiring_soon(
        &email,
        &job.job_title,
        &url,
        days_left,
    ))?;
    Ok(true)
}

/// Move an active post to expired and notify the owner. Returns the post when
/// this call performed the transition.
pub fn expire_job(
    repository: &dyn BoardRepository,
    mailer: &dyn Mailer,
    job_id: &JobId,
    now: DateTime<Utc>,
) -> Result<Option<JobPost>, WorkflowError> {
    let job = match repository.transition_job(job_id, Transition::Expire, now) {
        Ok(TransitionOutcome::Applied(job)) => job,
        Ok(TransitionOutcome::Skipped { current }) => {
            info!(job_id = %job_id, status = %current, "job post not active; expiration skipped");
            return Ok(None);
        }
        Err(RepositoryError::NotFound(_)) => {
            info!(job_id = %job_id, "job post gone before expiration");
            return Ok(None);
        }
        Err(other) => return Err(other.into()),
    };

    info!(job_id = %job.id, "job post expired");
    match company_owner_email(repository, &job.company_id)? {
        Some(email) => mailer.send(templates::job_expired(&email, &job.job_title))?,
        None => warn!(job_id = %job.id, "no owner email for expiration notice"),
    }
    Ok(Some(job))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_listings_get_a_reminder_three_days_out() {
        let plan = plan(30, ExpirationMode::Production).expect("plan");
        assert_eq!(
            plan.reminder,
            Some(Reminder {
                after: Duration::days(27),
                days_left: 3
            })
        );
        assert_eq!(plan.expire_after, Duration::days(30));
    }

    #[test]
    fn short_listings_skip_the_reminder() {
        let plan = plan(3, ExpirationMode::Production).expect("plan");
        assert_eq!(plan.reminder, None);
        assert_eq!(plan.expire_after, Duration::days(3));
    }

    #[test]
    fn development_modes() {
        assert_eq!(plan(30, ExpirationMode::Disabled), None);
        let compressed = plan(90, ExpirationMode::Compressed).expect("plan");
        assert_eq!(compressed.reminder, None);
        assert_eq!(compressed.expire_after, Duration::milliseconds(129_600));
    }

    #[test]
    fn mode_selection() {
        assert_eq!(ExpirationMode::select(true, false), ExpirationMode::Production);
        assert_eq!(ExpirationMode::select(false, true), ExpirationMode::Compressed);
        assert_eq!(ExpirationMode::select(false, false), ExpirationMode::Disabled);
    }
}
