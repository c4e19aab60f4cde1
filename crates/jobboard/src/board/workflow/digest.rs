//! Welcome email and periodic job digest for new job seekers.

use tracing::info;

use crate::board::domain::JobPostStatus;
use crate::board::notifications::{templates, DigestEntry, Mailer};
use crate::board::repository::{BoardRepository, JobQuery};

use super::WorkflowError;

pub const DIGEST_INTERVAL_DAYS: i64 = 2;
/// One digest every two days for thirty days.
pub const DIGEST_ROUNDS: u32 = 15;
pub const DIGEST_SIZE: usize = 10;

pub fn send_welcome(
    mailer: &dyn Mailer,
    email: &str,
    name: Option<&str>,
) -> Result<(), WorkflowError> {
    mailer.send(templates::job_seeker_welcome(email, name))?;
    Ok(())
}

/// Send the newest active posts. Nothing is sent when the board is empty.
pub fn send_digest(
    repository: &dyn BoardRepository,
    mailer: &dyn Mailer,
    email: &str,
) -> Result<usize, WorkflowError> {
    let page = repository.list_jobs(&JobQuery {
        status: Some(JobPostStatus::Active),
        limit: DIGEST_SIZE,
        ..JobQuery::default()
    })?;

    let mut entries = Vec::with_capacity(page.items.len());
    for job in page.items {
        let company_name = repository
            .fetch_company(&job.company_id)?
            .map(|company| company.name)
            .unwrap_or_default();
        entries.push(DigestEntry {
            job_title: job.job_title,
            company_name,
            location: job.location,
            salary_from: job.salary_from,
            salary_to: job.salary_to,
        });
    }

    if entries.is_empty() {
        info!(to = %email, "no active job posts; digest skipped");
        return Ok(0);
    }
    mailer.send(templates::job_digest(email, &entries))?;
    Ok(entries.len())
}
