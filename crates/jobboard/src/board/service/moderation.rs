use tracing::{info, warn};

use super::views::JobListItem;
use super::{BoardError, JobBoardService};
use crate::board::access::Principal;
use crate::board::domain::{JobId, JobPost, JobPostStatus};
use crate::board::lifecycle::{Transition, TransitionOutcome};
use crate::board::notifications::{templates, OutboundEmail};
use crate::board::repository::{company_owner_email, JobQuery};
use crate::board::validation::JobInput;

impl JobBoardService {
    fn moderate(
        &self,
        principal: &Principal,
        job_id: &JobId,
        transition: Transition,
    ) -> Result<JobPost, BoardError> {
        self.require_admin(principal)?;
        match self
            .repository
            .transition_job(job_id, transition, Self::now())?
        {
            TransitionOutcome::Applied(job) => {
                info!(
                    job_id = %job.id,
                    action = transition.label(),
                    admin = ?principal.email,
                    "job post moderated"
                );
                Ok(job)
            }
            TransitionOutcome::Skipped { current } => Err(BoardError::Conflict(format!(
                "job post is {} and cannot be moved to {}",
                current,
                transition.target()
            ))),
        }
    }

    fn notify_owner<F>(&self, job: &JobPost, email: F) -> Result<(), BoardError>
    where
        F: FnOnce(&str) -> OutboundEmail,
    {
        match company_owner_email(self.repository.as_ref(), &job.company_id)? {
            Some(to) => self.mailer.send(email(&to))?,
            None => warn!(job_id = %job.id, "no owner email for moderation notice"),
        }
        Ok(())
    }

    pub fn approve_job(&self, principal: &Principal, job_id: &JobId) -> Result<JobPost, BoardError> {
        let job = self.moderate(principal, job_id, Transition::Approve)?;
        let url = self.job_url(&job);
        self.notify_owner(&job, |to| templates::job_approved(to, &job.job_title, &url))?;
        Ok(job)
    }

    pub fn reject_job(&self, principal: &Principal, job_id: &JobId) -> Result<JobPost, BoardError> {
        let job = self.moderate(principal, job_id, Transition::Reject)?;
        self.notify_owner(&job, |to| templates::job_rejected(to, &job.job_title))?;
        Ok(job)
    }

    pub fn admin_update_job(
        &self,
        principal: &Principal,
        job_id: &JobId,
        input: JobInput,
    ) -> Result<JobPost, BoardError> {
        self.require_admin(principal)?;
        let input = input.validated()?;
        Ok(self
            .repository
            .update_job_details(job_id, &input, Self::now())?)
    }

    pub fn admin_delete_job(&self, principal: &Principal, job_id: &JobId) -> Result<(), BoardError> {
        self.require_admin(principal)?;
        let job = self.repository.delete_job(job_id)?;
        info!(job_id = %job.id, admin = ?principal.email, "job post deleted by admin");
        Ok(())
    }

    /// Every post regardless of status, newest first.
    pub fn admin_list_jobs(
        &self,
        principal: &Principal,
        status: Option<JobPostStatus>,
    ) -> Result<Vec<JobListItem>, BoardError> {
        self.require_admin(principal)?;
        let jobs = self
            .repository
            .list_jobs(&JobQuery {
                status,
                ..JobQuery::default()
            })?
            .items;
        self.list_items(jobs)
    }
}
