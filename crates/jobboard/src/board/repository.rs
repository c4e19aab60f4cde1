use chrono::{DateTime, Utc};

use super::domain::{
    Application, Company, CompanyId, JobId, JobPost, JobPostStatus, JobSeeker, JobView,
    SavedJobId, SavedJobPost, User, UserId,
};
use super::lifecycle::{Transition, TransitionOutcome};
use super::validation::JobInput;

/// Filter for job post listings. Results are ordered newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    pub status: Option<JobPostStatus>,
    pub company_id: Option<CompanyId>,
    /// Any-of match on employment type; empty means no filter.
    pub employment_types: Vec<String>,
    /// Exact location match.
    pub location: Option<String>,
    pub offset: usize,
    pub limit: usize,
}

impl JobQuery {
    pub fn matches(&self, job: &JobPost) -> bool {
        self.status.map_or(true, |status| job.status == status)
            && self
                .company_id
                .as_ref()
                .map_or(true, |company| &job.company_id == company)
            && (self.employment_types.is_empty()
                || self
                    .employment_types
                    .iter()
                    .any(|kind| kind.eq_ignore_ascii_case(&job.employment_type)))
            && self
                .location
                .as_ref()
                .map_or(true, |location| location.eq_ignore_ascii_case(&job.location))
    }
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Storage abstraction over the relational model.
///
/// Implementations enforce the uniqueness rules (one application and one saved
/// record per user and job, one profile per user) and apply status transitions
/// atomically.
pub trait BoardRepository: Send + Sync {
    /// Insert the user if missing, otherwise refresh email and name when provided.
    fn upsert_user(&self, user: User) -> Result<User, RepositoryError>;
    fn fetch_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    fn set_payment_customer(&self, id: &UserId, customer_id: &str)
        -> Result<(), RepositoryError>;

    /// Create the company profile and mark the owner onboarded as a company.
    fn create_company(&self, company: Company) -> Result<Company, RepositoryError>;
    /// Create the job seeker profile and mark the owner onboarded as a job seeker.
    fn create_job_seeker(&self, seeker: JobSeeker) -> Result<JobSeeker, RepositoryError>;
    fn update_company(&self, company: Company) -> Result<Company, RepositoryError>;
    fn update_job_seeker(&self, seeker: JobSeeker) -> Result<JobSeeker, RepositoryError>;
    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError>;
    fn company_for_user(&self, user_id: &UserId) -> Result<Option<Company>, RepositoryError>;
    fn job_seeker_for_user(&self, user_id: &UserId)
        -> Result<Option<JobSeeker>, RepositoryError>;

    fn insert_job(&self, job: JobPost) -> Result<JobPost, RepositoryError>;
    fn fetch_job(&self, id: &JobId) -> Result<Option<JobPost>, RepositoryError>;
    /// Replace the editable fields. Status is never touched here.
    fn update_job_details(
        &self,
        id: &JobId,
        details: &JobInput,
        now: DateTime<Utc>,
    ) -> Result<JobPost, RepositoryError>;
    /// Delete the post together with its applications, saved records and views.
    fn delete_job(&self, id: &JobId) -> Result<JobPost, RepositoryError>;
    /// Apply `transition` only if the current status permits it.
    fn transition_job(
        &self,
        id: &JobId,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome<JobPost>, RepositoryError>;
    fn list_jobs(&self, query: &JobQuery) -> Result<Page<JobPost>, RepositoryError>;
    /// Active posts whose listing duration has elapsed at `now`.
    fn jobs_due_for_expiration(&self, now: DateTime<Utc>)
        -> Result<Vec<JobPost>, RepositoryError>;

    fn insert_application(&self, application: Application)
        -> Result<Application, RepositoryError>;
    fn applications_for_job(
        &self,
        job_id: &JobId,
        limit: usize,
    ) -> Result<Vec<Application>, RepositoryError>;
    fn count_applications(&self, job_id: &JobId) -> Result<usize, RepositoryError>;

    fn insert_saved(&self, saved: SavedJobPost) -> Result<SavedJobPost, RepositoryError>;
    /// Delete a saved record owned by `user_id`.
    fn delete_saved(
        &self,
        id: &SavedJobId,
        user_id: &UserId,
    ) -> Result<SavedJobPost, RepositoryError>;
    fn find_saved(
        &self,
        user_id: &UserId,
        job_id: &JobId,
    ) -> Result<Option<SavedJobPost>, RepositoryError>;
    fn saved_for_user(&self, user_id: &UserId) -> Result<Vec<SavedJobPost>, RepositoryError>;

    fn insert_view(&self, view: JobView) -> Result<JobView, RepositoryError>;
    fn views_for_job(&self, job_id: &JobId, limit: usize) -> Result<Vec<JobView>, RepositoryError>;
    fn count_views(&self, job_id: &JobId) -> Result<usize, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Email address of the user owning `company_id`, if any.
pub fn company_owner_email(
    repository: &dyn BoardRepository,
    company_id: &CompanyId,
) -> Result<Option<String>, RepositoryError> {
    let Some(company) = repository.fetch_company(company_id)? else {
        return Ok(None);
    };
    Ok(repository
        .fetch_user(&company.user_id)?
        .and_then(|user| user.email))
}
