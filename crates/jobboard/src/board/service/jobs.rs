use std::collections::HashMap;

use serde::Deserialize;
use tracing::info;

use super::views::{
    CheckoutStarted, CompanyPage, CompanySummary, JobDetail, JobListItem, JobListing, MyJob,
};
use super::{BoardError, JobBoardService};
use crate::board::access::Principal;
use crate::board::domain::{CompanyId, JobId, JobPost, JobPostStatus};
use crate::board::lifecycle::Transition;
use crate::board::payments::CheckoutRequest;
use crate::board::pricing::tier_for_duration;
use crate::board::repository::JobQuery;
use crate::board::validation::{JobInput, ValidationErrors};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 50;

/// Public listing filter. `location` of "worldwide" matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListingFilter {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub employment_types: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl ListingFilter {
    fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    fn page_size(&self) -> usize {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    fn location(&self) -> Option<String> {
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|location| !location.is_empty() && !location.eq_ignore_ascii_case("worldwide"))
            .map(str::to_string)
    }
}

impl JobBoardService {
    /// Store a draft post and open a checkout session for it. The post becomes
    /// active once payment is confirmed.
    pub fn create_job(
        &self,
        principal: &Principal,
        input: JobInput,
    ) -> Result<CheckoutStarted, BoardError> {
        let input = input.validated()?;
        let tier = tier_for_duration(input.listing_duration).ok_or_else(|| {
            ValidationErrors::single("listing_duration", "Invalid listing duration selected")
        })?;
        let user = self.require_user(principal)?;
        let company = self.require_company(principal)?;

        let customer_id = match user.payment_customer_id {
            Some(customer_id) => customer_id,
            None => {
                let email = user.email.as_deref().ok_or_else(|| {
                    BoardError::BadRequest("an email address is required to pay".to_string())
                })?;
                let customer_id = self
                    .payments
                    .create_customer(email, user.name.as_deref())?;
                self.repository
                    .set_payment_customer(&user.id, &customer_id)?;
                customer_id
            }
        };

        let now = Self::now();
        let job = self.repository.insert_job(JobPost {
            id: JobId::new(),
            company_id: company.id,
            job_title: input.job_title,
            employment_type: input.employment_type,
            location: input.location,
            salary_from: input.salary_from,
            salary_to: input.salary_to,
            job_description: input.job_description,
            listing_duration: input.listing_duration,
            benefits: input.benefits,
            status: JobPostStatus::Draft,
            created_at: now,
            updated_at: now,
            activated_at: None,
        })?;

        let session = self.payments.create_checkout_session(CheckoutRequest {
            customer_id,
            tier,
            job_id: job.id.clone(),
            success_url: format!(
                "{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}",
                self.public_url
            ),
            cancel_url: format!("{}/payment/cancel", self.public_url),
        })?;
        info!(job_id = %job.id, session_id = %session.id, days = tier.days, "checkout started");

        Ok(CheckoutStarted {
            job_id: job.id,
            session_id: session.id,
            checkout_url: session.url,
        })
    }

    pub(super) fn owned_job(&self, principal: &Principal, job_id: &JobId) -> Result<JobPost, BoardError> {
        let company = self
            .repository
            .company_for_user(&principal.user_id)?
            .ok_or(BoardError::NotFound("job post"))?;
        self.repository
            .fetch_job(job_id)?
            .filter(|job| job.company_id == company.id)
            .ok_or(BoardError::NotFound("job post"))
    }

    /// Edit a post owned by the principal's company. Status is left alone.
    pub fn update_own_job(
        &self,
        principal: &Principal,
        job_id: &JobId,
        input: JobInput,
    ) -> Result<JobPost, BoardError> {
        let input = input.validated()?;
        self.owned_job(principal, job_id)?;
        Ok(self
            .repository
            .update_job_details(job_id, &input, Self::now())?)
    }

    pub fn delete_own_job(&self, principal: &Principal, job_id: &JobId) -> Result<(), BoardError> {
        self.owned_job(principal, job_id)?;
        let job = self.repository.delete_job(job_id)?;
        info!(job_id = %job.id, "job post deleted by owner");
        Ok(())
    }

    pub(crate) fn list_items(&self, jobs: Vec<JobPost>) -> Result<Vec<JobListItem>, BoardError> {
        let mut companies: HashMap<CompanyId, Option<CompanySummary>> = HashMap::new();
        let mut items = Vec::with_capacity(jobs.len());
        for job in jobs {
            let company = match companies.get(&job.company_id) {
                Some(summary) => summary.clone(),
                None => {
                    let summary = self
                        .repository
                        .fetch_company(&job.company_id)?
                        .as_ref()
                        .map(CompanySummary::from);
                    companies.insert(job.company_id.clone(), summary.clone());
                    summary
                }
            };
            items.push(JobListItem { job, company });
        }
        Ok(items)
    }

    /// Active posts, newest first.
    pub fn list_jobs(&self, filter: &ListingFilter) -> Result<JobListing, BoardError> {
        let page = filter.page();
        let page_size = filter.page_size();
        let result = self.repository.list_jobs(&JobQuery {
            status: Some(JobPostStatus::Active),
            company_id: None,
            employment_types: filter
                .employment_types
                .iter()
                .map(|kind| kind.trim().to_string())
                .filter(|kind| !kind.is_empty())
                .collect(),
            location: filter.location(),
            offset: (page - 1).saturating_mul(page_size),
            limit: page_size,
        })?;

        Ok(JobListing {
            items: self.list_items(result.items)?,
            page,
            page_size,
            total: result.total,
            total_pages: result.total.div_ceil(page_size),
        })
    }

    /// Only active posts are public; owners and admins also see the rest.
    pub fn job_detail(
        &self,
        principal: Option<&Principal>,
        job_id: &JobId,
    ) -> Result<JobDetail, BoardError> {
        let job = self
            .repository
            .fetch_job(job_id)?
            .ok_or(BoardError::NotFound("job post"))?;
        let company = self.repository.fetch_company(&job.company_id)?;
        let is_owner = match (principal, &company) {
            (Some(principal), Some(company)) => company.user_id == principal.user_id,
            _ => false,
        };
        let is_admin = principal.is_some_and(|principal| self.is_admin(principal));
        if !Transition::is_publicly_visible(job.status) && !is_owner && !is_admin {
            return Err(BoardError::NotFound("job post"));
        }

        let saved = match principal {
            Some(principal) => self
                .repository
                .find_saved(&principal.user_id, &job.id)?
                .map(|saved| saved.id),
            None => None,
        };
        Ok(JobDetail {
            job,
            company,
            saved,
            is_owner,
        })
    }

    pub fn company_page(&self, company_id: &CompanyId) -> Result<CompanyPage, BoardError> {
        let company = self
            .repository
            .fetch_company(company_id)?
            .ok_or(BoardError::NotFound("company"))?;
        let jobs = self
            .repository
            .list_jobs(&JobQuery {
                status: Some(JobPostStatus::Active),
                company_id: Some(company.id.clone()),
                ..JobQuery::default()
            })?
            .items;
        Ok(CompanyPage { company, jobs })
    }

    /// Every post of the principal's company with its application count.
    pub fn my_jobs(&self, principal: &Principal) -> Result<Vec<MyJob>, BoardError> {
        let company = self.require_company(principal)?;
        let jobs = self
            .repository
            .list_jobs(&JobQuery {
                company_id: Some(company.id),
                ..JobQuery::default()
            })?
            .items;
        jobs.into_iter()
            .map(|job| -> Result<MyJob, BoardError> {
                let application_count = self.repository.count_applications(&job.id)?;
                Ok(MyJob {
                    job,
                    application_count,
                })
            })
            .collect()
    }
}
