use std::collections::BTreeMap;

use tracing::{debug, info};

use super::views::{conversion_rate, DailyViews, Favorite, JobAnalytics, JobApplications};
use super::{BoardError, JobBoardService};
use crate::board::access::Principal;
use crate::board::domain::{
    Application, ApplicationId, JobId, JobPostStatus, JobView, JobViewId, SavedJobId,
    SavedJobPost,
};
use crate::board::validation::ApplicationInput;

/// Views considered for the per-day breakdown.
pub const ANALYTICS_VIEW_WINDOW: usize = 100;
/// Applications listed on the analytics page.
pub const ANALYTICS_APPLICATION_WINDOW: usize = 500;

/// Request metadata recorded with a job view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewContext {
    pub user_agent: Option<String>,
    /// Raw `x-forwarded-for` header value.
    pub forwarded_for: Option<String>,
}

impl ViewContext {
    pub fn client_address(&self) -> Option<String> {
        self.forwarded_for
            .as_deref()
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(str::to_string)
    }
}

impl JobBoardService {
    pub fn apply_to_job(
        &self,
        principal: &Principal,
        job_id: &JobId,
        input: ApplicationInput,
    ) -> Result<Application, BoardError> {
        let input = input.validated()?;
        let user = self.require_user(principal)?;
        let job = self
            .repository
            .fetch_job(job_id)?
            .filter(|job| job.status == JobPostStatus::Active)
            .ok_or(BoardError::NotFound("job post"))?;

        let application = self.repository.insert_application(Application {
            id: ApplicationId::new(),
            job_id: job.id,
            user_id: user.id,
            name: input.name,
            email: input.email,
            resume: input.resume,
            cover_letter: input.cover_letter,
            created_at: Self::now(),
        })?;
        info!(job_id = %application.job_id, application_id = %application.id, "application received");
        Ok(application)
    }

    pub fn save_job(&self, principal: &Principal, job_id: &JobId) -> Result<SavedJobPost, BoardError> {
        let user = self.require_user(principal)?;
        Ok(self.repository.insert_saved(SavedJobPost {
            id: SavedJobId::new(),
            job_id: job_id.clone(),
            user_id: user.id,
            created_at: Self::now(),
        })?)
    }

    /// Remove a saved record; records of other users are reported as missing.
    pub fn unsave_job(
        &self,
        principal: &Principal,
        saved_id: &SavedJobId,
    ) -> Result<SavedJobPost, BoardError> {
        Ok(self.repository.delete_saved(saved_id, &principal.user_id)?)
    }

    pub fn favorites(&self, principal: &Principal) -> Result<Vec<Favorite>, BoardError> {
        let saved = self.repository.saved_for_user(&principal.user_id)?;
        let mut favorites = Vec::with_capacity(saved.len());
        for record in saved {
            let Some(job) = self.repository.fetch_job(&record.job_id)? else {
                continue;
            };
            let mut items = self.list_items(vec![job])?;
            if let Some(job) = items.pop() {
                favorites.push(Favorite { saved: record, job });
            }
        }
        Ok(favorites)
    }

    /// Record a view. Anonymous viewers are allowed.
    pub fn track_view(
        &self,
        principal: Option<&Principal>,
        job_id: &JobId,
        context: ViewContext,
    ) -> Result<JobView, BoardError> {
        if self.repository.fetch_job(job_id)?.is_none() {
            return Err(BoardError::NotFound("job post"));
        }
        let view = self.repository.insert_view(JobView {
            id: JobViewId::new(),
            job_id: job_id.clone(),
            user_id: principal.map(|principal| principal.user_id.clone()),
            ip_address: context.client_address(),
            user_agent: context.user_agent,
            created_at: Self::now(),
        })?;
        debug!(job_id = %view.job_id, user_id = ?view.user_id, "job view tracked");
        Ok(view)
    }

    pub fn job_applications(
        &self,
        principal: &Principal,
        job_id: &JobId,
    ) -> Result<JobApplications, BoardError> {
        let job = self.owned_job(principal, job_id)?;
        let applications = self
            .repository
            .applications_for_job(&job.id, ANALYTICS_APPLICATION_WINDOW)?;
        Ok(JobApplications { job, applications })
    }

    pub fn job_analytics(
        &self,
        principal: &Principal,
        job_id: &JobId,
    ) -> Result<JobAnalytics, BoardError> {
        let job = self.owned_job(principal, job_id)?;
        let total_views = self.repository.count_views(&job.id)?;
        let total_applications = self.repository.count_applications(&job.id)?;

        let mut by_date = BTreeMap::new();
        for view in self
            .repository
            .views_for_job(&job.id, ANALYTICS_VIEW_WINDOW)?
        {
            *by_date.entry(view.created_at.date_naive()).or_insert(0) += 1;
        }

        Ok(JobAnalytics {
            conversion_rate: conversion_rate(total_applications, total_views),
            views_by_date: by_date
                .into_iter()
                .map(|(date, count)| DailyViews { date, count })
                .collect(),
            recent_applications: self
                .repository
                .applications_for_job(&job.id, ANALYTICS_APPLICATION_WINDOW)?,
            job_id: job.id,
            job_title: job.job_title,
            total_views,
            total_applications,
        })
    }
}
