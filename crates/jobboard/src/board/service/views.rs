//! Response shapes returned by the service.

use chrono::NaiveDate;
use serde::Serialize;

use crate::board::domain::{
    Application, Company, CompanyId, JobId, JobPost, JobSeeker, SavedJobPost, SavedJobId, User,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub user: User,
    pub company: Option<Company>,
    pub job_seeker: Option<JobSeeker>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutStarted {
    pub job_id: JobId,
    pub session_id: String,
    pub checkout_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanySummary {
    pub id: CompanyId,
    pub name: String,
    pub logo: String,
    pub location: String,
}

impl From<&Company> for CompanySummary {
    fn from(company: &Company) -> Self {
        Self {
            id: company.id.clone(),
            name: company.name.clone(),
            logo: company.logo.clone(),
            location: company.location.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobListItem {
    #[serde(flatten)]
    pub job: JobPost,
    pub company: Option<CompanySummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobListing {
    pub items: Vec<JobListItem>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: JobPost,
    pub company: Option<Company>,
    /// Saved record of the current viewer, if any.
    pub saved: Option<SavedJobId>,
    pub is_owner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyPage {
    pub company: Company,
    pub jobs: Vec<JobPost>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MyJob {
    #[serde(flatten)]
    pub job: JobPost,
    pub application_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Favorite {
    pub saved: SavedJobPost,
    pub job: JobListItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyViews {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobAnalytics {
    pub job_id: JobId,
    pub job_title: String,
    pub total_views: usize,
    pub total_applications: usize,
    /// Percentage with two decimals, `"0.00"` when there are no views.
    pub conversion_rate: String,
    pub views_by_date: Vec<DailyViews>,
    pub recent_applications: Vec<Application>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobApplications {
    pub job: JobPost,
    pub applications: Vec<Application>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activation {
    pub ok: bool,
    pub updated_count: u64,
    pub job_id: JobId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortalLink {
    pub url: String,
}

pub fn conversion_rate(applications: usize, views: usize) -> String {
    if views == 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", applications as f64 / views as f64 * 100.0)
}
