use jobboard::board::access::Principal;
use jobboard::board::service::{ActivationTrigger, JobBoardService};
use jobboard::board::validation::{CompanyInput, JobInput};
use jobboard::error::AppError;
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;
use tracing::info;

/// One listing per row. Rows sharing an `owner_id` belong to one company,
/// whose profile is taken from the first row seen.
#[derive(Debug, Deserialize)]
pub(crate) struct SeedRow {
    owner_id: String,
    owner_email: String,
    company_name: String,
    company_location: String,
    company_about: String,
    company_logo: String,
    company_website: String,
    job_title: String,
    employment_type: String,
    job_location: String,
    salary_from: u32,
    salary_to: u32,
    job_description: String,
    listing_duration: u32,
    /// Semicolon separated.
    benefits: String,
}

impl SeedRow {
    fn principal(&self) -> Principal {
        Principal::new(self.owner_id.trim()).with_email(self.owner_email.trim())
    }

    fn company(&self) -> CompanyInput {
        CompanyInput {
            name: self.company_name.clone(),
            location: self.company_location.clone(),
            about: self.company_about.clone(),
            logo: self.company_logo.clone(),
            website: self.company_website.clone(),
            x_account: None,
        }
    }

    fn job(&self) -> JobInput {
        JobInput {
            job_title: self.job_title.clone(),
            employment_type: self.employment_type.clone(),
            location: self.job_location.clone(),
            salary_from: self.salary_from,
            salary_to: self.salary_to,
            job_description: self.job_description.clone(),
            listing_duration: self.listing_duration,
            benefits: self
                .benefits
                .split(';')
                .map(|benefit| benefit.trim().to_string())
                .filter(|benefit| !benefit.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SeedSummary {
    pub(crate) companies: usize,
    pub(crate) jobs: usize,
}

/// Load companies and active listings from CSV. Listings go through the same
/// create and activate path as paid posts, so expiration is scheduled.
pub(crate) fn load<R: Read>(service: &JobBoardService, reader: R) -> Result<SeedSummary, AppError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut summary = SeedSummary::default();
    let mut owners = HashSet::new();

    for (index, record) in csv_reader.deserialize::<SeedRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = record.map_err(|err| AppError::Seed(format!("line {line}: {err}")))?;
        let principal = row.principal();

        if owners.insert(row.owner_id.clone()) {
            let account = service.account(&principal)?;
            if account.company.is_none() {
                service
                    .create_company(&principal, row.company())
                    .map_err(|err| AppError::Seed(format!("line {line}: {err}")))?;
                summary.companies += 1;
            }
        }

        let started = service
            .create_job(&principal, row.job())
            .map_err(|err| AppError::Seed(format!("line {line}: {err}")))?;
        service.activate_paid_job(&started.job_id, ActivationTrigger::Import)?;
        summary.jobs += 1;
    }

    info!(companies = summary.companies, jobs = summary.jobs, "seed data loaded");
    Ok(summary)
}
