use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{
    Application, ApplicationId, Company, CompanyId, JobId, JobPost, JobSeeker, JobSeekerId,
    JobView, SavedJobId, SavedJobPost, User, UserId, UserType,
};
use super::lifecycle::{Transition, TransitionOutcome};
use super::repository::{BoardRepository, JobQuery, Page, RepositoryError};
use super::validation::JobInput;

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    companies: HashMap<CompanyId, Company>,
    job_seekers: HashMap<JobSeekerId, JobSeeker>,
    jobs: HashMap<JobId, JobPost>,
    applications: HashMap<ApplicationId, Application>,
    saved: HashMap<SavedJobId, SavedJobPost>,
    views: Vec<JobView>,
}

impl Tables {
    fn has_profile(&self, user_id: &UserId) -> bool {
        self.companies.values().any(|c| &c.user_id == user_id)
            || self.job_seekers.values().any(|s| &s.user_id == user_id)
    }

    fn mark_onboarded(&mut self, user_id: &UserId, user_type: UserType) -> Result<(), RepositoryError> {
        let user = self
            .users
            .get_mut(user_id)
            .ok_or(RepositoryError::NotFound("user"))?;
        user.user_type = Some(user_type);
        user.onboarding_completed = true;
        Ok(())
    }
}

/// Process-local store. Every check-then-write runs under one lock, which
/// gives the same guarantees a relational store gets from unique indexes and
/// conditional updates.
#[derive(Default, Clone)]
pub struct InMemoryBoardRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryBoardRepository {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

fn newest_first<T, F>(items: &mut [T], created_at: F)
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

impl BoardRepository for InMemoryBoardRepository {
    fn upsert_user(&self, user: User) -> Result<User, RepositoryError> {
        let mut tables = self.lock()?;
        let stored = tables
            .users
            .entry(user.id.clone())
            .and_modify(|existing| {
                if user.email.is_some() {
                    existing.email = user.email.clone();
                }
                if user.name.is_some() {
                    existing.name = user.name.clone();
                }
            })
            .or_insert(user);
        Ok(stored.clone())
    }

    fn fetch_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.lock()?.users.get(id).cloned())
    }

    fn set_payment_customer(
        &self,
        id: &UserId,
        customer_id: &str,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        let user = tables
            .users
            .get_mut(id)
            .ok_or(RepositoryError::NotFound("user"))?;
        user.payment_customer_id = Some(customer_id.to_string());
        Ok(())
    }

    fn create_company(&self, company: Company) -> Result<Company, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.has_profile(&company.user_id) {
            return Err(RepositoryError::Conflict("profile"));
        }
        tables.mark_onboarded(&company.user_id, UserType::Company)?;
        tables.companies.insert(company.id.clone(), company.clone());
        Ok(company)
    }

    fn create_job_seeker(&self, seeker: JobSeeker) -> Result<JobSeeker, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.has_profile(&seeker.user_id) {
            return Err(RepositoryError::Conflict("profile"));
        }
        tables.mark_onboarded(&seeker.user_id, UserType::JobSeeker)?;
        tables.job_seekers.insert(seeker.id.clone(), seeker.clone());
        Ok(seeker)
    }

    fn update_company(&self, company: Company) -> Result<Company, RepositoryError> {
        let mut tables = self.lock()?;
        match tables.companies.get_mut(&company.id) {
            Some(existing) if existing.user_id == company.user_id => {
                *existing = company.clone();
                Ok(company)
            }
            _ => Err(RepositoryError::NotFound("company")),
        }
    }

    fn update_job_seeker(&self, seeker: JobSeeker) -> Result<JobSeeker, RepositoryError> {
        let mut tables = self.lock()?;
        match tables.job_seekers.get_mut(&seeker.id) {
            Some(existing) if existing.user_id == seeker.user_id => {
                *existing = seeker.clone();
                Ok(seeker)
            }
            _ => Err(RepositoryError::NotFound("job seeker")),
        }
    }

    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        Ok(self.lock()?.companies.get(id).cloned())
    }

    fn company_for_user(&self, user_id: &UserId) -> Result<Option<Company>, RepositoryError> {
        Ok(self
            .lock()?
            .companies
            .values()
            .find(|company| &company.user_id == user_id)
            .cloned())
    }

    fn job_seeker_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<JobSeeker>, RepositoryError> {
        Ok(self
            .lock()?
            .job_seekers
            .values()
            .find(|seeker| &seeker.user_id == user_id)
            .cloned())
    }

    fn insert_job(&self, job: JobPost) -> Result<JobPost, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.companies.contains_key(&job.company_id) {
            return Err(RepositoryError::NotFound("company"));
        }
        if tables.jobs.contains_key(&job.id) {
            return Err(RepositoryError::Conflict("job post"));
        }
        tables.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    fn fetch_job(&self, id: &JobId) -> Result<Option<JobPost>, RepositoryError> {
        Ok(self.lock()?.jobs.get(id).cloned())
    }

    fn update_job_details(
        &self,
        id: &JobId,
        details: &JobInput,
        now: DateTime<Utc>,
    ) -> Result<JobPost, RepositoryError> {
        let mut tables = self.lock()?;
        let job = tables
            .jobs
            .get_mut(id)
            .ok_or(RepositoryError::NotFound("job post"))?;
        job.job_title = details.job_title.clone();
        job.employment_type = details.employment_type.clone();
        job.location = details.location.clone();
        job.salary_from = details.salary_from;
        job.salary_to = details.salary_to;
        job.job_description = details.job_description.clone();
        job.listing_duration = details.listing_duration;
        job.benefits = details.benefits.clone();
        job.updated_at = now;
        Ok(job.clone())
    }

    fn delete_job(&self, id: &JobId) -> Result<JobPost, RepositoryError> {
        let mut tables = self.lock()?;
        let job = tables
            .jobs
            .remove(id)
            .ok_or(RepositoryError::NotFound("job post"))?;
        tables.applications.retain(|_, application| &application.job_id != id);
        tables.saved.retain(|_, saved| &saved.job_id != id);
        tables.views.retain(|view| &view.job_id != id);
        Ok(job)
    }

    fn transition_job(
        &self,
        id: &JobId,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome<JobPost>, RepositoryError> {
        let mut tables = self.lock()?;
        let job = tables
            .jobs
            .get_mut(id)
            .ok_or(RepositoryError::NotFound("job post"))?;
        if !transition.permits(job.status) {
            return Ok(TransitionOutcome::Skipped {
                current: job.status,
            });
        }
        job.status = transition.target();
        job.updated_at = now;
        if matches!(transition, Transition::Activate | Transition::Approve) {
            job.activated_at = Some(now);
        }
        Ok(TransitionOutcome::Applied(job.clone()))
    }

    fn list_jobs(&self, query: &JobQuery) -> Result<Page<JobPost>, RepositoryError> {
        let tables = self.lock()?;
        let mut matching: Vec<JobPost> = tables
            .jobs
            .values()
            .filter(|job| query.matches(job))
            .cloned()
            .collect();
        newest_first(&mut matching, |job| job.created_at);
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(query.offset)
            .take(if query.limit == 0 { usize::MAX } else { query.limit })
            .collect();
        Ok(Page { items, total })
    }

    fn jobs_due_for_expiration(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobPost>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .jobs
            .values()
            .filter(|job| Transition::Expire.permits(job.status))
            .filter(|job| job.expires_at().is_some_and(|at| at <= now))
            .cloned()
            .collect())
    }

    fn insert_application(
        &self,
        application: Application,
    ) -> Result<Application, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.jobs.contains_key(&application.job_id) {
            return Err(RepositoryError::NotFound("job post"));
        }
        let duplicate = tables.applications.values().any(|existing| {
            existing.job_id == application.job_id && existing.user_id == application.user_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict("application"));
        }
        tables
            .applications
            .insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn applications_for_job(
        &self,
        job_id: &JobId,
        limit: usize,
    ) -> Result<Vec<Application>, RepositoryError> {
        let tables = self.lock()?;
        let mut applications: Vec<Application> = tables
            .applications
            .values()
            .filter(|application| &application.job_id == job_id)
            .cloned()
            .collect();
        newest_first(&mut applications, |application| application.created_at);
        applications.truncate(limit);
        Ok(applications)
    }

    fn count_applications(&self, job_id: &JobId) -> Result<usize, RepositoryError> {
        Ok(self
            .lock()?
            .applications
            .values()
            .filter(|application| &application.job_id == job_id)
            .count())
    }

    fn insert_saved(&self, saved: SavedJobPost) -> Result<SavedJobPost, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.jobs.contains_key(&saved.job_id) {
            return Err(RepositoryError::NotFound("job post"));
        }
        let duplicate = tables
            .saved
            .values()
            .any(|existing| existing.job_id == saved.job_id && existing.user_id == saved.user_id);
        if duplicate {
            return Err(RepositoryError::Conflict("saved job"));
        }
        tables.saved.insert(saved.id.clone(), saved.clone());
        Ok(saved)
    }

    fn delete_saved(
        &self,
        id: &SavedJobId,
        user_id: &UserId,
    ) -> Result<SavedJobPost, RepositoryError> {
        let mut tables = self.lock()?;
        match tables.saved.get(id) {
            Some(saved) if &saved.user_id == user_id => {}
            _ => return Err(RepositoryError::NotFound("saved job")),
        }
        tables
            .saved
            .remove(id)
            .ok_or(RepositoryError::NotFound("saved job"))
    }

    fn find_saved(
        &self,
        user_id: &UserId,
        job_id: &JobId,
    ) -> Result<Option<SavedJobPost>, RepositoryError> {
        Ok(self
            .lock()?
            .saved
            .values()
            .find(|saved| &saved.user_id == user_id && &saved.job_id == job_id)
            .cloned())
    }

    fn saved_for_user(&self, user_id: &UserId) -> Result<Vec<SavedJobPost>, RepositoryError> {
        let tables = self.lock()?;
        let mut saved: Vec<SavedJobPost> = tables
            .saved
            .values()
            .filter(|saved| &saved.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut saved, |saved| saved.created_at);
        Ok(saved)
    }

    fn insert_view(&self, view: JobView) -> Result<JobView, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.jobs.contains_key(&view.job_id) {
            return Err(RepositoryError::NotFound("job post"));
        }
        tables.views.push(view.clone());
        Ok(view)
    }

    fn views_for_job(&self, job_id: &JobId, limit: usize) -> Result<Vec<JobView>, RepositoryError> {
        let tables = self.lock()?;
        let mut views: Vec<JobView> = tables
            .views
            .iter()
            .filter(|view| &view.job_id == job_id)
            .cloned()
            .collect();
        newest_first(&mut views, |view| view.created_at);
        views.truncate(limit);
        Ok(views)
    }

    fn count_views(&self, job_id: &JobId) -> Result<usize, RepositoryError> {
        Ok(self
            .lock()?
            .views
            .iter()
            .filter(|view| &view.job_id == job_id)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::domain::JobPostStatus;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn seeded() -> (InMemoryBoardRepository, Company) {
        let repo = InMemoryBoardRepository::default();
        let user = User::new(UserId::from("owner"), Some("owner@acme.test".into()), None, now());
        repo.upsert_user(user).expect("user");
        let company = Company {
            id: CompanyId::from("acme"),
            user_id: UserId::from("owner"),
            name: "Acme".to_string(),
            location: "Remote".to_string(),
            about: "We make everything".to_string(),
            logo: "logo.png".to_string(),
            website: "https://acme.test".to_string(),
            x_account: None,
        };
        let company = repo.create_company(company).expect("company");
        (repo, company)
    }

    fn draft(id: &str, company: &Company, created_at: DateTime<Utc>) -> JobPost {
        JobPost {
            id: JobId::from(id),
            company_id: company.id.clone(),
            job_title: format!("Role {id}"),
            employment_type: "full-time".to_string(),
            location: "Remote".to_string(),
            salary_from: 10,
            salary_to: 20,
            job_description: "Work".to_string(),
            listing_duration: 30,
            benefits: vec!["pto".to_string()],
            status: JobPostStatus::Draft,
            created_at,
            updated_at: created_at,
            activated_at: None,
        }
    }

    #[test]
    fn company_onboarding_marks_user_and_blocks_second_profile() {
        let (repo, _) = seeded();
        let user = repo
            .fetch_user(&UserId::from("owner"))
            .expect("fetch")
            .expect("present");
        assert_eq!(user.user_type, Some(UserType::Company));
        assert!(user.onboarding_completed);

        let seeker = JobSeeker {
            id: JobSeekerId::from("seeker"),
            user_id: UserId::from("owner"),
            name: "Owner".to_string(),
            about: "Also looking".to_string(),
            resume: "cv.pdf".to_string(),
        };
        assert_eq!(
            repo.create_job_seeker(seeker),
            Err(RepositoryError::Conflict("profile"))
        );
    }

    #[test]
    fn transition_is_compare_and_set() {
        let (repo, company) = seeded();
        repo.insert_job(draft("job-1", &company, now())).expect("insert");

        let first = repo
            .transition_job(&JobId::from("job-1"), Transition::Activate, now())
            .expect("transition");
        let second = repo
            .transition_job(&JobId::from("job-1"), Transition::Activate, now())
            .expect("transition");

        assert_eq!(first.updated_count(), 1);
        assert_eq!(
            second,
            TransitionOutcome::Skipped {
                current: JobPostStatus::Active
            }
        );
        let stored = repo
            .fetch_job(&JobId::from("job-1"))
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.activated_at, Some(now()));
    }

    #[test]
    fn transition_on_missing_job_is_not_found() {
        let repo = InMemoryBoardRepository::default();
        assert_eq!(
            repo.transition_job(&JobId::from("missing"), Transition::Expire, now()),
            Err(RepositoryError::NotFound("job post"))
        );
    }

    #[test]
    fn list_jobs_filters_orders_and_pages() {
        let (repo, company) = seeded();
        for (index, id) in ["a", "b", "c"].iter().enumerate() {
            let created = now() + Duration::minutes(index as i64);
            repo.insert_job(draft(id, &company, created)).expect("insert");
            repo.transition_job(&JobId::from(*id), Transition::Activate, created)
                .expect("activate");
        }
        let mut contract = draft("d", &company, now() + Duration::minutes(10));
        contract.employment_type = "contract".to_string();
        repo.insert_job(contract).expect("insert");

        let page = repo
            .list_jobs(&JobQuery {
                status: Some(JobPostStatus::Active),
                offset: 0,
                limit: 2,
                ..JobQuery::default()
            })
            .expect("list");
        assert_eq!(page.total, 3);
        let ids: Vec<_> = page.items.iter().map(|job| job.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);

        let contracts = repo
            .list_jobs(&JobQuery {
                employment_types: vec!["Contract".to_string()],
                ..JobQuery::default()
            })
            .expect("list");
        assert_eq!(contracts.total, 1);
    }

    #[test]
    fn duplicate_application_and_saved_records_conflict() {
        let (repo, company) = seeded();
        repo.insert_job(draft("job-1", &company, now())).expect("insert");
        let application = Application {
            id: ApplicationId::from("app-1"),
            job_id: JobId::from("job-1"),
            user_id: UserId::from("seeker"),
            name: "Sam".to_string(),
            email: "sam@example.com".to_string(),
            resume: "cv.pdf".to_string(),
            cover_letter: None,
            created_at: now(),
        };
        repo.insert_application(application.clone()).expect("first");
        let mut again = application;
        again.id = ApplicationId::from("app-2");
        assert_eq!(
            repo.insert_application(again),
            Err(RepositoryError::Conflict("application"))
        );

        let saved = SavedJobPost {
            id: SavedJobId::from("saved-1"),
            job_id: JobId::from("job-1"),
            user_id: UserId::from("seeker"),
            created_at: now(),
        };
        repo.insert_saved(saved.clone()).expect("first save");
        let mut again = saved;
        again.id = SavedJobId::from("saved-2");
        assert_eq!(
            repo.insert_saved(again),
            Err(RepositoryError::Conflict("saved job"))
        );
    }

    #[test]
    fn delete_saved_requires_owner() {
        let (repo, company) = seeded();
        repo.insert_job(draft("job-1", &company, now())).expect("insert");
        let saved = SavedJobPost {
            id: SavedJobId::from("saved-1"),
            job_id: JobId::from("job-1"),
            user_id: UserId::from("seeker"),
            created_at: now(),
        };
        repo.insert_saved(saved).expect("save");
        assert_eq!(
            repo.delete_saved(&SavedJobId::from("saved-1"), &UserId::from("intruder")),
            Err(RepositoryError::NotFound("saved job"))
        );
        repo.delete_saved(&SavedJobId::from("saved-1"), &UserId::from("seeker"))
            .expect("owner deletes");
    }

    #[test]
    fn delete_job_cascades() {
        let (repo, company) = seeded();
        repo.insert_job(draft("job-1", &company, now())).expect("insert");
        repo.insert_view(JobView {
            id: crate::board::domain::JobViewId::from("view-1"),
            job_id: JobId::from("job-1"),
            user_id: None,
            user_agent: None,
            ip_address: None,
            created_at: now(),
        })
        .expect("view");
        repo.delete_job(&JobId::from("job-1")).expect("delete");
        assert_eq!(repo.count_views(&JobId::from("job-1")).expect("count"), 0);
        assert!(repo.fetch_job(&JobId::from("job-1")).expect("fetch").is_none());
    }

    #[test]
    fn due_for_expiration_uses_activation_time() {
        let (repo, company) = seeded();
        repo.insert_job(draft("job-1", &company, now())).expect("insert");
        repo.transition_job(&JobId::from("job-1"), Transition::Activate, now())
            .expect("activate");

        let before = repo
            .jobs_due_for_expiration(now() + Duration::days(29))
            .expect("query");
        let after = repo
            .jobs_due_for_expiration(now() + Duration::days(30))
            .expect("query");
        assert!(before.is_empty());
        assert_eq!(after.len(), 1);
    }
}
