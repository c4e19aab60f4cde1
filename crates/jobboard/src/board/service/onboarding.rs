use tracing::info;

use super::views::AccountView;
use super::{BoardError, JobBoardService};
use crate::board::access::Principal;
use crate::board::domain::{Company, CompanyId, JobSeeker, JobSeekerId, User};
use crate::board::validation::{CompanyInput, JobSeekerInput};
use crate::board::workflow::WorkflowEvent;

impl JobBoardService {
    /// Provision the principal as a user, refreshing email and name.
    pub fn ensure_user(&self, principal: &Principal) -> Result<User, BoardError> {
        let user = User::new(
            principal.user_id.clone(),
            principal.email.clone(),
            principal.name.clone(),
            Self::now(),
        );
        Ok(self.repository.upsert_user(user)?)
    }

    pub fn account(&self, principal: &Principal) -> Result<AccountView, BoardError> {
        let user = self.ensure_user(principal)?;
        Ok(AccountView {
            company: self.repository.company_for_user(&user.id)?,
            job_seeker: self.repository.job_seeker_for_user(&user.id)?,
            is_admin: self.is_admin(principal),
            user,
        })
    }

    pub fn create_company(
        &self,
        principal: &Principal,
        input: CompanyInput,
    ) -> Result<Company, BoardError> {
        let input = input.validated()?;
        let user = self.ensure_user(principal)?;
        let company = self.repository.create_company(Company {
            id: CompanyId::new(),
            user_id: user.id,
            name: input.name,
            location: input.location,
            about: input.about,
            logo: input.logo,
            website: input.website,
            x_account: input.x_account,
        })?;
        info!(company_id = %company.id, user_id = %company.user_id, "company onboarded");
        Ok(company)
    }

    pub fn create_job_seeker(
        &self,
        principal: &Principal,
        input: JobSeekerInput,
    ) -> Result<JobSeeker, BoardError> {
        let input = input.validated()?;
        let user = self.ensure_user(principal)?;
        let seeker = self.repository.create_job_seeker(JobSeeker {
            id: JobSeekerId::new(),
            user_id: user.id.clone(),
            name: input.name,
            about: input.about,
            resume: input.resume,
        })?;
        info!(job_seeker_id = %seeker.id, user_id = %user.id, "job seeker onboarded");

        self.workflows.send(
            WorkflowEvent::JobSeekerCreated {
                user_id: user.id,
                email: user.email,
                name: user.name.or_else(|| Some(seeker.name.clone())),
            },
            Self::now(),
        )?;
        Ok(seeker)
    }

    pub fn update_company(
        &self,
        principal: &Principal,
        input: CompanyInput,
    ) -> Result<Company, BoardError> {
        let input = input.validated()?;
        let existing = self
            .repository
            .company_for_user(&principal.user_id)?
            .ok_or(BoardError::NotFound("company"))?;
        Ok(self.repository.update_company(Company {
            name: input.name,
            location: input.location,
            about: input.about,
            logo: input.logo,
            website: input.website,
            x_account: input.x_account,
            ..existing
        })?)
    }

    pub fn update_job_seeker(
        &self,
        principal: &Principal,
        input: JobSeekerInput,
    ) -> Result<JobSeeker, BoardError> {
        let input = input.validated()?;
        let existing = self
            .repository
            .job_seeker_for_user(&principal.user_id)?
            .ok_or(BoardError::NotFound("job seeker"))?;
        Ok(self.repository.update_job_seeker(JobSeeker {
            name: input.name,
            about: input.about,
            resume: input.resume,
            ..existing
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::board::domain::UserType;
    use crate::board::service::BoardError;
    use crate::board::validation::JobSeekerInput;
    use crate::board::workflow::{StepKind, WorkflowStore};

    fn seeker_input() -> JobSeekerInput {
        JobSeekerInput {
            name: "Sam Seeker".to_string(),
            about: "Systems programmer looking for work.".to_string(),
            resume: "https://files.example.com/sam.pdf".to_string(),
        }
    }

    #[test]
    fn company_onboarding_happens_once() {
        let h = harness();
        h.service
            .create_company(&owner(), company_input())
            .expect("first onboarding");
        let account = h.service.account(&owner()).expect("account");
        assert!(account.user.onboarding_completed);
        assert_eq!(account.user.user_type, Some(UserType::Company));

        let err = h
            .service
            .create_job_seeker(&owner(), seeker_input())
            .expect_err("second profile");
        assert!(matches!(err, BoardError::Conflict(_)));
    }

    #[test]
    fn job_seeker_onboarding_schedules_welcome_and_digest() {
        let h = harness();
        h.service
            .create_job_seeker(&seeker(), seeker_input())
            .expect("onboarding");

        let steps = h.store.list().expect("steps");
        assert!(steps
            .iter()
            .any(|record| matches!(record.step, StepKind::SendWelcome { .. })));
        assert!(steps
            .iter()
            .any(|record| matches!(record.step, StepKind::SendDigest { round: 1, .. })));
    }

    #[test]
    fn invalid_profile_reports_fields() {
        let h = harness();
        let mut input = company_input();
        input.website = "acme".to_string();
        match h.service.create_company(&owner(), input) {
            Err(BoardError::Validation(errors)) => {
                assert!(errors.fields.contains_key("website"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn update_requires_existing_profile() {
        let h = harness();
        let err = h
            .service
            .update_company(&owner(), company_input())
            .expect_err("no profile yet");
        assert!(matches!(err, BoardError::NotFound("company")));
    }
}
