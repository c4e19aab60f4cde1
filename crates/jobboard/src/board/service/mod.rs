//! Application service for the job board. Every HTTP route and CLI command
//! funnels through [`JobBoardService`].

mod engagement;
mod jobs;
mod moderation;
mod onboarding;
mod payments;
pub mod views;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::access::{AdminPolicy, Principal};
use super::domain::{Company, JobPost, User};
use super::notifications::{MailError, Mailer};
use super::payments::{PaymentError, PaymentGateway};
use super::repository::{BoardRepository, RepositoryError};
use super::validation::ValidationErrors;
use super::webhook::{SignatureError, WebhookVerifier};
use super::workflow::expiration::ExpirationMode;
use super::workflow::{WorkflowEngine, WorkflowError, WorkflowSettings, WorkflowStore};
use crate::config::AppConfig;

pub use engagement::ViewContext;
pub use jobs::ListingFilter;
pub use payments::ActivationTrigger;

/// Collaborators the service talks to.
#[derive(Clone)]
pub struct BoardDependencies {
    pub repository: Arc<dyn BoardRepository>,
    pub payments: Arc<dyn PaymentGateway>,
    pub mailer: Arc<dyn Mailer>,
    pub workflow_store: Arc<dyn WorkflowStore>,
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub admins: AdminPolicy,
    pub public_url: String,
    /// Unset outside production; webhooks are then rejected.
    pub webhook_secret: Option<String>,
    pub signature_tolerance_secs: i64,
    pub workflow: WorkflowSettings,
    /// Show internal error details to clients.
    pub expose_internal_errors: bool,
}

impl ServiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            admins: AdminPolicy::new(&config.admin),
            public_url: config.public_url.clone(),
            webhook_secret: config.billing.webhook_secret.clone(),
            signature_tolerance_secs: config.billing.signature_tolerance_secs,
            workflow: WorkflowSettings {
                expiration: ExpirationMode::select(
                    config.environment.is_production(),
                    config.workflow.expiration_in_dev,
                ),
                max_attempts: config.workflow.max_attempts,
                public_url: config.public_url.clone(),
                ..WorkflowSettings::default()
            },
            expose_internal_errors: !config.environment.is_production(),
        }
    }
}

pub struct JobBoardService {
    repository: Arc<dyn BoardRepository>,
    payments: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    workflows: Arc<WorkflowEngine>,
    admins: AdminPolicy,
    verifier: Option<WebhookVerifier>,
    public_url: String,
    expose_internal_errors: bool,
}

impl JobBoardService {
    pub fn new(deps: BoardDependencies, settings: ServiceSettings) -> Self {
        let workflows = Arc::new(WorkflowEngine::new(
            deps.workflow_store,
            deps.repository.clone(),
            deps.mailer.clone(),
            settings.workflow,
        ));
        let verifier = settings
            .webhook_secret
            .map(|secret| WebhookVerifier::new(secret, settings.signature_tolerance_secs));

        Self {
            repository: deps.repository,
            payments: deps.payments,
            mailer: deps.mailer,
            workflows,
            admins: settings.admins,
            verifier,
            public_url: settings.public_url.trim_end_matches('/').to_string(),
            expose_internal_errors: settings.expose_internal_errors,
        }
    }

    pub fn workflows(&self) -> &Arc<WorkflowEngine> {
        &self.workflows
    }

    pub fn expose_internal_errors(&self) -> bool {
        self.expose_internal_errors
    }

    pub fn is_admin(&self, principal: &Principal) -> bool {
        self.admins.is_admin(principal)
    }

    /// Expire overdue active posts regardless of scheduled steps.
    pub fn expire_due(&self, now: DateTime<Utc>) -> Result<usize, BoardError> {
        Ok(self.workflows.sweep_expired(now)?)
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn job_url(&self, job: &JobPost) -> String {
        format!("{}/job/{}", self.public_url, job.id)
    }

    fn require_admin(&self, principal: &Principal) -> Result<(), BoardError> {
        if self.is_admin(principal) {
            Ok(())
        } else {
            Err(BoardError::Forbidden("admin access required"))
        }
    }

    fn require_company(&self, principal: &Principal) -> Result<Company, BoardError> {
        self.repository
            .company_for_user(&principal.user_id)?
            .ok_or(BoardError::Forbidden("company profile required"))
    }

    fn require_user(&self, principal: &Principal) -> Result<User, BoardError> {
        self.ensure_user(principal)
    }
}

/// Error raised by the job board service.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("validation failed")]
    Validation(#[from] ValidationErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error("payment processor error: {0}")]
    Payment(PaymentError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for BoardError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(what) => BoardError::Conflict(format!("{what} already exists")),
            RepositoryError::NotFound(what) => BoardError::NotFound(what),
            RepositoryError::Unavailable(detail) => BoardError::Storage(detail),
        }
    }
}

impl From<PaymentError> for BoardError {
    fn from(value: PaymentError) -> Self {
        match value {
            PaymentError::SessionNotFound(_) => BoardError::NotFound("checkout session"),
            other => BoardError::Payment(other),
        }
    }
}
