use tracing::{error, info, warn};

use super::views::{Activation, PortalLink};
use super::{BoardError, JobBoardService};
use crate::board::access::Principal;
use crate::board::domain::{JobId, UserType};
use crate::board::lifecycle::{Transition, TransitionOutcome};
use crate::board::payments::PaymentStatus;
use crate::board::repository::RepositoryError;
use crate::board::webhook::{WebhookEvent, CHECKOUT_COMPLETED};
use crate::board::workflow::WorkflowEvent;

/// Which path confirmed the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationTrigger {
    Webhook,
    Poll,
    /// Listings loaded from a seed file.
    Import,
}

impl ActivationTrigger {
    pub fn label(self) -> &'static str {
        match self {
            ActivationTrigger::Webhook => "webhook",
            ActivationTrigger::Poll => "poll",
            ActivationTrigger::Import => "import",
        }
    }
}

impl JobBoardService {
    /// Move a paid draft to active. Only the caller that wins the transition
    /// schedules expiration; everyone else gets `updated_count == 0`, as does
    /// a payment for a post that has since been deleted.
    pub fn activate_paid_job(
        &self,
        job_id: &JobId,
        trigger: ActivationTrigger,
    ) -> Result<Activation, BoardError> {
        let now = Self::now();
        let outcome = match self
            .repository
            .transition_job(job_id, Transition::Activate, now)
        {
            Ok(outcome) => outcome,
            Err(RepositoryError::NotFound(_)) => {
                warn!(job_id = %job_id, trigger = trigger.label(), "paid job post no longer exists");
                return Ok(Activation {
                    ok: true,
                    updated_count: 0,
                    job_id: job_id.clone(),
                });
            }
            Err(other) => return Err(other.into()),
        };
        let updated_count = outcome.updated_count();

        match outcome {
            TransitionOutcome::Applied(job) => {
                info!(job_id = %job.id, trigger = trigger.label(), "job post activated");
                // The post is already active; the expire sweep covers a lost schedule.
                if let Err(err) = self.workflows.send(
                    WorkflowEvent::JobActivated {
                        job_id: job.id.clone(),
                        expiration_days: job.listing_duration,
                    },
                    now,
                ) {
                    error!(job_id = %job.id, error = %err, "failed to schedule job expiration");
                }
            }
            TransitionOutcome::Skipped { current } => {
                info!(
                    job_id = %job_id,
                    trigger = trigger.label(),
                    status = %current,
                    "activation already applied"
                );
            }
        }

        Ok(Activation {
            ok: true,
            updated_count,
            job_id: job_id.clone(),
        })
    }

    /// Verify and handle a payment webhook delivery. Unrelated event types are
    /// acknowledged without effect.
    pub fn handle_payment_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<Option<Activation>, BoardError> {
        let verifier = self.verifier.as_ref().ok_or_else(|| {
            BoardError::BadRequest("webhook signing secret is not configured".to_string())
        })?;
        if let Err(err) = verifier.verify(payload, signature, Self::now()) {
            warn!(error = %err, "payment webhook signature verification failed");
            return Err(err.into());
        }

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|err| BoardError::BadRequest(format!("invalid webhook payload: {err}")))?;
        if event.kind != CHECKOUT_COMPLETED {
            info!(event_id = %event.id, kind = %event.kind, "ignoring payment event");
            return Ok(None);
        }

        let session = event
            .checkout_session()
            .map_err(|err| BoardError::BadRequest(format!("invalid checkout session: {err}")))?;
        let Some(job_id) = session.job_id() else {
            warn!(session_id = %session.id, "no job id in checkout session metadata");
            return Err(BoardError::BadRequest(
                "No job ID found in session metadata".to_string(),
            ));
        };
        self.activate_paid_job(&job_id, ActivationTrigger::Webhook)
            .map(Some)
    }

    /// Activation driven by the browser returning from checkout.
    pub fn activate_from_session(&self, session_id: Option<&str>) -> Result<Activation, BoardError> {
        let session_id = session_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BoardError::BadRequest("Missing session_id".to_string()))?;

        let session = self.payments.retrieve_checkout_session(session_id)?;
        if session.payment_status != PaymentStatus::Paid {
            return Err(BoardError::BadRequest("Payment not completed".to_string()));
        }
        let job_id = session
            .job_id()
            .ok_or_else(|| BoardError::BadRequest("Missing job id".to_string()))?;
        self.activate_paid_job(&job_id, ActivationTrigger::Poll)
    }

    /// Billing portal link for company accounts and admins.
    pub fn billing_portal(&self, principal: &Principal) -> Result<PortalLink, BoardError> {
        let user = self.require_user(principal)?;
        let admin = self.is_admin(principal);
        if user.user_type == Some(UserType::JobSeeker) && !admin {
            return Err(BoardError::Forbidden(
                "Billing is only available for company accounts.",
            ));
        }

        let customer_id = match user.payment_customer_id {
            Some(customer_id) => customer_id,
            None => {
                let email = user.email.as_deref().ok_or_else(|| {
                    BoardError::BadRequest("an email address is required for billing".to_string())
                })?;
                let customer_id = self.payments.create_customer(email, user.name.as_deref())?;
                self.repository.set_payment_customer(&user.id, &customer_id)?;
                customer_id
            }
        };

        let session = self.payments.create_portal_session(
            &customer_id,
            &format!("{}/account/billing", self.public_url),
        )?;
        info!(user_id = %user.id, "billing portal session created");
        Ok(PortalLink { url: session.url })
    }
}
