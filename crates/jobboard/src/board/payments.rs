//! Payment processor boundary: customers, checkout sessions, billing portal.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::domain::JobId;
use super::pricing::ListingTier;

/// Metadata key carrying the job post id through checkout.
pub const JOB_ID_METADATA_KEY: &str = "job_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
    pub customer_id: String,
    pub payment_status: PaymentStatus,
    pub amount_total: u64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CheckoutSession {
    pub fn job_id(&self) -> Option<JobId> {
        self.metadata
            .get(JOB_ID_METADATA_KEY)
            .filter(|value| !value.is_empty())
            .map(|value| JobId::from(value.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub tier: ListingTier,
    pub job_id: JobId,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortalSession {
    pub url: String,
}

/// Outbound calls to the payment processor.
pub trait PaymentGateway: Send + Sync {
    fn create_customer(&self, email: &str, name: Option<&str>) -> Result<String, PaymentError>;
    fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;
    fn retrieve_checkout_session(&self, session_id: &str)
        -> Result<CheckoutSession, PaymentError>;
    fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("checkout session {0} not found")]
    SessionNotFound(String),
    #[error("payment processor unavailable: {0}")]
    Upstream(String),
}

/// Process-local gateway used in development and tests. Sessions start unpaid
/// until [`InMemoryPaymentGateway::mark_paid`] is called.
#[derive(Debug, Clone)]
pub struct InMemoryPaymentGateway {
    base_url: String,
    state: Arc<Mutex<GatewayState>>,
}

#[derive(Debug, Default)]
struct GatewayState {
    next_id: u64,
    customers: BTreeMap<String, String>,
    sessions: HashMap<String, CheckoutSession>,
}

impl GatewayState {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{:06}", self.next_id)
    }
}

impl Default for InMemoryPaymentGateway {
    fn default() -> Self {
        Self::new("https://checkout.payments.local")
    }
}

impl InMemoryPaymentGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            state: Arc::new(Mutex::new(GatewayState::default())),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, GatewayState>, PaymentError> {
        self.state
            .lock()
            .map_err(|_| PaymentError::Upstream("gateway mutex poisoned".to_string()))
    }

    /// Simulate the customer completing checkout.
    pub fn mark_paid(&self, session_id: &str) -> Result<CheckoutSession, PaymentError> {
        let mut state = self.lock()?;
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| PaymentError::SessionNotFound(session_id.to_string()))?;
        session.payment_status = PaymentStatus::Paid;
        Ok(session.clone())
    }

    pub fn customer_count(&self) -> usize {
        self.lock().map(|state| state.customers.len()).unwrap_or(0)
    }

    pub fn sessions(&self) -> Vec<CheckoutSession> {
        self.lock()
            .map(|state| state.sessions.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl PaymentGateway for InMemoryPaymentGateway {
    fn create_customer(&self, email: &str, _name: Option<&str>) -> Result<String, PaymentError> {
        let mut state = self.lock()?;
        let id = state.next("cus");
        state.customers.insert(id.clone(), email.to_string());
        Ok(id)
    }

    fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut state = self.lock()?;
        if !state.customers.contains_key(&request.customer_id) {
            return Err(PaymentError::Upstream(format!(
                "unknown customer {}",
                request.customer_id
            )));
        }
        let id = state.next("cs");
        let mut metadata = BTreeMap::new();
        metadata.insert(JOB_ID_METADATA_KEY.to_string(), request.job_id.to_string());
        let session = CheckoutSession {
            url: format!("{}/pay/{id}", self.base_url),
            id: id.clone(),
            customer_id: request.customer_id,
            payment_status: PaymentStatus::Unpaid,
            amount_total: request.tier.unit_amount_cents(),
            metadata,
        };
        state.sessions.insert(id, session.clone());
        Ok(session)
    }

    fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        self.lock()?
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| PaymentError::SessionNotFound(session_id.to_string()))
    }

    fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        let state = self.lock()?;
        if !state.customers.contains_key(customer_id) {
            return Err(PaymentError::Upstream(format!("unknown customer {customer_id}")));
        }
        Ok(PortalSession {
            url: format!("{}/portal/{customer_id}?return_url={return_url}", self.base_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::pricing::tier_for_duration;

    #[test]
    fn checkout_carries_job_id_and_starts_unpaid() {
        let gateway = InMemoryPaymentGateway::default();
        let customer = gateway
            .create_customer("owner@acme.test", Some("Owner"))
            .expect("customer");
        let session = gateway
            .create_checkout_session(CheckoutRequest {
                customer_id: customer,
                tier: tier_for_duration(30).expect("tier"),
                job_id: JobId::from("job-1"),
                success_url: "http://localhost/success".to_string(),
                cancel_url: "http://localhost/cancel".to_string(),
            })
            .expect("session");

        assert_eq!(session.payment_status, PaymentStatus::Unpaid);
        assert_eq!(session.job_id(), Some(JobId::from("job-1")));
        assert_eq!(session.amount_total, 9_900);

        let paid = gateway.mark_paid(&session.id).expect("paid");
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(
            gateway
                .retrieve_checkout_session(&session.id)
                .expect("retrieve")
                .payment_status,
            PaymentStatus::Paid
        );
    }

    #[test]
    fn unknown_session_is_reported() {
        let gateway = InMemoryPaymentGateway::default();
        assert_eq!(
            gateway.retrieve_checkout_session("cs_missing"),
            Err(PaymentError::SessionNotFound("cs_missing".to_string()))
        );
    }
}
