//! JSON API over [`JobBoardService`]. Identity arrives in gateway headers
//! (see [`identity`]); every failure renders through [`ApiError`].

pub mod error;
mod handlers;
pub mod identity;
pub mod middleware;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::board::rate_limit::RateLimiter;
use crate::board::service::JobBoardService;

pub use error::{ApiError, ApiResult};

/// Payment processor deliveries land here. Exempt from rate limiting.
pub const WEBHOOK_PATH: &str = "/api/webhooks/payments";

/// Router for every `/api` route, with request tracing, rate limiting and
/// security headers applied.
pub fn board_router(
    service: Arc<JobBoardService>,
    limiter: Arc<RateLimiter>,
    production: bool,
) -> Router {
    Router::new()
        .route("/api/jobs", get(handlers::list_jobs).post(handlers::create_job))
        .route(
            "/api/jobs/:job_id",
            get(handlers::job_detail)
                .put(handlers::update_job)
                .delete(handlers::delete_job),
        )
        .route("/api/jobs/:job_id/apply", post(handlers::apply))
        .route("/api/jobs/:job_id/save", post(handlers::save_job))
        .route("/api/jobs/:job_id/view", post(handlers::track_view))
        .route("/api/jobs/:job_id/applications", get(handlers::job_applications))
        .route("/api/jobs/:job_id/analytics", get(handlers::job_analytics))
        .route("/api/saved/:saved_id", delete(handlers::unsave_job))
        .route("/api/favorites", get(handlers::favorites))
        .route("/api/companies/:company_id", get(handlers::company_page))
        .route("/api/my-jobs", get(handlers::my_jobs))
        .route("/api/account", get(handlers::account))
        .route("/api/account/company", put(handlers::update_company))
        .route("/api/account/job-seeker", put(handlers::update_job_seeker))
        .route("/api/onboarding/company", post(handlers::onboard_company))
        .route("/api/onboarding/job-seeker", post(handlers::onboard_job_seeker))
        .route("/api/payments/activate", post(handlers::activate_payment))
        .route(WEBHOOK_PATH, post(handlers::payment_webhook))
        .route("/api/billing/portal", post(handlers::billing_portal))
        .route("/api/admin/jobs", get(handlers::admin_list_jobs))
        .route(
            "/api/admin/jobs/:job_id",
            put(handlers::admin_update).delete(handlers::admin_delete),
        )
        .route("/api/admin/jobs/:job_id/approve", post(handlers::admin_approve))
        .route("/api/admin/jobs/:job_id/reject", post(handlers::admin_reject))
        .with_state(service)
        .layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit,
        ))
        .layer(middleware::request_trace())
        .layer(axum::middleware::from_fn_with_state(
            production,
            middleware::security_headers,
        ))
}
