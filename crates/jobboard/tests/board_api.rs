//! HTTP behavior of the board router: identity, error envelopes, the dual
//! payment activation paths, security headers and rate limiting.

mod common {
    use std::sync::Arc;
    use std::time::Duration;

    use jobboard::board::access::AdminPolicy;
    use jobboard::board::http::board_router;
    use jobboard::board::memory::InMemoryBoardRepository;
    use jobboard::board::notifications::RecordingMailer;
    use jobboard::board::payments::InMemoryPaymentGateway;
    use jobboard::board::rate_limit::RateLimiter;
    use jobboard::board::service::{BoardDependencies, JobBoardService, ServiceSettings};
    use jobboard::board::workflow::{InMemoryWorkflowStore, WorkflowSettings};
    use jobboard::config::RateLimitConfig;

    pub(super) const WEBHOOK_SECRET: &str = "whsec_integration";
    pub(super) const ADMIN_EMAIL: &str = "ops@jobboard.test";

    pub(super) struct App {
        pub(super) router: axum::Router,
        pub(super) payments: InMemoryPaymentGateway,
        pub(super) store: InMemoryWorkflowStore,
    }

    pub(super) fn app_with_limit(max_requests: u32) -> App {
        let payments = InMemoryPaymentGateway::default();
        let store = InMemoryWorkflowStore::default();
        let service = JobBoardService::new(
            BoardDependencies {
                repository: Arc::new(InMemoryBoardRepository::default()),
                payments: Arc::new(payments.clone()),
                mailer: Arc::new(RecordingMailer::default()),
                workflow_store: Arc::new(store.clone()),
            },
            ServiceSettings {
                admins: AdminPolicy::from_emails([ADMIN_EMAIL]),
                public_url: "https://jobs.example.com".to_string(),
                webhook_secret: Some(WEBHOOK_SECRET.to_string()),
                signature_tolerance_secs: 300,
                workflow: WorkflowSettings::default(),
                expose_internal_errors: false,
            },
        );
        let limiter = RateLimiter::new(&RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
        });
        App {
            router: board_router(Arc::new(service), Arc::new(limiter), true),
            payments,
            store,
        }
    }

    pub(super) fn app() -> App {
        app_with_limit(1_000)
    }
}

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use chrono::Utc;
use jobboard::board::http::identity::{USER_EMAIL_HEADER, USER_ID_HEADER};
use jobboard::board::http::WEBHOOK_PATH;
use jobboard::board::webhook::{WebhookVerifier, SIGNATURE_HEADER};
use jobboard::board::workflow::{StepStatus, WorkflowStore};
use serde_json::{json, Value};
use tower::ServiceExt;

const OWNER_ID: &str = "owner-1";
const OWNER_EMAIL: &str = "owner@acme.test";

fn json_request(method: &str, uri: &str, user: Option<(&str, &str)>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some((id, email)) = user {
        builder = builder
            .header(USER_ID_HEADER, id)
            .header(USER_EMAIL_HEADER, email);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get(uri: &str, user: Option<(&str, &str)>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some((id, email)) = user {
        builder = builder
            .header(USER_ID_HEADER, id)
            .header(USER_EMAIL_HEADER, email);
    }
    builder.body(Body::empty()).expect("request builds")
}

async fn body_json(response: Response) -> Value {
    let body = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body reads");
    serde_json::from_slice(&body).expect("json body")
}

async fn send(router: &axum::Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.expect("router responds")
}

fn company_body() -> Value {
    json!({
        "name": "Acme",
        "location": "Berlin",
        "about": "We build rockets for everyone.",
        "logo": "https://cdn.acme.test/logo.png",
        "website": "https://acme.test"
    })
}

fn job_body(listing_duration: u32) -> Value {
    json!({
        "job_title": "Rust Engineer",
        "employment_type": "full-time",
        "location": "Berlin",
        "salary_from": 80000,
        "salary_to": 120000,
        "job_description": "Build the board",
        "listing_duration": listing_duration,
        "benefits": ["401k", "Remote work"]
    })
}

/// Onboard the owner and create a draft post. Returns (job_id, session_id).
async fn draft_job(app: &common::App) -> (String, String) {
    let owner = Some((OWNER_ID, OWNER_EMAIL));
    let response = send(
        &app.router,
        json_request("POST", "/api/onboarding/company", owner, company_body()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&app.router, json_request("POST", "/api/jobs", owner, job_body(30))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let started = body_json(response).await;
    (
        started["job_id"].as_str().expect("job id").to_string(),
        started["session_id"].as_str().expect("session id").to_string(),
    )
}

fn signed_webhook(job_id: &str, signature: Option<String>) -> Request<Body> {
    let payload = json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": {"object": {"id": "cs_1", "metadata": {"job_id": job_id}}}
    })
    .to_string();
    let signature = signature.unwrap_or_else(|| {
        WebhookVerifier::new(common::WEBHOOK_SECRET, 300)
            .sign(payload.as_bytes(), Utc::now().timestamp())
    });
    Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(payload))
        .expect("request builds")
}

#[tokio::test]
async fn protected_routes_require_identity() {
    let app = common::app();
    let response = send(&app.router, json_request("POST", "/api/jobs", None, job_body(30))).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "AUTHENTICATION_ERROR");
}

#[tokio::test]
async fn validation_failures_list_fields() {
    let app = common::app();
    let mut company = company_body();
    company["website"] = json!("not a url");
    company["about"] = json!("short");

    let response = send(
        &app.router,
        json_request(
            "POST",
            "/api/onboarding/company",
            Some((OWNER_ID, OWNER_EMAIL)),
            company,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["fields"]["website"].is_string());
    assert!(body["error"]["fields"]["about"].is_string());
}

#[tokio::test]
async fn unsupported_listing_duration_is_rejected() {
    let app = common::app();
    let owner = Some((OWNER_ID, OWNER_EMAIL));
    send(
        &app.router,
        json_request("POST", "/api/onboarding/company", owner, company_body()),
    )
    .await;

    let response = send(&app.router, json_request("POST", "/api/jobs", owner, job_body(45))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"]["fields"]["listing_duration"].is_string());
}

#[tokio::test]
async fn drafts_stay_hidden_until_paid() {
    let app = common::app();
    let (job_id, _) = draft_job(&app).await;

    let listing = body_json(send(&app.router, get("/api/jobs", None)).await).await;
    assert_eq!(listing["total"], 0);

    let response = send(&app.router, get(&format!("/api/jobs/{job_id}"), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn webhook_then_poll_activates_once() {
    let app = common::app();
    let (job_id, session_id) = draft_job(&app).await;
    app.payments.mark_paid(&session_id).expect("session exists");

    let response = send(&app.router, signed_webhook(&job_id, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["received"], true);

    let response = send(
        &app.router,
        json_request(
            "POST",
            "/api/payments/activate",
            None,
            json!({ "session_id": session_id }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let activation = body_json(response).await;
    assert_eq!(activation["ok"], true);
    assert_eq!(activation["updated_count"], 0);

    let steps = app.store.list().expect("steps");
    let pending: Vec<_> = steps
        .iter()
        .filter(|step| step.status == StepStatus::Pending)
        .collect();
    assert_eq!(pending.len(), 1, "expiration scheduled exactly once");

    let listing = body_json(send(&app.router, get("/api/jobs", None)).await).await;
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["items"][0]["company"]["name"], "Acme");
}

#[tokio::test]
async fn poll_before_webhook_activates_once() {
    let app = common::app();
    let (job_id, session_id) = draft_job(&app).await;
    app.payments.mark_paid(&session_id).expect("session exists");

    let response = send(
        &app.router,
        Request::builder()
            .method("POST")
            .uri(format!("/api/payments/activate?session_id={session_id}"))
            .body(Body::empty())
            .expect("request builds"),
    )
    .await;
    assert_eq!(body_json(response).await["updated_count"], 1);

    let response = send(&app.router, signed_webhook(&job_id, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let pending = app
        .store
        .list()
        .expect("steps")
        .into_iter()
        .filter(|step| step.status == StepStatus::Pending)
        .count();
    assert_eq!(pending, 1);
}

#[tokio::test]
async fn unpaid_session_is_not_activated() {
    let app = common::app();
    let (_, session_id) = draft_job(&app).await;

    let response = send(
        &app.router,
        json_request(
            "POST",
            "/api/payments/activate",
            None,
            json!({ "session_id": session_id }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"]["message"],
        "Payment not completed"
    );
}

#[tokio::test]
async fn forged_webhook_is_rejected() {
    let app = common::app();
    let (job_id, _) = draft_job(&app).await;

    let forged = WebhookVerifier::new("whsec_other", 300).sign(b"{}", Utc::now().timestamp());
    let response = send(&app.router, signed_webhook(&job_id, Some(forged))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let listing = body_json(send(&app.router, get("/api/jobs", None)).await).await;
    assert_eq!(listing["total"], 0);
}

#[tokio::test]
async fn admin_routes_require_admin_email() {
    let app = common::app();
    let response = send(
        &app.router,
        get("/api/admin/jobs", Some((OWNER_ID, OWNER_EMAIL))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app.router,
        get("/api/admin/jobs?status=DRAFT", Some(("admin-1", common::ADMIN_EMAIL))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let app = common::app();
    let response = send(&app.router, get("/api/jobs", None)).await;
    let headers = response.headers();

    assert_eq!(headers.get("x-frame-options").map(|v| v.as_bytes()), Some(&b"DENY"[..]));
    assert_eq!(
        headers.get("x-content-type-options").map(|v| v.as_bytes()),
        Some(&b"nosniff"[..])
    );
    assert!(headers.contains_key("content-security-policy"));
    assert!(headers.contains_key("strict-transport-security"));
}

#[tokio::test]
async fn mutating_requests_are_rate_limited() {
    let app = common::app_with_limit(2);
    let view = || {
        Request::builder()
            .method("POST")
            .uri("/api/jobs/missing/view")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .expect("request builds")
    };

    assert_eq!(send(&app.router, view()).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(send(&app.router, view()).await.status(), StatusCode::NOT_FOUND);

    let limited = send(&app.router, view()).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key("retry-after"));
    assert_eq!(body_json(limited).await["error"]["code"], "RATE_LIMIT_EXCEEDED");

    // Reads and webhooks are not counted.
    assert_eq!(send(&app.router, get("/api/jobs", None)).await.status(), StatusCode::OK);
    let webhook = send(&app.router, signed_webhook("missing", Some("t=1,v1=00".to_string()))).await;
    assert_eq!(webhook.status(), StatusCode::BAD_REQUEST);
}
