use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{warn, Level};

use super::error::ApiError;
use super::identity::USER_ID_HEADER;
use super::WEBHOOK_PATH;
use crate::board::rate_limit::{RateDecision, RateLimiter};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; frame-ancestors 'none'; \
     base-uri 'self'; form-action 'self'";

/// Headers applied to every response. HSTS is only sent in production.
pub async fn security_headers(
    State(production): State<bool>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );
    if production {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }
    response
}

/// Span and response log per request; 5xx responses are logged as failures.
pub fn request_trace() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        )
}

/// Client key: the first forwarded address, else the forwarded user id.
/// The address wins because the user id header is caller supplied.
pub fn client_key(request: &Request) -> String {
    let headers = request.headers();
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    if let Some(address) = header_value("x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return format!("ip:{address}");
    }
    header_value(USER_ID_HEADER)
        .map(|user| format!("user:{user}"))
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Fixed-window limit on mutating requests. Payment webhooks are exempt.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let mutating = !matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS);
    if !mutating || request.uri().path() == WEBHOOK_PATH {
        return next.run(request).await;
    }

    let key = client_key(&request);
    match limiter.check(&key, Instant::now()) {
        RateDecision::Allowed { .. } => next.run(request).await,
        RateDecision::Limited { retry_after } => {
            warn!(client = %key, path = %request.uri().path(), "rate limit exceeded");
            ApiError::rate_limited(retry_after).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::Router;
    use tower::ServiceExt;

    use super::*;
    use crate::config::RateLimitConfig;

    fn request(user: Option<&str>, forwarded: Option<&str>) -> Request {
        let mut builder = Request::builder().method("POST").uri("/api/jobs/job-1/save");
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        if let Some(forwarded) = forwarded {
            builder = builder.header("x-forwarded-for", forwarded);
        }
        builder.body(Body::empty()).expect("request builds")
    }

    #[test]
    fn client_key_prefers_forwarded_address() {
        assert_eq!(
            client_key(&request(Some("user-1"), Some("203.0.113.9, 10.0.0.1"))),
            "ip:203.0.113.9"
        );
        assert_eq!(client_key(&request(Some("user-1"), None)), "user:user-1");
        assert_eq!(client_key(&request(Some("  "), Some(" "))), "anonymous");
    }

    #[tokio::test]
    async fn rotating_user_ids_share_the_address_budget() {
        let limiter = Arc::new(RateLimiter::new(&RateLimitConfig {
            max_requests: 2,
            window: Duration::from_secs(60),
        }));
        let router = Router::new()
            .route("/api/jobs/:job_id/save", post(|| async { StatusCode::OK }))
            .layer(axum::middleware::from_fn_with_state(limiter, rate_limit));

        let mut statuses = Vec::new();
        for user in ["user-1", "user-2", "user-3"] {
            let response = router
                .clone()
                .oneshot(request(Some(user), Some("203.0.113.9")))
                .await
                .expect("response");
            statuses.push(response.status());
        }
        assert_eq!(
            statuses,
            vec![StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );
    }

    #[tokio::test]
    async fn traced_router_passes_responses_through() {
        let router = Router::new()
            .route("/api/ok", get(|| async { StatusCode::OK }))
            .route(
                "/api/broken",
                get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            )
            .layer(request_trace());

        for (uri, expected) in [
            ("/api/ok", StatusCode::OK),
            ("/api/broken", StatusCode::INTERNAL_SERVER_ERROR),
        ] {
            let response = router
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(uri)
                        .body(Body::empty())
                        .expect("request builds"),
                )
                .await
                .expect("response");
            assert_eq!(response.status(), expected);
        }
    }
}
