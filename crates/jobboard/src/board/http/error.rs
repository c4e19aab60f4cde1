use std::collections::BTreeMap;
use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::board::service::{BoardError, JobBoardService};

/// Error returned by every board route, rendered as
/// `{"error": {"code", "message", "fields"?}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub fields: Option<BTreeMap<String, String>>,
    pub retry_after: Option<Duration>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    error: Body<'a>,
}

#[derive(Serialize)]
struct Body<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a BTreeMap<String, String>>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            fields: None,
            retry_after: None,
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "AUTHENTICATION_ERROR",
            "Authentication required",
        )
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn rate_limited(retry_after: Duration) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMIT_EXCEEDED",
                "Too many requests. Please try again later.",
            )
        }
    }

    /// Map a service error. Details of internal failures are only shown when
    /// `expose_internal` is set.
    pub fn from_board(err: BoardError, expose_internal: bool) -> Self {
        match err {
            BoardError::Validation(errors) => Self {
                fields: Some(errors.fields),
                ..Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "Validation failed")
            },
            BoardError::BadRequest(message) => Self::bad_request(message),
            BoardError::Signature(_) => {
                Self::bad_request("Webhook signature verification failed")
            }
            BoardError::Unauthenticated => Self::unauthenticated(),
            BoardError::Forbidden(message) => {
                Self::new(StatusCode::FORBIDDEN, "AUTHORIZATION_ERROR", message)
            }
            BoardError::NotFound(what) => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("{what} not found"))
            }
            BoardError::Conflict(message) => Self::new(StatusCode::CONFLICT, "CONFLICT", message),
            err @ (BoardError::Payment(_) | BoardError::Mail(_)) => {
                error!(error = %err, "upstream service failed");
                let message = if expose_internal {
                    err.to_string()
                } else {
                    "External service unavailable".to_string()
                };
                Self::new(StatusCode::BAD_GATEWAY, "EXTERNAL_SERVICE_ERROR", message)
            }
            err @ (BoardError::Workflow(_) | BoardError::Storage(_)) => {
                error!(error = %err, "internal error");
                let message = if expose_internal {
                    err.to_string()
                } else {
                    "Internal server error".to_string()
                };
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(Envelope {
            error: Body {
                code: self.code,
                message: &self.message,
                fields: self.fields.as_ref(),
            },
        });
        let mut response = (self.status, body).into_response();
        if let Some(retry_after) = self.retry_after {
            if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Attach the service's error policy to a service result.
pub trait ApiResult<T> {
    fn api(self, service: &JobBoardService) -> Result<T, ApiError>;
}

impl<T> ApiResult<T> for Result<T, BoardError> {
    fn api(self, service: &JobBoardService) -> Result<T, ApiError> {
        self.map_err(|err| ApiError::from_board(err, service.expose_internal_errors()))
    }
}
