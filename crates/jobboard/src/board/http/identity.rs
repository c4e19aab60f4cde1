use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use super::error::ApiError;
use crate::board::access::Principal;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Identity forwarded by the auth gateway, if present.
pub fn principal_from_headers(headers: &HeaderMap) -> Option<Principal> {
    let user_id = header_value(headers, USER_ID_HEADER)?;
    Some(Principal {
        user_id: user_id.into(),
        email: header_value(headers, USER_EMAIL_HEADER),
        name: header_value(headers, USER_NAME_HEADER),
    })
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from_headers(&parts.headers).ok_or_else(ApiError::unauthenticated)
    }
}

/// Optional identity for public routes.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybePrincipal
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(principal_from_headers(&parts.headers)))
    }
}
