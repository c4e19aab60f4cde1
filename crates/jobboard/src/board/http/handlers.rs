use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::error::{ApiError, ApiResult};
use super::identity::MaybePrincipal;
use crate::board::access::Principal;
use crate::board::domain::{CompanyId, JobId, JobPostStatus, SavedJobId};
use crate::board::service::{JobBoardService, ListingFilter, ViewContext};
use crate::board::validation::{ApplicationInput, CompanyInput, JobInput, JobSeekerInput};
use crate::board::webhook::SIGNATURE_HEADER;

type Service = State<Arc<JobBoardService>>;

#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    page: Option<usize>,
    page_size: Option<usize>,
    /// Comma separated.
    employment_types: Option<String>,
    location: Option<String>,
}

impl From<ListingParams> for ListingFilter {
    fn from(params: ListingParams) -> Self {
        ListingFilter {
            page: params.page,
            page_size: params.page_size,
            employment_types: params
                .employment_types
                .map(|raw| raw.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
            location: params.location,
        }
    }
}

pub async fn list_jobs(
    State(service): Service,
    Query(params): Query<ListingParams>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = service.list_jobs(&params.into()).api(&service)?;
    Ok(Json(listing))
}

pub async fn create_job(
    State(service): Service,
    principal: Principal,
    Json(input): Json<JobInput>,
) -> Result<impl IntoResponse, ApiError> {
    let started = service.create_job(&principal, input).api(&service)?;
    Ok((StatusCode::CREATED, Json(started)))
}

pub async fn job_detail(
    State(service): Service,
    MaybePrincipal(principal): MaybePrincipal,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = service
        .job_detail(principal.as_ref(), &JobId::from(job_id))
        .api(&service)?;
    Ok(Json(detail))
}

pub async fn update_job(
    State(service): Service,
    principal: Principal,
    Path(job_id): Path<String>,
    Json(input): Json<JobInput>,
) -> Result<impl IntoResponse, ApiError> {
    let job = service
        .update_own_job(&principal, &JobId::from(job_id), input)
        .api(&service)?;
    Ok(Json(job))
}

pub async fn delete_job(
    State(service): Service,
    principal: Principal,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    service
        .delete_own_job(&principal, &JobId::from(job_id))
        .api(&service)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn apply(
    State(service): Service,
    principal: Principal,
    Path(job_id): Path<String>,
    Json(input): Json<ApplicationInput>,
) -> Result<impl IntoResponse, ApiError> {
    let application = service
        .apply_to_job(&principal, &JobId::from(job_id), input)
        .api(&service)?;
    Ok((StatusCode::CREATED, Json(application)))
}

pub async fn save_job(
    State(service): Service,
    principal: Principal,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let saved = service
        .save_job(&principal, &JobId::from(job_id))
        .api(&service)?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn unsave_job(
    State(service): Service,
    principal: Principal,
    Path(saved_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    service
        .unsave_job(&principal, &SavedJobId::from(saved_id))
        .api(&service)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn favorites(
    State(service): Service,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(service.favorites(&principal).api(&service)?))
}

pub async fn track_view(
    State(service): Service,
    MaybePrincipal(principal): MaybePrincipal,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let context = ViewContext {
        user_agent: header("user-agent"),
        forwarded_for: header("x-forwarded-for"),
    };
    service
        .track_view(principal.as_ref(), &JobId::from(job_id), context)
        .api(&service)?;
    Ok(Json(json!({ "success": true })))
}

pub async fn job_applications(
    State(service): Service,
    principal: Principal,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let applications = service
        .job_applications(&principal, &JobId::from(job_id))
        .api(&service)?;
    Ok(Json(applications))
}

pub async fn job_analytics(
    State(service): Service,
    principal: Principal,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let analytics = service
        .job_analytics(&principal, &JobId::from(job_id))
        .api(&service)?;
    Ok(Json(analytics))
}

pub async fn company_page(
    State(service): Service,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let page = service
        .company_page(&CompanyId::from(company_id))
        .api(&service)?;
    Ok(Json(page))
}

pub async fn my_jobs(
    State(service): Service,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(service.my_jobs(&principal).api(&service)?))
}

pub async fn account(
    State(service): Service,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(service.account(&principal).api(&service)?))
}

pub async fn onboard_company(
    State(service): Service,
    principal: Principal,
    Json(input): Json<CompanyInput>,
) -> Result<impl IntoResponse, ApiError> {
    let company = service.create_company(&principal, input).api(&service)?;
    Ok((StatusCode::CREATED, Json(company)))
}

pub async fn onboard_job_seeker(
    State(service): Service,
    principal: Principal,
    Json(input): Json<JobSeekerInput>,
) -> Result<impl IntoResponse, ApiError> {
    let seeker = service.create_job_seeker(&principal, input).api(&service)?;
    Ok((StatusCode::CREATED, Json(seeker)))
}

pub async fn update_company(
    State(service): Service,
    principal: Principal,
    Json(input): Json<CompanyInput>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(service.update_company(&principal, input).api(&service)?))
}

pub async fn update_job_seeker(
    State(service): Service,
    principal: Principal,
    Json(input): Json<JobSeekerInput>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        service.update_job_seeker(&principal, input).api(&service)?,
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionParams {
    session_id: Option<String>,
}

/// `session_id` may arrive in the query string or a JSON body.
pub async fn activate_payment(
    State(service): Service,
    Query(query): Query<SessionParams>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = query.session_id.or_else(|| {
        serde_json::from_slice::<SessionParams>(&body)
            .ok()
            .and_then(|params| params.session_id)
    });
    let activation = service
        .activate_from_session(session_id.as_deref())
        .api(&service)?;
    Ok(Json(activation))
}

pub async fn payment_webhook(
    State(service): Service,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    service
        .handle_payment_webhook(&body, signature)
        .api(&service)?;
    Ok(Json(json!({ "received": true })))
}

pub async fn billing_portal(
    State(service): Service,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(service.billing_portal(&principal).api(&service)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminListParams {
    status: Option<JobPostStatus>,
}

pub async fn admin_list_jobs(
    State(service): Service,
    principal: Principal,
    Query(params): Query<AdminListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let jobs = service
        .admin_list_jobs(&principal, params.status)
        .api(&service)?;
    Ok(Json(jobs))
}

pub async fn admin_approve(
    State(service): Service,
    principal: Principal,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = service
        .approve_job(&principal, &JobId::from(job_id))
        .api(&service)?;
    Ok(Json(job))
}

pub async fn admin_reject(
    State(service): Service,
    principal: Principal,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = service
        .reject_job(&principal, &JobId::from(job_id))
        .api(&service)?;
    Ok(Json(job))
}

pub async fn admin_update(
    State(service): Service,
    principal: Principal,
    Path(job_id): Path<String>,
    Json(input): Json<JobInput>,
) -> Result<impl IntoResponse, ApiError> {
    let job = service
        .admin_update_job(&principal, &JobId::from(job_id), input)
        .api(&service)?;
    Ok(Json(job))
}

pub async fn admin_delete(
    State(service): Service,
    principal: Principal,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    service
        .admin_delete_job(&principal, &JobId::from(job_id))
        .api(&service)?;
    Ok(StatusCode::NO_CONTENT)
}
