use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;

use crate::access::domain::UserId;
use crate::api::{authenticate, error_response, StaffingApi};
use crate::repository::StaffingStore;

use super::domain::{ApprovalRequest, RequestId};
use super::errors::ApprovalError;
use super::ledger::{AllocationId, AllocationPatch};
use super::service::{
    DecisionInput, LeaveRequestInput, OvertimeRequestInput, ResourceRequestInput,
    SkillVerificationInput,
};

/// Router exposing submission, decision, and ledger endpoints.
pub fn approval_router<S>(api: Arc<StaffingApi<S>>) -> Router
where
    S: StaffingStore + 'static,
{
    Router::new()
        .route("/api/v1/requests/resource", post(submit_resource_handler::<S>))
        .route("/api/v1/requests/leave", post(submit_leave_handler::<S>))
        .route("/api/v1/requests/overtime", post(submit_overtime_handler::<S>))
        .route(
            "/api/v1/requests/skill-verification",
            post(submit_skill_handler::<S>),
        )
        .route("/api/v1/requests/:request_id", get(status_handler::<S>))
        .route(
            "/api/v1/requests/:request_id/decision",
            post(decision_handler::<S>),
        )
        .route(
            "/api/v1/requests/:request_id/cancel",
            post(cancel_handler::<S>),
        )
        .route(
            "/api/v1/leave-balances/:user_id/:year",
            get(balance_handler::<S>).put(entitlement_handler::<S>),
        )
        .route(
            "/api/v1/users/:user_id/allocations",
            get(allocations_handler::<S>),
        )
        .route(
            "/api/v1/allocations/:allocation_id",
            patch(update_allocation_handler::<S>),
        )
        .with_state(api)
}

pub(crate) fn approval_error_response(error: ApprovalError) -> Response {
    let status = match &error {
        ApprovalError::Unauthorized(_) => StatusCode::FORBIDDEN,
        ApprovalError::StageMismatch(_)
        | ApprovalError::DuplicateRequest { .. }
        | ApprovalError::Conflict(_) => StatusCode::CONFLICT,
        ApprovalError::Validation(_) | ApprovalError::InsufficientBalance { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ApprovalError::NotFound(_) => StatusCode::NOT_FOUND,
        ApprovalError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, error.kind(), error.to_string())
}

fn submitted(result: Result<ApprovalRequest, ApprovalError>) -> Response {
    match result {
        Ok(request) => (StatusCode::ACCEPTED, axum::Json(request.status_view())).into_response(),
        Err(error) => approval_error_response(error),
    }
}

pub(crate) async fn submit_resource_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
    axum::Json(input): axum::Json<ResourceRequestInput>,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    submitted(api.approvals.submit_resource_request(&actor, input))
}

pub(crate) async fn submit_leave_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
    axum::Json(input): axum::Json<LeaveRequestInput>,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    submitted(api.approvals.submit_leave_request(&actor, input))
}

pub(crate) async fn submit_overtime_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
    axum::Json(input): axum::Json<OvertimeRequestInput>,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    submitted(api.approvals.submit_overtime_request(&actor, input))
}

pub(crate) async fn submit_skill_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
    axum::Json(input): axum::Json<SkillVerificationInput>,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    submitted(api.approvals.submit_skill_verification(&actor, input))
}

pub(crate) async fn status_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match api.approvals.get(&RequestId(request_id), &actor) {
        Ok(request) => (StatusCode::OK, axum::Json(request)).into_response(),
        Err(error) => approval_error_response(error),
    }
}

pub(crate) async fn decision_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    axum::Json(input): axum::Json<DecisionInput>,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match api.approvals.decide(&RequestId(request_id), &actor, input) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => approval_error_response(error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CancelBody {
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

pub(crate) async fn cancel_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    body: Option<axum::Json<CancelBody>>,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match api
        .approvals
        .cancel(
            &RequestId(request_id),
            &actor,
            body.and_then(|axum::Json(body)| body.reason),
        )
    {
        Ok(request) => (StatusCode::OK, axum::Json(request.status_view())).into_response(),
        Err(error) => approval_error_response(error),
    }
}

pub(crate) async fn balance_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
    Path((user_id, year)): Path<(String, i32)>,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match api.approvals.leave_balance(&actor, &UserId(user_id), year) {
        Ok(balance) => (StatusCode::OK, axum::Json(balance.view())).into_response(),
        Err(error) => approval_error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EntitlementBody {
    pub(crate) entitlement: u32,
}

pub(crate) async fn entitlement_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
    Path((user_id, year)): Path<(String, i32)>,
    axum::Json(body): axum::Json<EntitlementBody>,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match api
        .approvals
        .set_leave_entitlement(&actor, &UserId(user_id), year, body.entitlement)
    {
        Ok(balance) => (StatusCode::OK, axum::Json(balance.view())).into_response(),
        Err(error) => approval_error_response(error),
    }
}

pub(crate) async fn allocations_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match api.approvals.allocations_for(&actor, &UserId(user_id)) {
        Ok(allocations) => (StatusCode::OK, axum::Json(allocations)).into_response(),
        Err(error) => approval_error_response(error),
    }
}

pub(crate) async fn update_allocation_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
    Path(allocation_id): Path<String>,
    axum::Json(patch): axum::Json<AllocationPatch>,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match api
        .approvals
        .update_allocation(&actor, &AllocationId(allocation_id), patch)
    {
        Ok(allocation) => (StatusCode::OK, axum::Json(allocation)).into_response(),
        Err(error) => approval_error_response(error),
    }
}
