use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::api::{access_error_response, authenticate, error_response, StaffingApi};
use crate::repository::StaffingStore;

use super::domain::NotificationId;
use super::inbox::InboxError;

pub fn notification_router<S>(api: Arc<StaffingApi<S>>) -> Router
where
    S: StaffingStore + 'static,
{
    Router::new()
        .route("/api/v1/notifications", get(list_handler::<S>))
        .route(
            "/api/v1/notifications/:notification_id/read",
            post(mark_read_handler::<S>),
        )
        .route(
            "/api/v1/notifications/:notification_id/unread",
            post(mark_unread_handler::<S>),
        )
        .route("/api/v1/notifications/purge", post(purge_handler::<S>))
        .with_state(api)
}

pub(crate) fn inbox_error_response(error: InboxError) -> Response {
    match error {
        InboxError::Access(error) => access_error_response(error),
        InboxError::NotFound(_) => {
            error_response(StatusCode::NOT_FOUND, "not_found", error.to_string())
        }
        InboxError::Repository(error) => crate::api::repository_error_response(error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    pub(crate) unread_only: bool,
}

pub(crate) async fn list_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match api.inbox.list(&actor, query.unread_only) {
        Ok(notifications) => (StatusCode::OK, axum::Json(notifications)).into_response(),
        Err(error) => inbox_error_response(error),
    }
}

pub(crate) async fn mark_read_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
    Path(notification_id): Path<String>,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match api.inbox.mark_read(&actor, &NotificationId(notification_id)) {
        Ok(notification) => (StatusCode::OK, axum::Json(notification)).into_response(),
        Err(error) => inbox_error_response(error),
    }
}

pub(crate) async fn mark_unread_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
    Path(notification_id): Path<String>,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match api.inbox.mark_unread(&actor, &NotificationId(notification_id)) {
        Ok(notification) => (StatusCode::OK, axum::Json(notification)).into_response(),
        Err(error) => inbox_error_response(error),
    }
}

pub(crate) async fn purge_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match api.inbox.purge_expired(&actor, Utc::now()) {
        Ok(purged) => (StatusCode::OK, axum::Json(json!({ "purged": purged }))).into_response(),
        Err(error) => inbox_error_response(error),
    }
}
