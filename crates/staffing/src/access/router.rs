use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::put,
    Router,
};
use serde::Deserialize;

use crate::api::{access_error_response, authenticate, StaffingApi};
use crate::repository::StaffingStore;

use super::domain::{Role, UserId};

pub fn role_router<S>(api: Arc<StaffingApi<S>>) -> Router
where
    S: StaffingStore + 'static,
{
    Router::new()
        .route("/api/v1/users/:user_id/role", put(change_role_handler::<S>))
        .with_state(api)
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleChangeBody {
    pub(crate) role: Role,
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

pub(crate) async fn change_role_handler<S>(
    State(api): State<Arc<StaffingApi<S>>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    axum::Json(body): axum::Json<RoleChangeBody>,
) -> Response
where
    S: StaffingStore + 'static,
{
    let actor = match authenticate(&api, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match api
        .roles
        .change_role(&actor, &UserId(user_id), body.role, body.reason)
    {
        Ok(user) => (StatusCode::OK, axum::Json(user)).into_response(),
        Err(error) => access_error_response(error),
    }
}
