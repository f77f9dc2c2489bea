//! HTTP wiring shared by the per-module routers.

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::json;

use crate::access::domain::Actor;
use crate::access::guard::AccessError;
use crate::access::roles::RoleAdministration;
use crate::access::router::role_router;
use crate::access::ActorResolver;
use crate::config::PolicyConfig;
use crate::repository::{RepositoryError, StaffingStore};
use crate::workflows::approvals::{approval_router, ApprovalService, StageTable};
use crate::workflows::notifications::router::notification_router;
use crate::workflows::notifications::NotificationInbox;

/// Header carrying the caller's e-mail address.
pub const ACTOR_HEADER: &str = "x-actor-email";

/// Services backing the HTTP surface, all sharing one store.
pub struct StaffingApi<S> {
    pub approvals: ApprovalService<S, S, S, S>,
    pub resolver: ActorResolver<S>,
    pub inbox: NotificationInbox<S>,
    pub roles: RoleAdministration<S, S>,
}

impl<S> StaffingApi<S>
where
    S: StaffingStore + 'static,
{
    pub fn new(store: Arc<S>, policy: PolicyConfig) -> Self {
        Self::with_stages(store, policy, StageTable::standard())
    }

    pub fn with_stages(store: Arc<S>, policy: PolicyConfig, stages: StageTable) -> Self {
        Self {
            approvals: ApprovalService::with_stages(
                Arc::clone(&store),
                Arc::clone(&store),
                Arc::clone(&store),
                Arc::clone(&store),
                policy,
                stages,
            ),
            resolver: ActorResolver::new(Arc::clone(&store)),
            inbox: NotificationInbox::new(Arc::clone(&store)),
            roles: RoleAdministration::new(
                Arc::clone(&store),
                store,
                policy.notification_ttl_days,
            ),
        }
    }
}

/// Every domain route under `/api/v1`.
pub fn router<S>(api: Arc<StaffingApi<S>>) -> Router
where
    S: StaffingStore + 'static,
{
    approval_router(Arc::clone(&api))
        .merge(notification_router(Arc::clone(&api)))
        .merge(role_router(api))
}

pub(crate) fn error_response(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
    let payload = json!({
        "error": message.into(),
        "kind": kind,
    });
    (status, axum::Json(payload)).into_response()
}

/// Resolve the calling actor from the request headers.
pub(crate) fn authenticate<S>(api: &StaffingApi<S>, headers: &HeaderMap) -> Result<Actor, Response>
where
    S: StaffingStore + 'static,
{
    let Some(email) = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            format!("missing {ACTOR_HEADER} header"),
        ));
    };
    api.resolver.resolve_email(email).map_err(access_error_response)
}

pub(crate) fn access_error_response(error: AccessError) -> Response {
    match error {
        AccessError::UnknownActor(_) | AccessError::InactiveActor(_) => {
            error_response(StatusCode::UNAUTHORIZED, "unauthenticated", error.to_string())
        }
        AccessError::Denied { .. } | AccessError::SelfRoleChange => {
            error_response(StatusCode::FORBIDDEN, "unauthorized", error.to_string())
        }
        AccessError::Repository(error) => repository_error_response(error),
    }
}

pub(crate) fn repository_error_response(error: RepositoryError) -> Response {
    match error {
        RepositoryError::NotFound => {
            error_response(StatusCode::NOT_FOUND, "not_found", error.to_string())
        }
        RepositoryError::Conflict | RepositoryError::StaleStatus { .. } => {
            error_response(StatusCode::CONFLICT, "conflict", error.to_string())
        }
        RepositoryError::Unavailable(_) => {
            tracing::error!(%error, "repository failure");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "repository",
                error.to_string(),
            )
        }
    }
}
