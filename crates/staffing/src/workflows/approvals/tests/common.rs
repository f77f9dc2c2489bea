use std::sync::Arc;

use axum::http::{Request, StatusCode};
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::access::domain::{Actor, ProjectId, ProjectRecord, Role, UserId, UserRecord};
use crate::access::ownership::AccessTarget;
use crate::api::{StaffingApi, ACTOR_HEADER};
use crate::config::PolicyConfig;
use crate::memory::InMemoryStore;
use crate::repository::{RepositoryError, RequestRepository};
use crate::workflows::approvals::domain::{
    ApprovalRequest, ApprovalStatus, CompensationType, DecisionAction, LeaveType, RequestId,
    SkillId, Stage,
};
use crate::workflows::approvals::ledger::{ProofId, ProofVerification};
use crate::workflows::approvals::service::{
    ApprovalService, DecisionInput, LeaveRequestInput, OvertimeRequestInput, ResourceRequestInput,
    SkillVerificationInput,
};
use crate::workflows::approvals::stages::StageTable;

pub(super) type MemoryService =
    ApprovalService<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore>;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn user(id: &str, role: Role, line_manager: Option<&str>) -> UserRecord {
    UserRecord {
        id: UserId::new(id),
        email: format!("{id}@staffing.test"),
        name: id.trim_start_matches("u-").to_string(),
        role,
        line_manager: line_manager.map(UserId::new),
        active: true,
    }
}

pub(super) fn policy() -> PolicyConfig {
    PolicyConfig::default()
}

/// Directory with one person per role, a second line manager, and an active project.
pub(super) fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store.upsert_user(user("u-admin", Role::Admin, None));
    store.upsert_user(user("u-hr", Role::Hr, None));
    store.upsert_user(user("u-pm", Role::Pm, Some("u-lm")));
    store.upsert_user(user("u-lm", Role::LineManager, None));
    store.upsert_user(user("u-lm2", Role::LineManager, None));
    store.upsert_user(user("u-emp", Role::Employee, Some("u-lm")));
    store.upsert_user(user("u-peer", Role::Employee, Some("u-lm2")));
    let mut retired = user("u-retired", Role::Employee, Some("u-lm"));
    retired.active = false;
    store.upsert_user(retired);

    store.upsert_project(ProjectRecord {
        id: ProjectId::new("p-orion"),
        name: "Apollo".to_string(),
        manager: UserId::new("u-pm"),
        active: true,
    });
    store.upsert_project(ProjectRecord {
        id: ProjectId::new("p-legacy"),
        name: "Legacy".to_string(),
        manager: UserId::new("u-pm"),
        active: false,
    });
    store.register_proof(ProofVerification::pending(
        ProofId("proof-emp-rust".to_string()),
        UserId::new("u-emp"),
    ));
    store.register_proof(ProofVerification::pending(
        ProofId("proof-peer-go".to_string()),
        UserId::new("u-peer"),
    ));
    store
}

pub(super) fn build_service() -> (MemoryService, Arc<InMemoryStore>) {
    build_service_with(StageTable::standard())
}

pub(super) fn build_service_with(stages: StageTable) -> (MemoryService, Arc<InMemoryStore>) {
    let store = Arc::new(seeded_store());
    let service = ApprovalService::with_stages(
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&store),
        policy(),
        stages,
    );
    (service, store)
}

pub(super) fn actor(id: &str) -> Actor {
    let role = match id {
        "u-admin" => Role::Admin,
        "u-hr" => Role::Hr,
        "u-pm" => Role::Pm,
        "u-lm" | "u-lm2" => Role::LineManager,
        _ => Role::Employee,
    };
    Actor {
        user_id: UserId::new(id),
        email: format!("{id}@staffing.test"),
        role,
    }
}

pub(super) fn admin() -> Actor {
    actor("u-admin")
}

pub(super) fn hr() -> Actor {
    actor("u-hr")
}

pub(super) fn pm() -> Actor {
    actor("u-pm")
}

pub(super) fn lm() -> Actor {
    actor("u-lm")
}

pub(super) fn employee() -> Actor {
    actor("u-emp")
}

/// Facts the service resolves for a request about `u-emp` on `p-orion`.
pub(super) fn employee_target(requester: &str) -> AccessTarget {
    AccessTarget::subject(UserId::new("u-emp"))
        .with_line_manager(Some(UserId::new("u-lm")))
        .with_requester(UserId::new(requester))
        .with_project(ProjectId::new("p-orion"), UserId::new("u-pm"))
}

pub(super) fn resource_input() -> ResourceRequestInput {
    ResourceRequestInput {
        subject: UserId::new("u-emp"),
        project: ProjectId::new("p-orion"),
        percentage: 60,
        role: "Backend engineer".to_string(),
        start_date: date(2030, 3, 4),
        end_date: Some(date(2030, 9, 30)),
    }
}

/// Monday to Friday, five working days.
pub(super) fn leave_input() -> LeaveRequestInput {
    LeaveRequestInput {
        subject: None,
        leave_type: LeaveType::Annual,
        start_date: date(2030, 3, 4),
        end_date: date(2030, 3, 8),
        reason: "Family trip".to_string(),
        covering_user: Some(UserId::new("u-peer")),
    }
}

pub(super) fn overtime_input(hours: f64) -> OvertimeRequestInput {
    OvertimeRequestInput {
        subject: None,
        project: ProjectId::new("p-orion"),
        date: date(2030, 3, 9),
        hours,
        compensation: CompensationType::TimeOff,
        reason: "Release weekend".to_string(),
    }
}

pub(super) fn skill_input() -> SkillVerificationInput {
    SkillVerificationInput {
        skill: SkillId("rust".to_string()),
        proof: ProofId("proof-emp-rust".to_string()),
        claimed_level: 4,
    }
}

pub(super) fn approve() -> DecisionInput {
    DecisionInput {
        action: DecisionAction::Approve,
        reason: None,
        expected_stage: None,
    }
}

pub(super) fn approve_at(stage: Stage) -> DecisionInput {
    DecisionInput {
        expected_stage: Some(stage),
        ..approve()
    }
}

pub(super) fn reject(reason: &str) -> DecisionInput {
    DecisionInput {
        action: DecisionAction::Reject,
        reason: Some(reason.to_string()),
        expected_stage: None,
    }
}

pub(super) fn stored(store: &InMemoryStore, id: &RequestId) -> ApprovalRequest {
    store
        .fetch(id)
        .expect("fetch succeeds")
        .expect("request is stored")
}

pub(super) fn assert_status(store: &InMemoryStore, id: &RequestId, status: ApprovalStatus) {
    assert_eq!(stored(store, id).status, status);
}

/// Request repository that is never reachable.
pub(super) struct UnavailableRequests;

impl RequestRepository for UnavailableRequests {
    fn insert(&self, _request: ApprovalRequest) -> Result<ApprovalRequest, RepositoryError> {
        Err(RepositoryError::Unavailable("requests offline".to_string()))
    }

    fn fetch(&self, _id: &RequestId) -> Result<Option<ApprovalRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("requests offline".to_string()))
    }

    fn compare_and_swap(
        &self,
        _expected: ApprovalStatus,
        _request: ApprovalRequest,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("requests offline".to_string()))
    }

    fn for_subject(&self, _subject: &UserId) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("requests offline".to_string()))
    }
}

pub(super) fn api_router() -> (axum::Router, Arc<InMemoryStore>) {
    let store = Arc::new(seeded_store());
    let api = Arc::new(StaffingApi::new(Arc::clone(&store), policy()));
    (crate::api::router(api), store)
}

pub(super) fn json_request(method: &str, uri: &str, actor: Option<&str>, body: Value) -> Request<axum::body::Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(actor) = actor {
        builder = builder.header(ACTOR_HEADER, format!("{actor}@staffing.test"));
    }
    builder
        .body(axum::body::Body::from(body.to_string()))
        .expect("request")
}

pub(super) fn empty_request(method: &str, uri: &str, actor: Option<&str>) -> Request<axum::body::Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header(ACTOR_HEADER, format!("{actor}@staffing.test"));
    }
    builder.body(axum::body::Body::empty()).expect("request")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn assert_conflict_response(response: &Response) {
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
