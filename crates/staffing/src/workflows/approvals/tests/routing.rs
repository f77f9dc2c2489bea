use axum::http::StatusCode;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;

fn resource_body() -> Value {
    json!({
        "subject": "u-emp",
        "project": "p-orion",
        "percentage": 50,
        "role": "Data engineer",
        "start_date": "2030-03-04",
        "end_date": null
    })
}

async fn submit_resource(app: &axum::Router) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/requests/resource",
            Some("u-pm"),
            resource_body(),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "pending_lm");
    body["request_id"].as_str().expect("request id").to_string()
}

#[tokio::test]
async fn missing_identity_is_unauthenticated() {
    let (app, _store) = api_router();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/requests/resource",
            None,
            resource_body(),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "unauthenticated");
}

#[tokio::test]
async fn deactivated_actor_is_unauthenticated() {
    let (app, _store) = api_router();

    let response = app
        .oneshot(empty_request("GET", "/api/v1/notifications", Some("u-retired")))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn decision_endpoint_walks_the_stages() {
    let (app, _store) = api_router();
    let request_id = submit_resource(&app).await;
    let decision_uri = format!("/api/v1/requests/{request_id}/decision");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &decision_uri,
            Some("u-lm"),
            json!({ "action": "approve", "expected_stage": "line_manager" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["status"], "pending_hr");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &decision_uri,
            Some("u-hr"),
            json!({ "action": "approve" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "approved");
    assert_eq!(body["effects"][0]["outcome"], "allocation_created");

    let response = app
        .oneshot(json_request(
            "POST",
            &decision_uri,
            Some("u-admin"),
            json!({ "action": "reject", "reason": "late" }),
        ))
        .await
        .expect("router responds");
    assert_conflict_response(&response);
    assert_eq!(read_json_body(response).await["kind"], "stage_mismatch");
}

#[tokio::test]
async fn employee_decision_is_forbidden() {
    let (app, _store) = api_router();
    let request_id = submit_resource(&app).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/requests/{request_id}/decision"),
            Some("u-peer"),
            json!({ "action": "approve" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json_body(response).await["kind"], "unauthorized");
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let (app, _store) = api_router();

    let response = app
        .oneshot(empty_request("GET", "/api/v1/requests/req-missing", Some("u-hr")))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn insufficient_leave_is_unprocessable() {
    let (app, _store) = api_router();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/v1/leave-balances/u-emp/2030",
            Some("u-hr"),
            json!({ "entitlement": 2 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["remaining"], 2);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/requests/leave",
            Some("u-emp"),
            json!({
                "leave_type": "annual",
                "start_date": "2030-03-04",
                "end_date": "2030-03-08"
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        read_json_body(response).await["kind"],
        "insufficient_balance"
    );
}

#[tokio::test]
async fn cancel_accepts_an_empty_body() {
    let (app, _store) = api_router();
    let request_id = submit_resource(&app).await;

    let response = app
        .oneshot(empty_request(
            "POST",
            &format!("/api/v1/requests/{request_id}/cancel"),
            Some("u-pm"),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["status"], "cancelled");
}

#[tokio::test]
async fn role_change_is_admin_only_and_never_self() {
    let (app, store) = api_router();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/v1/users/u-emp/role",
            Some("u-hr"),
            json!({ "role": "line_manager" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/v1/users/u-admin/role",
            Some("u-admin"),
            json!({ "role": "employee" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/v1/users/u-emp/role",
            Some("u-admin"),
            json!({ "role": "line_manager", "reason": "Promotion" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["role"], "line_manager");
    assert_eq!(store.role_changes().len(), 1);
}

#[tokio::test]
async fn notifications_list_only_the_callers_inbox() {
    let (app, _store) = api_router();
    submit_resource(&app).await;

    let response = app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/api/v1/notifications?unread_only=true",
            Some("u-lm"),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let items = body.as_array().expect("array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["notification_type"], "resource_request_submitted");
    let id = items[0]["id"].as_str().expect("id").to_string();

    let response = app
        .clone()
        .oneshot(empty_request(
            "POST",
            &format!("/api/v1/notifications/{id}/read"),
            Some("u-hr"),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(empty_request(
            "POST",
            &format!("/api/v1/notifications/{id}/read"),
            Some("u-lm"),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["read"], true);
}
