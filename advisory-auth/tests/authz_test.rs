mod common;

use advisory_auth::models::Role;
use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::{json, Value};

async fn check(app: &TestApp, token: &str, request: Value) -> Value {
    let (status, body) = app
        .send(Method::POST, "/authz/check", Some(token), Some(request))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body
}

#[tokio::test]
async fn test_employee_scoped_to_assigned_clients() {
    let app = TestApp::new().await;
    let employee_a = app.create_identity("a@x.com", Role::Employee).await;
    let employee_b = app.create_identity("b@x.com", Role::Employee).await;
    let token = app.access_token(&employee_a);

    let assigned_to = |employee_id: Option<i64>| {
        json!({
            "grant": "VIEW_CLIENT",
            "resource": { "kind": "client", "id": 77, "assigned_employee_id": employee_id }
        })
    };

    let body = check(&app, &token, assigned_to(Some(employee_a.id))).await;
    assert_eq!(body["allowed"], true);
    assert_eq!(body["resource_kind"], "client");

    let body = check(&app, &token, assigned_to(Some(employee_b.id))).await;
    assert_eq!(body["allowed"], false);

    let body = check(&app, &token, assigned_to(None)).await;
    assert_eq!(body["allowed"], false);
}

#[tokio::test]
async fn test_supplied_facts_never_add_grants() {
    let app = TestApp::new().await;
    let employee = app.create_identity("a@x.com", Role::Employee).await;
    let client = app.create_identity("c@x.com", Role::Client).await;

    // The decision holds for the facts given, but only within the caller's grants.
    let body = check(
        &app,
        &app.access_token(&employee),
        json!({
            "grant": "MANAGE_ROLES",
            "resource": { "kind": "client", "id": 77, "assigned_employee_id": employee.id }
        }),
    )
    .await;
    assert_eq!(body["allowed"], false);

    // A client is never granted another client's record, whatever it claims.
    let body = check(
        &app,
        &app.access_token(&client),
        json!({
            "grant": "VIEW_CLIENT",
            "resource": { "kind": "client", "id": 77, "assigned_employee_id": client.id }
        }),
    )
    .await;
    assert_eq!(body["allowed"], false);
}

#[tokio::test]
async fn test_client_sees_only_own_investments() {
    let app = TestApp::new().await;
    let client = app.create_identity("c@x.com", Role::Client).await;
    let token = app.access_token(&client);

    let investment = |owner: i64| {
        json!({
            "grant": "VIEW_OWN_INVESTMENTS",
            "resource": { "kind": "investment", "id": 5, "owner_client_id": owner }
        })
    };

    assert_eq!(check(&app, &token, investment(client.id)).await["allowed"], true);
    assert_eq!(check(&app, &token, investment(client.id + 100)).await["allowed"], false);

    // Grants outside the client's set are denied even without a resource.
    let body = check(&app, &token, json!({ "grant": "CREATE_INVESTMENT" })).await;
    assert_eq!(body["allowed"], false);
    assert!(body.get("resource_kind").is_none());
}

#[tokio::test]
async fn test_admin_allowed_everywhere_and_unknown_kinds_denied() {
    let app = TestApp::new().await;
    let admin = app.create_identity("admin@x.com", Role::Admin).await;
    let token = app.access_token(&admin);

    let body = check(
        &app,
        &token,
        json!({
            "grant": "DELETE_INVESTMENT",
            "resource": { "kind": "investment", "id": 1, "owner_client_id": 42 }
        }),
    )
    .await;
    assert_eq!(body["allowed"], true);

    let body = check(
        &app,
        &token,
        json!({ "grant": "VIEW_CLIENT", "resource": { "kind": "portfolio", "id": 1 } }),
    )
    .await;
    assert_eq!(body["allowed"], false);
}

#[tokio::test]
async fn test_anonymous_check_is_unauthorized() {
    let app = TestApp::new().await;
    let (status, _) = app
        .send(
            Method::POST,
            "/authz/check",
            None,
            Some(json!({ "grant": "VIEW_OWN_ACCOUNT" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
