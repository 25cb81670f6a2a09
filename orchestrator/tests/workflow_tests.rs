// Integration tests for the orchestrator

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::StatusCode;
use regex::Regex;
use serde_json::{json, Value};

mod common;
use common::TestApp;

static FEATURE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3}-[a-z0-9-]+$").unwrap());

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::spawn().await.unwrap();

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn happy_workflow_runs_one_phase_and_completes_on_approval() {
    let app = TestApp::spawn().await.unwrap();

    let response = app
        .post(
            "/workflows",
            &json!({
                "workflow_type": "specify",
                "feature_description": "Add user authentication with OAuth2 support",
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let created: Value = response.json().await.unwrap();
    assert_eq!(created["status"], "in_progress");
    assert_eq!(
        created["feature_id"],
        "001-add-user-authentication-with-oauth2-support"
    );
    assert!(FEATURE_ID_RE.is_match(created["feature_id"].as_str().unwrap()));
    let id = created["id"].as_str().unwrap().to_string();

    // The executor finishes the phase and parks the workflow for approval.
    let waiting = app
        .wait_for_status(&id, "waiting_approval", Duration::from_secs(3))
        .await;
    assert_eq!(waiting["current_phase"], "specify");
    assert_eq!(waiting["result"]["document"], "spec.md");

    // The phase request went to the default agent with the feature context.
    let requests = app.hub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "baron");
    assert_eq!(requests[0].1["workflow_type"], "specify");
    assert_eq!(
        requests[0].1["context"]["feature_id"],
        "001-add-user-authentication-with-oauth2-support"
    );

    let response = app
        .post(
            &format!("/workflows/{id}/advance"),
            &json!({ "trigger": "human_approved" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let completed: Value = response.json().await.unwrap();
    assert_eq!(completed["status"], "completed");
    assert!(completed["completed_at"].is_string());

    // Exactly three chained history rows.
    let history: Value = app
        .get(&format!("/workflows/{id}/history"))
        .await
        .json()
        .await
        .unwrap();
    let rows = history.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    let edges: Vec<(&str, &str, &str)> = rows
        .iter()
        .map(|r| {
            (
                r["from_status"].as_str().unwrap(),
                r["to_status"].as_str().unwrap(),
                r["trigger"].as_str().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        edges,
        vec![
            ("pending", "in_progress", "start"),
            ("in_progress", "waiting_approval", "agent_complete"),
            ("waiting_approval", "completed", "human_approved"),
        ]
    );
    for pair in rows.windows(2) {
        assert_eq!(pair[1]["from_status"], pair[0]["to_status"]);
    }
}

#[tokio::test]
async fn feature_ids_increment_from_the_store() {
    let app = TestApp::spawn().await.unwrap();

    let first: Value = app
        .post(
            "/workflows",
            &json!({
                "workflow_type": "specify",
                "feature_description": "First feature with enough length",
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let second: Value = app
        .post(
            "/workflows",
            &json!({
                "workflow_type": "plan",
                "feature_description": "Second feature with enough length",
            }),
        )
        .await
        .json()
        .await
        .unwrap();

    assert!(first["feature_id"].as_str().unwrap().starts_with("001-"));
    assert!(second["feature_id"].as_str().unwrap().starts_with("002-"));
}

#[tokio::test]
async fn short_descriptions_fail_validation() {
    let app = TestApp::spawn().await.unwrap();

    // Nine characters rejects...
    let response = app
        .post(
            "/workflows",
            &json!({ "workflow_type": "specify", "feature_description": "nine char" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "validation");

    // ...ten passes.
    let response = app
        .post(
            "/workflows",
            &json!({ "workflow_type": "specify", "feature_description": "ten chars!" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn unknown_workflow_type_fails_validation() {
    let app = TestApp::spawn().await.unwrap();

    let response = app
        .post(
            "/workflows",
            &json!({ "workflow_type": "deploy", "feature_description": "A long enough description" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "validation");
}

#[tokio::test]
async fn rejection_reworks_the_same_phase() {
    let app = TestApp::spawn().await.unwrap();

    let created: Value = app
        .post(
            "/workflows",
            &json!({
                "workflow_type": "plan",
                "feature_description": "Plan the caching layer carefully",
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    app.wait_for_status(&id, "waiting_approval", Duration::from_secs(3))
        .await;

    let response = app
        .post(
            &format!("/workflows/{id}/advance"),
            &json!({ "trigger": "human_rejected" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Rework runs the same phase again and parks once more.
    let waiting = app
        .wait_for_status(&id, "waiting_approval", Duration::from_secs(3))
        .await;
    assert_eq!(waiting["current_phase"], "plan");
    assert_eq!(app.hub.requests().len(), 2);

    let history: Value = app
        .get(&format!("/workflows/{id}/history"))
        .await
        .json()
        .await
        .unwrap();
    let rows = history.as_array().unwrap();
    assert_eq!(rows.len(), 4);
    for pair in rows.windows(2) {
        assert_eq!(pair[1]["from_status"], pair[0]["to_status"]);
    }
}

#[tokio::test]
async fn illegal_transition_leaves_workflow_and_history_untouched() {
    let app = TestApp::spawn().await.unwrap();

    let created: Value = app
        .post(
            "/workflows",
            &json!({
                "workflow_type": "specify",
                "feature_description": "Ship the settings page redesign",
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    app.wait_for_status(&id, "waiting_approval", Duration::from_secs(3))
        .await;
    app.post(
        &format!("/workflows/{id}/advance"),
        &json!({ "trigger": "human_approved" }),
    )
    .await;

    // Against a completed workflow, another approval is illegal.
    let response = app
        .post(
            &format!("/workflows/{id}/advance"),
            &json!({ "trigger": "human_approved" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "invalid_transition");

    let history: Value = app
        .get(&format!("/workflows/{id}/history"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(history.as_array().unwrap().len(), 3);

    let snapshot: Value = app
        .get(&format!("/workflows/{id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["status"], "completed");
}

#[tokio::test]
async fn fatal_hub_errors_fail_the_workflow() {
    let app = TestApp::spawn().await.unwrap();
    // 400 from the hub is not retryable, so the failure is immediate.
    app.hub.fail_with(400);

    let created: Value = app
        .post(
            "/workflows",
            &json!({
                "workflow_type": "tasks",
                "feature_description": "Break the migration into tasks",
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let failed = app
        .wait_for_status(&id, "failed", Duration::from_secs(3))
        .await;
    assert!(failed["error"].is_string());
    assert!(failed["completed_at"].is_null());

    let history: Value = app
        .get(&format!("/workflows/{id}/history"))
        .await
        .json()
        .await
        .unwrap();
    let rows = history.as_array().unwrap();
    assert_eq!(rows.last().unwrap()["trigger"], "error");
    assert_eq!(rows.last().unwrap()["to_status"], "failed");

    // Redelivering the error trigger is idempotent: same snapshot, no row.
    let response = app
        .post(
            &format!("/workflows/{id}/advance"),
            &json!({ "trigger": "error" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let history: Value = app
        .get(&format!("/workflows/{id}/history"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(history.as_array().unwrap().len(), rows.len());
}

#[tokio::test]
async fn unknown_workflow_is_404() {
    let app = TestApp::spawn().await.unwrap();

    let response = app.get("/workflows/no-such-workflow").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unknown_workflow");

    let response = app
        .post(
            "/workflows/no-such-workflow/advance",
            &json!({ "trigger": "human_approved" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn workflows_are_listed_newest_first() {
    let app = TestApp::spawn().await.unwrap();

    for description in [
        "First listed feature description",
        "Second listed feature description",
    ] {
        app.post(
            "/workflows",
            &json!({ "workflow_type": "specify", "feature_description": description }),
        )
        .await;
    }

    let listed: Value = app.get("/workflows").await.json().await.unwrap();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed[0]["feature_id"].as_str().unwrap().starts_with("002-"));
    assert!(listed[1]["feature_id"].as_str().unwrap().starts_with("001-"));
}
