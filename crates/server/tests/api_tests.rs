//! API surface tests over the in-memory backend.

use axum_test::TestServer;
use serde_json::json;

use cadence_server::{AppState, CadenceConfig, build_state};
use cadence_store::ProjectStore;

fn test_state() -> AppState {
    let config: CadenceConfig = toml::from_str(
        r#"
        [auth]
        jwt_secret = "test-secret"

        [alerts]
        ops_escalation_email = "ops@example.com"
        "#,
    )
    .unwrap();
    build_state(config).unwrap()
}

fn server(state: &AppState) -> TestServer {
    TestServer::new(cadence_server::api::router(state.clone())).unwrap()
}

fn two_task_plan() -> serde_json::Value {
    json!({
        "program": { "external_id": "PROG-1", "name": "Launch" },
        "resources": [
            { "external_id": "R-1", "name": "Ada", "email": "ada@example.com" }
        ],
        "work_items": [
            {
                "external_id": "T-1",
                "name": "Design",
                "project_external_id": "PROJ-1",
                "phase_external_id": "PHS-1",
                "planned_start": "2024-02-05",
                "planned_end": "2024-02-09",
                "assigned_resource": "R-1"
            },
            {
                "external_id": "T-2",
                "name": "Build",
                "project_external_id": "PROJ-1",
                "phase_external_id": "PHS-1",
                "planned_start": "2024-02-12",
                "planned_end": "2024-02-16",
                "assigned_resource": "R-1"
            }
        ],
        "dependencies": [
            {
                "successor_external_id": "T-2",
                "predecessor_external_id": "T-1"
            }
        ]
    })
}

#[tokio::test]
async fn health_endpoint_responds() {
    let state = test_state();
    let server = server(&state);
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "ok" }));
}

#[tokio::test]
async fn import_endpoint_returns_structured_report() {
    let state = test_state();
    let server = server(&state);

    let response = server.post("/import").json(&two_task_plan()).await;
    response.assert_status_ok();
    let report: serde_json::Value = response.json();
    assert_eq!(report["status"], "success");
    assert_eq!(report["tasks_created"], 2);
    assert_eq!(report["dependencies_synced"], 1);
    assert_eq!(report["project_end_date"], "2024-02-16");

    // Batches are listable for the program.
    let program_id = report["program_id"].as_str().unwrap().to_owned();
    let response = server
        .get("/import/batches")
        .add_query_param("program_id", &program_id)
        .await;
    response.assert_status_ok();
    let batches: serde_json::Value = response.json();
    assert_eq!(batches.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_plan_is_a_422() {
    let state = test_state();
    let server = server(&state);

    let mut plan = two_task_plan();
    plan["work_items"][0]["planned_end"] = json!("2024-01-01");
    let response = server.post("/import").json(&plan).await;
    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    let report: serde_json::Value = response.json();
    assert_eq!(report["status"], "validation_failed");
    assert!(!report["validation"]["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn respond_endpoint_round_trip() {
    let state = test_state();
    let server = server(&state);
    server.post("/import").json(&two_task_plan()).await.assert_status_ok();

    // Find the imported T-1 and its owner, then create the alert the way
    // the daily scan would.
    let program = state
        .store
        .find_program_by_external_id(&cadence_core::ExternalId::from("PROG-1"))
        .await
        .unwrap()
        .unwrap();
    let item = state
        .store
        .list_work_items_by_program(program.id)
        .await
        .unwrap()
        .into_iter()
        .find(|i| i.external_id.as_str() == "T-1")
        .unwrap();
    // Token expiry hangs off the alert deadline; keep it in the future so
    // the link verifies.
    let deadline = chrono::Utc::now().date_naive() + chrono::Duration::days(10);
    let creation = state
        .orchestrator
        .create_status_check_alert(
            item.id,
            deadline,
            item.resource_id.unwrap(),
            Some(program.id),
            0,
            None,
            None,
        )
        .await
        .unwrap();

    let alert = state.store.get_alert(creation.alert_id).await.unwrap().unwrap();
    let link = alert.metadata["magic_link"].as_str().unwrap();
    let token = link.split("token=").nth(1).unwrap();

    let response = server
        .post("/alerts/respond")
        .json(&json!({
            "token": token,
            "reported_status": "DELAYED",
            "proposed_new_date": "2024-02-14",
            "reason_category": "SCOPE_INCREASE",
            "reason_details": { "additional_work_percent": 40.0 },
            "idempotency_key": "K1"
        }))
        .await;
    response.assert_status_ok();
    let outcome: serde_json::Value = response.json();
    assert_eq!(outcome["requires_approval"], true);
    assert_eq!(outcome["impact"]["delay_days"], 5);

    // Reusing the revoked token is refused with the token-revoked kind.
    let response = server
        .post("/alerts/respond")
        .json(&json!({
            "token": token,
            "reported_status": "ON_TRACK"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CONFLICT);
    let error: serde_json::Value = response.json();
    assert_eq!(error["kind"], "TokenRevoked");

    // The delay sits in the approval queue.
    let response = server.get("/alerts/approvals").await;
    response.assert_status_ok();
    let approvals: serde_json::Value = response.json();
    assert_eq!(approvals.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let state = test_state();
    let server = server(&state);
    let response = server
        .post("/alerts/respond")
        .json(&json!({
            "token": "not-a-token",
            "reported_status": "ON_TRACK"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    let error: serde_json::Value = response.json();
    assert_eq!(error["kind"], "TokenInvalid");
}

#[tokio::test]
async fn holidays_crud_round_trip() {
    let state = test_state();
    let server = server(&state);

    let response = server
        .post("/holidays")
        .json(&json!({
            "date": "2024-02-19",
            "country_code": "US",
            "name": "Presidents' Day"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let holiday: serde_json::Value = response.json();
    let id = holiday["id"].as_str().unwrap().to_owned();

    let response = server.get("/holidays").await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>().as_array().unwrap().len(), 1);

    let response = server.delete(&format!("/holidays/{id}")).await;
    response.assert_status(axum::http::StatusCode::NO_CONTENT);

    let response = server.get("/holidays").await;
    assert!(response.json::<serde_json::Value>().as_array().unwrap().is_empty());
}

#[tokio::test]
async fn escalation_chain_endpoint_lists_levels() {
    let state = test_state();
    let server = server(&state);
    server.post("/import").json(&two_task_plan()).await.assert_status_ok();

    let resource = state
        .store
        .find_resource_by_external_id(&cadence_core::ExternalId::from("R-1"))
        .await
        .unwrap()
        .unwrap();

    let response = server
        .get(&format!("/resources/{}/escalation-chain", resource.id))
        .await;
    response.assert_status_ok();
    let chain: serde_json::Value = response.json();
    // Owner at level 0, plus the ops fallback at level 3.
    let levels: Vec<i64> = chain
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["escalation_level"].as_i64().unwrap())
        .collect();
    assert_eq!(levels, vec![0, 3]);
}
