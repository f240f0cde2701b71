use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use cadence_ingest::{ImportOptions, ImportStatus, ParsedPlan};
use cadence_store::ProjectStore;

use crate::error::ServerError;
use crate::state::AppState;

fn default_true() -> bool {
    true
}

/// Query parameters of `POST /import`.
#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_true")]
    pub perform_ghost_check: bool,
    #[serde(default = "default_true")]
    pub trigger_recalculation: bool,
    #[serde(default)]
    pub save_baseline_version: bool,
    pub file_name: Option<String>,
}

/// `POST /import` — run the three-pass import over a normalized plan.
///
/// The body is the reader's normalized row output. The HTTP status follows
/// the report: 200 for success/partial, 422 for validation failure, 500 for
/// an execute-phase failure.
pub async fn run_import(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    Json(plan): Json<ParsedPlan>,
) -> impl IntoResponse {
    let file_hash = hex::encode(Sha256::digest(
        serde_json::to_vec(&plan).unwrap_or_default(),
    ));
    let options = ImportOptions {
        dry_run: query.dry_run,
        perform_ghost_check: query.perform_ghost_check,
        trigger_recalculation: query.trigger_recalculation,
        save_baseline_version: query.save_baseline_version,
        file_name: query.file_name.unwrap_or_else(|| "upload.json".to_owned()),
        file_hash,
        imported_by: "api:import".to_owned(),
    };

    let report = state.pipeline.run(&plan, &options).await;
    let status = match report.status {
        ImportStatus::Success | ImportStatus::PartialSuccess => StatusCode::OK,
        ImportStatus::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ImportStatus::Failed => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(report))
}

/// Query parameters carrying a program id.
#[derive(Debug, Deserialize)]
pub struct ProgramQuery {
    pub program_id: Uuid,
}

/// `GET /import/batches?program_id=` — list batches, newest first.
pub async fn list_batches(
    State(state): State<AppState>,
    Query(query): Query<ProgramQuery>,
) -> Result<impl IntoResponse, ServerError> {
    let batches = state.store.list_import_batches(query.program_id).await?;
    Ok(Json(batches))
}

/// `GET /import/batches/{id}`.
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServerError> {
    match state.store.get_import_batch(id).await? {
        Some(batch) => Ok(Json(batch).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "kind": "ResourceNotFound",
                "message": format!("import batch {id} not found"),
            })),
        )
            .into_response()),
    }
}

/// `GET /import/baseline-versions?program_id=`.
pub async fn list_baseline_versions(
    State(state): State<AppState>,
    Query(query): Query<ProgramQuery>,
) -> Result<impl IntoResponse, ServerError> {
    let versions = state.store.list_baseline_versions(query.program_id).await?;
    Ok(Json(versions))
}
