use axum::Json;
use axum::extract::{Path, State};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use cadence_core::{ReasonCategory, ReportedStatus};
use cadence_orchestrator::{OrchestratorError, StatusResponseRequest};
use cadence_store::ProjectStore;

use crate::error::ServerError;
use crate::state::AppState;

/// Body of `POST /alerts/respond`.
#[derive(Debug, Deserialize)]
pub struct RespondBody {
    /// The magic-link token from the response URL.
    pub token: String,
    pub reported_status: ReportedStatus,
    pub proposed_new_date: Option<NaiveDate>,
    pub reason_category: Option<ReasonCategory>,
    pub reason_details: Option<serde_json::Value>,
    pub comment: Option<String>,
    pub idempotency_key: Option<String>,
    /// Explicit alert override; normally resolved through the token.
    pub alert_id: Option<Uuid>,
}

/// `POST /alerts/respond` — submit a status response through a magic link.
///
/// The responder and alert are resolved from the signed token; the body
/// only carries what the person reported.
pub async fn respond(
    State(state): State<AppState>,
    Json(body): Json<RespondBody>,
) -> Result<Json<cadence_orchestrator::ResponseOutcome>, ServerError> {
    let claims = state
        .signer
        .verify(&body.token)
        .map_err(OrchestratorError::from)?;

    let alert_id = match body.alert_id {
        Some(id) => id,
        None => {
            let row = state
                .store
                .find_token_by_hash(&cadence_token::hash_token(&body.token))
                .await?;
            row.and_then(|r| r.alert_id)
                .or(claims.aid)
                .ok_or_else(|| {
                    OrchestratorError::TokenInvalid(
                        "token does not resolve to an alert".to_owned(),
                    )
                })?
        }
    };

    let outcome = state
        .orchestrator
        .process_status_response(StatusResponseRequest {
            alert_id,
            responder_id: claims.sub,
            reported_status: body.reported_status,
            token: Some(body.token),
            proposed_new_date: body.proposed_new_date,
            reason_category: body.reason_category,
            reason_details: body.reason_details,
            comment: body.comment,
            idempotency_key: body.idempotency_key,
        })
        .await?;
    Ok(Json(outcome))
}

/// `GET /alerts/approvals` — the PM approval queue.
pub async fn list_pending_approvals(
    State(state): State<AppState>,
) -> Result<Json<Vec<cadence_orchestrator::PendingApproval>>, ServerError> {
    Ok(Json(state.orchestrator.pending_approvals().await?))
}

/// Body of the approve endpoint.
#[derive(Debug, Deserialize)]
pub struct ApproveBody {
    pub approver_resource_id: Uuid,
}

/// `POST /alerts/approvals/{response_id}/approve`.
pub async fn approve(
    State(state): State<AppState>,
    Path(response_id): Path<Uuid>,
    Json(body): Json<ApproveBody>,
) -> Result<Json<cadence_orchestrator::ApplyDelayResult>, ServerError> {
    let applied = state
        .orchestrator
        .approve_delay(response_id, body.approver_resource_id)
        .await?;
    Ok(Json(applied))
}

/// Body of the reject endpoint.
#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub approver_resource_id: Uuid,
    pub reason: String,
}

/// `POST /alerts/approvals/{response_id}/reject`.
pub async fn reject(
    State(state): State<AppState>,
    Path(response_id): Path<Uuid>,
    Json(body): Json<RejectBody>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state
        .orchestrator
        .reject_delay(response_id, body.approver_resource_id, body.reason.clone())
        .await?;
    Ok(Json(serde_json::json!({
        "rejected": true,
        "response_id": response_id,
        "reason": body.reason,
    })))
}

/// `GET /alerts/{id}/escalation-summary` — the alert's escalation history.
pub async fn escalation_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<cadence_orchestrator::EscalationSummary>, ServerError> {
    Ok(Json(state.orchestrator.escalation_summary(id).await?))
}
