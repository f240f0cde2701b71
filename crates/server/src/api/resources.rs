use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use uuid::Uuid;

use cadence_core::EscalationRecipient;
use cadence_orchestrator::{PmContact, get_escalation_chain};
use cadence_store::ProjectStore;

use crate::error::ServerError;
use crate::state::AppState;

/// Optional program context for the PM level of the chain.
#[derive(Debug, Deserialize)]
pub struct ChainQuery {
    pub program_id: Option<Uuid>,
}

/// `GET /resources/{id}/escalation-chain` — the resolved Primary → Backup →
/// Manager → PM chain for a resource.
pub async fn escalation_chain(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<Vec<EscalationRecipient>>, ServerError> {
    let program = match query.program_id {
        Some(program_id) => state.store.get_program(program_id).await?,
        None => None,
    };
    let ops = state
        .config
        .alerts
        .ops_escalation_email
        .as_ref()
        .map(|email| PmContact {
            resource_id: None,
            name: state.config.alerts.ops_escalation_name.clone(),
            email: email.clone(),
            timezone: "UTC".to_owned(),
        });

    let chain = get_escalation_chain(&*state.store, id, program.as_ref(), ops.as_ref()).await?;
    Ok(Json(chain))
}
