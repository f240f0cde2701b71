use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use cadence_core::Holiday;
use cadence_store::ProjectStore;

use crate::error::ServerError;
use crate::state::AppState;

/// Optional country filter for `GET /holidays`.
#[derive(Debug, Deserialize)]
pub struct HolidayQuery {
    pub country: Option<String>,
}

/// `GET /holidays[?country=]`.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<HolidayQuery>,
) -> Result<Json<Vec<Holiday>>, ServerError> {
    let mut holidays = state.store.list_holidays(query.country.as_deref()).await?;
    holidays.sort_by_key(|h| h.date);
    Ok(Json(holidays))
}

/// Body of `POST /holidays`.
#[derive(Debug, Deserialize)]
pub struct CreateHoliday {
    pub date: NaiveDate,
    pub country_code: Option<String>,
    pub name: Option<String>,
}

/// `POST /holidays` — add a holiday and invalidate the calendar cache.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateHoliday>,
) -> Result<impl IntoResponse, ServerError> {
    let holiday = state
        .store
        .insert_holiday(Holiday {
            id: Uuid::new_v4(),
            date: body.date,
            country_code: body.country_code,
            name: body.name,
        })
        .await?;
    state.holidays.invalidate();
    Ok((StatusCode::CREATED, Json(holiday)))
}

/// `DELETE /holidays/{id}`.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServerError> {
    let removed = state.store.delete_holiday(id).await?;
    state.holidays.invalidate();
    if removed {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "kind": "ResourceNotFound",
                "message": format!("holiday {id} not found"),
            })),
        )
            .into_response())
    }
}
