use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use roam_types::api::{Claims, MarkAttendanceRequest};
use roam_types::events::GatewayEvent;

use crate::auth::AppState;
use crate::error::{ApiError, join_error};

pub async fn roster(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let entries = tokio::task::spawn_blocking(move || {
        roam_core::attendance::roster(&db.db, trip_id, claims.sub)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(entries))
}

pub async fn mark_attendance(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MarkAttendanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let participant = req.participant_id;
    let entry = tokio::task::spawn_blocking(move || {
        roam_core::attendance::mark(&db.db, trip_id, claims.sub, participant, req.status)
    })
    .await
    .map_err(join_error)??;

    state
        .dispatcher
        .send_to_user(
            participant,
            GatewayEvent::AttendanceMarked {
                trip_id,
                status: entry.status,
            },
        )
        .await;

    Ok(Json(entry))
}
