use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use roam_core::CoreError;
use uuid::Uuid;

use roam_types::RequestStatus;
use roam_types::api::{Claims, SubmitRequestRequest};
use roam_types::events::GatewayEvent;

use crate::auth::AppState;
use crate::error::{ApiError, join_error};

pub async fn submit_request(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitRequestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let requester = claims.sub;
    let (request, requester_profile) = tokio::task::spawn_blocking(move || {
        let request =
            roam_core::requests::submit(&db.db, trip_id, requester, &req.message, &req.item_ids)?;
        let row = db
            .db
            .get_user(&requester.to_string())?
            .ok_or(CoreError::NotFound("user"))?;
        Ok::<_, CoreError>((request, roam_core::privacy::project(&row)))
    })
    .await
    .map_err(join_error)??;

    // Nudge the host; delivery is best-effort.
    state
        .dispatcher
        .send_to_user(
            request.trip_host_id,
            GatewayEvent::RequestSubmitted {
                request_id: request.id,
                trip_id,
                requester: requester_profile,
            },
        )
        .await;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn pending_requests(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let requests = tokio::task::spawn_blocking(move || {
        roam_core::requests::pending_for_host(&db.db, trip_id, claims.sub)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(requests))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        roam_core::requests::accept(&db.db, request_id, claims.sub)
    })
    .await
    .map_err(join_error)??;

    let requester = outcome.request.requester.user_id;
    let trip_id = outcome.request.trip_id;

    state
        .dispatcher
        .send_to_user(
            requester,
            GatewayEvent::RequestResolved {
                request_id,
                trip_id,
                status: RequestStatus::Accepted,
            },
        )
        .await;
    state
        .dispatcher
        .send_to_users(
            &outcome.room.participants,
            GatewayEvent::MemberAdmitted {
                trip_id,
                user_id: requester,
            },
        )
        .await;
    if outcome.room_created {
        state
            .dispatcher
            .send_to_users(
                &outcome.room.participants,
                GatewayEvent::RoomCreated {
                    room_id: outcome.room.id,
                    trip_id,
                    external_id: outcome.room.external_id.clone(),
                },
            )
            .await;
    }

    Ok(Json(outcome.request))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let request = tokio::task::spawn_blocking(move || {
        roam_core::requests::reject(&db.db, request_id, claims.sub)
    })
    .await
    .map_err(join_error)??;

    state
        .dispatcher
        .send_to_user(
            request.requester.user_id,
            GatewayEvent::RequestResolved {
                request_id,
                trip_id: request.trip_id,
                status: RequestStatus::Rejected,
            },
        )
        .await;

    Ok(Json(request))
}

pub async fn my_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let requests =
        tokio::task::spawn_blocking(move || roam_core::requests::mine(&db.db, claims.sub))
            .await
            .map_err(join_error)??;

    Ok(Json(requests))
}

pub async fn incoming_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let requests =
        tokio::task::spawn_blocking(move || roam_core::requests::for_my_trips(&db.db, claims.sub))
            .await
            .map_err(join_error)??;

    Ok(Json(requests))
}
