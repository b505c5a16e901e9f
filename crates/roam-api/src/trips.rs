use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use roam_types::api::{Claims, CreateTripRequest, UpdateTripStatusRequest};

use crate::auth::AppState;
use crate::error::{ApiError, join_error};

pub async fn create_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTripRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let trip = tokio::task::spawn_blocking(move || {
        roam_core::trips::create(&db.db, claims.sub, &req)
    })
    .await
    .map_err(join_error)??;

    Ok((StatusCode::CREATED, Json(trip)))
}

pub async fn get_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let trip = tokio::task::spawn_blocking(move || {
        roam_core::trips::get(&db.db, trip_id, claims.sub)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(trip))
}

pub async fn my_trips(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let trips = tokio::task::spawn_blocking(move || roam_core::trips::mine(&db.db, claims.sub))
        .await
        .map_err(join_error)??;

    Ok(Json(trips))
}

pub async fn update_trip_status(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateTripStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let trip = tokio::task::spawn_blocking(move || {
        roam_core::trips::update_status(&db.db, trip_id, claims.sub, req.status)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(trip))
}

pub async fn delete_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    tokio::task::spawn_blocking(move || roam_core::trips::delete(&db.db, trip_id, claims.sub))
        .await
        .map_err(join_error)??;

    Ok(StatusCode::NO_CONTENT)
}
