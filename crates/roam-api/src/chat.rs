use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use roam_types::api::{Claims, SendMessageRequest};
use roam_types::events::GatewayEvent;

use crate::auth::AppState;
use crate::error::{ApiError, join_error};

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub limit: Option<u32>,
    /// Cursor-based pagination — pass the `created_at` timestamp of the
    /// oldest message from the previous page to fetch older messages.
    pub before: Option<DateTime<Utc>>,
}

pub async fn my_rooms(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rooms = tokio::task::spawn_blocking(move || roam_core::chat::my_rooms(&db.db, claims.sub))
        .await
        .map_err(join_error)??;

    Ok(Json(rooms))
}

pub async fn deactivate_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let room = tokio::task::spawn_blocking(move || {
        roam_core::chat::deactivate(&db.db, room_id, claims.sub)
    })
    .await
    .map_err(join_error)??;

    state
        .dispatcher
        .send_to_users(
            &room.participants,
            GatewayEvent::RoomDeactivated {
                room_id,
                trip_id: room.trip_id,
            },
        )
        .await;

    Ok(Json(room))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let messages = tokio::task::spawn_blocking(move || {
        roam_core::chat::messages(&db.db, room_id, claims.sub, query.limit, query.before)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let (message, participants) = tokio::task::spawn_blocking(move || {
        let message = roam_core::chat::post_message(&db.db, room_id, claims.sub, &req.body)?;
        let participants = db
            .db
            .room_participants(&room_id.to_string())
            .map_err(roam_core::CoreError::Storage)?
            .iter()
            .filter_map(|id| id.parse::<Uuid>().ok())
            .collect::<Vec<_>>();
        Ok::<_, roam_core::CoreError>((message, participants))
    })
    .await
    .map_err(join_error)??;

    state
        .dispatcher
        .send_to_users(
            &participants,
            GatewayEvent::MessageCreate {
                id: message.id,
                room_id,
                author: message.author.clone(),
                body: message.body.clone(),
                timestamp: message.created_at,
            },
        )
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}
