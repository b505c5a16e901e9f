use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AttendanceStatus, RequestStatus, TripStatus, Visibility};

// -- JWT Claims --

/// JWT claims shared across roam-api (REST middleware) and roam-gateway
/// (WebSocket authentication). Canonical definition lives here in roam-types
/// to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Privacy projection --

/// How a user is rendered to anyone who is not the user themselves:
/// identity, initials and reputation score. Never name, email or avatar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicProfile {
    pub user_id: Uuid,
    pub initials: String,
    pub reputation: i64,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub display_name: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub reputation: i64,
    pub token: String,
}

// -- Trips --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewItineraryItem {
    pub title: String,
    pub day: u32,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTripRequest {
    pub destination: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub visibility: Visibility,
    #[serde(default)]
    pub itinerary: Vec<NewItineraryItem>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTripStatusRequest {
    pub status: TripStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItineraryItemResponse {
    pub id: Uuid,
    pub title: String,
    pub day: u32,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct TripResponse {
    pub id: Uuid,
    pub host_id: Uuid,
    pub destination: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub visibility: Visibility,
    pub status: TripStatus,
    pub itinerary: Vec<ItineraryItemResponse>,
    pub members: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

// -- Join requests --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitRequestRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub item_ids: Vec<Uuid>,
}

/// Itinerary selection snapshot carried on a join request, annotated with
/// the item's display label and schedule as they were at submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestItemResponse {
    pub item_id: Uuid,
    pub title: String,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Host-facing view of a join request: the requester passes through the
/// privacy projection.
#[derive(Debug, Serialize)]
pub struct JoinRequestResponse {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub requester: PublicProfile,
    pub message: String,
    pub items: Vec<RequestItemResponse>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Requester-facing view of their own request. The subject sees their own
/// identity as-is; no projection applies.
#[derive(Debug, Serialize)]
pub struct MyRequestResponse {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub trip_host_id: Uuid,
    pub message: String,
    pub items: Vec<RequestItemResponse>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

// -- Attendance --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkAttendanceRequest {
    pub participant_id: Uuid,
    pub status: AttendanceStatus,
}

#[derive(Debug, Serialize)]
pub struct RosterEntryResponse {
    pub participant: PublicProfile,
    pub status: AttendanceStatus,
    pub marked_at: Option<DateTime<Utc>>,
}

// -- Chat --

#[derive(Debug, Clone, Serialize)]
pub struct ChatRoomResponse {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub host_id: Uuid,
    pub external_id: String,
    pub participants: Vec<Uuid>,
    pub active: bool,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub room_id: Uuid,
    pub author: PublicProfile,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
