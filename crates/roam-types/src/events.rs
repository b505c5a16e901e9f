use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::PublicProfile;
use crate::models::{AttendanceStatus, RequestStatus};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A user came online or went offline
    PresenceUpdate {
        user_id: Uuid,
        username: String,
        online: bool,
    },

    /// A visitor asked to join one of your trips (sent to the host)
    RequestSubmitted {
        request_id: Uuid,
        trip_id: Uuid,
        requester: PublicProfile,
    },

    /// The host resolved your join request (sent to the requester)
    RequestResolved {
        request_id: Uuid,
        trip_id: Uuid,
        status: RequestStatus,
    },

    /// A member was admitted to a trip's roster
    MemberAdmitted { trip_id: Uuid, user_id: Uuid },

    /// The host marked your attendance (sent to the participant)
    AttendanceMarked {
        trip_id: Uuid,
        status: AttendanceStatus,
    },

    /// A chat room now exists for a trip you belong to
    RoomCreated {
        room_id: Uuid,
        trip_id: Uuid,
        external_id: String,
    },

    /// The host closed a trip's chat room
    RoomDeactivated { room_id: Uuid, trip_id: Uuid },

    /// A new message was posted in one of your chat rooms
    MessageCreate {
        id: Uuid,
        room_id: Uuid,
        author: PublicProfile,
        body: String,
        timestamp: DateTime<Utc>,
    },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },
}
