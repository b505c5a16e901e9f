/// Database row types — these map directly to SQLite rows.
/// Distinct from roam-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub password: String,
    pub reputation: i64,
    pub created_at: String,
}

pub struct TripRow {
    pub id: String,
    pub host_id: String,
    pub destination: String,
    pub description: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub visibility: String,
    pub status: String,
    pub host_reward_granted: bool,
    pub created_at: String,
}

pub struct ItineraryItemRow {
    pub id: String,
    pub trip_id: String,
    pub title: String,
    pub day: i64,
    pub scheduled_at: Option<String>,
    pub position: i64,
}

pub struct TripRequestRow {
    pub id: String,
    pub trip_id: String,
    pub requester_id: String,
    pub trip_host_id: String,
    pub message: String,
    pub status: String,
    pub created_at: String,
    pub responded_at: Option<String>,
}

pub struct RequestItemRow {
    pub request_id: String,
    pub item_id: String,
    pub title: String,
    pub scheduled_at: Option<String>,
}

pub struct AttendanceRow {
    pub trip_id: String,
    pub participant_id: String,
    pub status: String,
    pub marked_at: String,
    pub marked_by: String,
}

pub struct ChatRoomRow {
    pub id: String,
    pub trip_id: String,
    pub host_id: String,
    pub external_id: String,
    pub active: bool,
    pub last_activity_at: String,
    pub created_at: String,
}

pub struct ChatMessageRow {
    pub id: String,
    pub room_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: String,
}

pub struct ReputationEventRow {
    pub id: String,
    pub user_id: String,
    pub delta: i64,
    pub reason: String,
    pub context: String,
    pub created_at: String,
}
