use std::collections::HashMap;

use roam_db::Database;
use roam_db::models::{ChatRoomRow, UserRow};
use roam_types::api::{ChatRoomResponse, MessageResponse};
use tracing::info;
use uuid::Uuid;

use crate::convert::{parse_ts, parse_uuid};
use crate::error::CoreError;
use crate::privacy;

const DEFAULT_PAGE: u32 = 50;
const MAX_PAGE: u32 = 200;

/// Make sure the trip's chat room exists and includes `member_id`. Creates
/// the room with {host, member} on first acceptance, extends it on later
/// ones; both paths are idempotent. Returns the room and whether this call
/// created it.
pub fn ensure_room(
    db: &Database,
    trip: &roam_db::models::TripRow,
    member_id: &str,
) -> Result<(ChatRoomResponse, bool), CoreError> {
    let room_id = Uuid::new_v4();
    // Opaque token scoped by trip identity; the fresh uuid keeps it unique
    // across all channels ever minted.
    let external_id = format!("trip-{}:{}", trip.id, Uuid::new_v4().simple());

    let (row, created) = db.ensure_chat_room(
        &trip.id,
        &trip.host_id,
        member_id,
        &room_id.to_string(),
        &external_id,
    )?;
    if created {
        info!("chat room {} created for trip {}", row.id, trip.id);
    }

    let response = assemble(db, row)?;
    Ok((response, created))
}

/// Soft-delete a room. History stays; the room just leaves every listing
/// and stops accepting messages.
pub fn deactivate(db: &Database, room_id: Uuid, caller: Uuid) -> Result<ChatRoomResponse, CoreError> {
    let room = db
        .get_chat_room(&room_id.to_string())?
        .ok_or(CoreError::NotFound("chat room"))?;
    if room.host_id != caller.to_string() {
        return Err(CoreError::Authorization(
            "only the trip host may deactivate a chat room",
        ));
    }
    if !db.deactivate_room(&room.id)? {
        return Err(CoreError::InvalidOperation("chat room is already deactivated"));
    }

    let room = db
        .get_chat_room(&room_id.to_string())?
        .ok_or(CoreError::NotFound("chat room"))?;
    assemble(db, room)
}

/// Active rooms the caller participates in. Deactivated rooms never appear.
pub fn my_rooms(db: &Database, caller: Uuid) -> Result<Vec<ChatRoomResponse>, CoreError> {
    let rows = db.rooms_for_user(&caller.to_string())?;
    rows.into_iter().map(|row| assemble(db, row)).collect()
}

/// Post a message into an active room the author belongs to. Bumps the
/// room's last-activity timestamp.
pub fn post_message(
    db: &Database,
    room_id: Uuid,
    author: Uuid,
    body: &str,
) -> Result<MessageResponse, CoreError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(CoreError::InvalidOperation("message body must not be empty"));
    }

    let room = db
        .get_chat_room(&room_id.to_string())?
        .ok_or(CoreError::NotFound("chat room"))?;
    if !room.active {
        return Err(CoreError::InvalidOperation("chat room is deactivated"));
    }
    if !db.is_room_participant(&room.id, &author.to_string())? {
        return Err(CoreError::Authorization(
            "only room participants may post messages",
        ));
    }

    let author_row = db
        .get_user(&author.to_string())?
        .ok_or(CoreError::NotFound("user"))?;
    let message_id = Uuid::new_v4();
    let created_at = db.insert_chat_message(&message_id.to_string(), &room.id, &author_row.id, body)?;

    Ok(MessageResponse {
        id: message_id,
        room_id,
        author: privacy::project(&author_row),
        body: body.to_string(),
        created_at: parse_ts(&created_at),
    })
}

/// Page through a room's history, newest first. Participants only; reading
/// a deactivated room is allowed — deactivation keeps history.
pub fn messages(
    db: &Database,
    room_id: Uuid,
    caller: Uuid,
    limit: Option<u32>,
    before: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<Vec<MessageResponse>, CoreError> {
    let room = db
        .get_chat_room(&room_id.to_string())?
        .ok_or(CoreError::NotFound("chat room"))?;
    if !db.is_room_participant(&room.id, &caller.to_string())? {
        return Err(CoreError::Authorization(
            "only room participants may read messages",
        ));
    }

    let limit = limit.unwrap_or(DEFAULT_PAGE).min(MAX_PAGE);
    let cursor = before.map(|dt| dt.to_rfc3339());
    let rows = db.get_chat_messages(&room.id, limit, cursor.as_deref())?;

    let author_ids: Vec<String> = rows.iter().map(|r| r.author_id.clone()).collect();
    let authors: HashMap<String, UserRow> = db
        .get_users(&author_ids)?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    rows.into_iter()
        .map(|row| {
            let author = authors
                .get(&row.author_id)
                .ok_or(CoreError::NotFound("user"))?;
            Ok(MessageResponse {
                id: parse_uuid(&row.id, "message"),
                room_id: parse_uuid(&row.room_id, "chat room"),
                author: privacy::project(author),
                body: row.body,
                created_at: parse_ts(&row.created_at),
            })
        })
        .collect()
}

fn assemble(db: &Database, row: ChatRoomRow) -> Result<ChatRoomResponse, CoreError> {
    let participants = db
        .room_participants(&row.id)?
        .iter()
        .map(|id| parse_uuid(id, "user"))
        .collect();
    Ok(ChatRoomResponse {
        id: parse_uuid(&row.id, "chat room"),
        trip_id: parse_uuid(&row.trip_id, "trip"),
        host_id: parse_uuid(&row.host_id, "user"),
        external_id: row.external_id,
        participants,
        active: row.active,
        last_activity_at: parse_ts(&row.last_activity_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use roam_types::TripStatus;

    fn setup() -> (Database, Uuid, Uuid, roam_db::models::TripRow) {
        let db = testutil::test_db();
        let host = testutil::user(&db, "selma", "Selma Ruud");
        let guest = testutil::user(&db, "emil", "Emil Bakke");
        let (trip_id, _) = testutil::trip(&db, host, TripStatus::Confirmed);
        let trip = db.get_trip(&trip_id.to_string()).unwrap().unwrap();
        (db, host, guest, trip)
    }

    #[test]
    fn first_acceptance_creates_then_extends() {
        let (db, _host, guest, trip) = setup();
        let second_guest = testutil::user(&db, "tuva", "Tuva Strand");

        let (room, created) = ensure_room(&db, &trip, &guest.to_string()).unwrap();
        assert!(created);
        assert!(room.active);
        assert!(room.external_id.starts_with(&format!("trip-{}:", trip.id)));
        assert_eq!(room.participants.len(), 2);

        let (extended, created) = ensure_room(&db, &trip, &second_guest.to_string()).unwrap();
        assert!(!created);
        assert_eq!(extended.id, room.id);
        assert_eq!(extended.external_id, room.external_id);
        assert_eq!(extended.participants.len(), 3);

        // Re-admitting an existing participant changes nothing.
        let (again, created) = ensure_room(&db, &trip, &guest.to_string()).unwrap();
        assert!(!created);
        assert_eq!(again.participants.len(), 3);
    }

    #[test]
    fn deactivation_is_host_only_and_final() {
        let (db, host, guest, trip) = setup();
        let (room, _) = ensure_room(&db, &trip, &guest.to_string()).unwrap();

        let err = deactivate(&db, room.id, guest).unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));

        let closed = deactivate(&db, room.id, host).unwrap();
        assert!(!closed.active);

        let err = deactivate(&db, room.id, host).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));
    }

    #[test]
    fn listings_exclude_deactivated_rooms() {
        let (db, host, guest, trip) = setup();
        let (room, _) = ensure_room(&db, &trip, &guest.to_string()).unwrap();

        assert_eq!(my_rooms(&db, guest).unwrap().len(), 1);
        deactivate(&db, room.id, host).unwrap();
        assert!(my_rooms(&db, guest).unwrap().is_empty());
        assert!(my_rooms(&db, host).unwrap().is_empty());
    }

    #[test]
    fn posting_is_scoped_to_active_rooms_and_participants() {
        let (db, host, guest, trip) = setup();
        let outsider = testutil::user(&db, "frida", "Frida Moen");
        let (room, _) = ensure_room(&db, &trip, &guest.to_string()).unwrap();

        let msg = post_message(&db, room.id, guest, "anyone packed yet?").unwrap();
        assert_eq!(msg.author.initials, "EB");
        assert_eq!(msg.body, "anyone packed yet?");

        let err = post_message(&db, room.id, outsider, "hello").unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));

        let err = post_message(&db, room.id, guest, "   ").unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));

        deactivate(&db, room.id, host).unwrap();
        let err = post_message(&db, room.id, guest, "too late").unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));

        // History survives deactivation.
        let history = messages(&db, room.id, guest, None, None).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn posting_bumps_last_activity() {
        let (db, _, guest, trip) = setup();
        let (room, _) = ensure_room(&db, &trip, &guest.to_string()).unwrap();
        let before = db.get_chat_room(&room.id.to_string()).unwrap().unwrap();

        post_message(&db, room.id, guest, "ping").unwrap();
        let after = db.get_chat_room(&room.id.to_string()).unwrap().unwrap();
        assert!(after.last_activity_at >= before.last_activity_at);
    }
}
