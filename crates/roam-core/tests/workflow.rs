//! End-to-end walk through the join / membership / attendance / reputation
//! workflow against an in-memory database, exercising the public core API
//! the way the HTTP layer drives it.

use chrono::Utc;
use roam_core::{CoreError, attendance, chat, requests, trips};
use roam_db::Database;
use roam_types::api::{CreateTripRequest, NewItineraryItem};
use roam_types::{AttendanceStatus, RequestStatus, TripStatus, Visibility};
use uuid::Uuid;

fn register(db: &Database, username: &str, display_name: &str) -> Uuid {
    let id = Uuid::new_v4();
    db.create_user(&id.to_string(), username, display_name, None, "hash")
        .expect("create user");
    id
}

#[test]
fn full_join_attendance_reputation_workflow() {
    let db = Database::open_in_memory().unwrap();
    let hanna = register(&db, "hanna", "Hanna Brekke");
    let viktor = register(&db, "viktor", "Viktor Sand");

    // Hosting a trip awards 70 points, once.
    let trip = trips::create(
        &db,
        hanna,
        &CreateTripRequest {
            destination: "Senja".to_string(),
            description: None,
            start_date: Utc::now(),
            end_date: Utc::now(),
            visibility: Visibility::Public,
            itinerary: vec![
                NewItineraryItem {
                    title: "Segla hike".to_string(),
                    day: 1,
                    scheduled_at: None,
                },
                NewItineraryItem {
                    title: "Tungeneset".to_string(),
                    day: 2,
                    scheduled_at: None,
                },
            ],
        },
    )
    .unwrap();
    assert_eq!(db.reputation_of(&hanna.to_string()).unwrap(), 70);

    // Viktor asks to join the first itinerary item.
    let i1 = trip.itinerary[0].id;
    let request = requests::submit(&db, trip.id, viktor, "room for one more?", &[i1]).unwrap();
    assert_eq!(request.status, RequestStatus::Pending);

    // Hanna sees one pending request, privacy projected.
    let pending = requests::pending_for_host(&db, trip.id, hanna).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].requester.initials, "VS");
    assert_eq!(pending[0].requester.reputation, 0);

    // Accepting provisions membership, the itinerary slot and the chat room.
    let outcome = requests::accept(&db, request.id, hanna).unwrap();
    assert!(db.is_member(&trip.id.to_string(), &viktor.to_string()).unwrap());
    assert_eq!(
        db.item_participants(&i1.to_string()).unwrap(),
        vec![viktor.to_string()]
    );
    assert!(outcome.room_created);
    assert!(outcome.room.participants.contains(&hanna));
    assert!(outcome.room.participants.contains(&viktor));

    // The room is live for both.
    chat::post_message(&db, outcome.room.id, viktor, "thanks for having me!").unwrap();
    assert_eq!(chat::my_rooms(&db, hanna).unwrap().len(), 1);

    // The trip happens.
    trips::update_status(&db, trip.id, hanna, TripStatus::Confirmed).unwrap();

    // Viktor showed up: +40.
    let marked = attendance::mark(&db, trip.id, hanna, viktor, AttendanceStatus::ShowedUp).unwrap();
    assert_eq!(marked.participant.reputation, 40);

    // Correction to no-show: revert 40, apply -30, floored at zero.
    let corrected =
        attendance::mark(&db, trip.id, hanna, viktor, AttendanceStatus::NoShow).unwrap();
    assert_eq!(corrected.status, AttendanceStatus::NoShow);
    assert_eq!(corrected.participant.reputation, 0);
    assert_eq!(db.reputation_of(&viktor.to_string()).unwrap(), 0);

    // The roster reflects the final mark, still privacy projected.
    let roster = attendance::roster(&db, trip.id, hanna).unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].participant.initials, "VS");
    assert_eq!(roster[0].status, AttendanceStatus::NoShow);

    // A second identical mark is refused.
    let err = attendance::mark(&db, trip.id, hanna, viktor, AttendanceStatus::NoShow).unwrap_err();
    assert!(matches!(err, CoreError::InvalidOperation(_)));

    // And Viktor can never file a second request for this trip.
    let err = requests::submit(&db, trip.id, viktor, "again?", &[]).unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}
