use chrono::Utc;
use roam_db::Database;
use roam_db::models::{ItineraryItemRow, TripRow};
use roam_types::TripStatus;
use uuid::Uuid;

pub(crate) fn test_db() -> Database {
    Database::open_in_memory().expect("in-memory database")
}

pub(crate) fn user(db: &Database, username: &str, display_name: &str) -> Uuid {
    let id = Uuid::new_v4();
    db.create_user(&id.to_string(), username, display_name, None, "hash")
        .expect("create user");
    id
}

/// Seed a trip with two itinerary items directly through the storage layer,
/// bypassing the hosting award so reputation-sensitive tests start at zero.
pub(crate) fn trip(db: &Database, host: Uuid, status: TripStatus) -> (Uuid, Vec<Uuid>) {
    let trip_id = Uuid::new_v4();
    let now = Utc::now().to_rfc3339();
    let row = TripRow {
        id: trip_id.to_string(),
        host_id: host.to_string(),
        destination: "Lofoten".to_string(),
        description: None,
        start_date: now.clone(),
        end_date: now.clone(),
        visibility: "public".to_string(),
        status: status.as_str().to_string(),
        host_reward_granted: false,
        created_at: now.clone(),
    };
    let item_ids = vec![Uuid::new_v4(), Uuid::new_v4()];
    let items: Vec<ItineraryItemRow> = item_ids
        .iter()
        .enumerate()
        .map(|(i, id)| ItineraryItemRow {
            id: id.to_string(),
            trip_id: trip_id.to_string(),
            title: format!("Stop {}", i + 1),
            day: i as i64 + 1,
            scheduled_at: Some(now.clone()),
            position: i as i64,
        })
        .collect();
    db.create_trip(&row, &items).expect("create trip");
    (trip_id, item_ids)
}
