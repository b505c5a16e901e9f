use anyhow::anyhow;
use chrono::Utc;
use roam_db::Database;
use roam_db::models::{ItineraryItemRow, TripRow};
use roam_types::TripStatus;
use roam_types::api::{CreateTripRequest, ItineraryItemResponse, TripResponse};
use uuid::Uuid;

use crate::convert::{parse_ts, parse_ts_opt, parse_uuid};
use crate::error::CoreError;
use crate::reputation;

/// Create a trip with its itinerary and grant the hosting award. The host
/// becomes the first roster member; the award is guarded by the per-trip
/// idempotency flag.
pub fn create(
    db: &Database,
    host_id: Uuid,
    req: &CreateTripRequest,
) -> Result<TripResponse, CoreError> {
    if req.destination.trim().is_empty() {
        return Err(CoreError::InvalidOperation("destination must not be empty"));
    }
    if req.end_date < req.start_date {
        return Err(CoreError::InvalidOperation("trip cannot end before it starts"));
    }

    let trip_id = Uuid::new_v4();
    let now = Utc::now().to_rfc3339();
    let row = TripRow {
        id: trip_id.to_string(),
        host_id: host_id.to_string(),
        destination: req.destination.trim().to_string(),
        description: req.description.clone(),
        start_date: req.start_date.to_rfc3339(),
        end_date: req.end_date.to_rfc3339(),
        visibility: req.visibility.as_str().to_string(),
        status: TripStatus::Planning.as_str().to_string(),
        host_reward_granted: false,
        created_at: now,
    };
    let items: Vec<ItineraryItemRow> = req
        .itinerary
        .iter()
        .enumerate()
        .map(|(i, item)| ItineraryItemRow {
            id: Uuid::new_v4().to_string(),
            trip_id: trip_id.to_string(),
            title: item.title.clone(),
            day: item.day as i64,
            scheduled_at: item.scheduled_at.map(|dt| dt.to_rfc3339()),
            position: i as i64,
        })
        .collect();

    db.create_trip(&row, &items)?;
    reputation::award_host_trip(db, &row)?;

    assemble(db, row)
}

/// Fetch a trip. Private trips exist only for their members — everyone else
/// gets the same NotFound a missing trip would produce.
pub fn get(db: &Database, trip_id: Uuid, caller: Uuid) -> Result<TripResponse, CoreError> {
    let row = db
        .get_trip(&trip_id.to_string())?
        .ok_or(CoreError::NotFound("trip"))?;

    if row.visibility == "private"
        && row.host_id != caller.to_string()
        && !db.is_member(&row.id, &caller.to_string())?
    {
        return Err(CoreError::NotFound("trip"));
    }

    assemble(db, row)
}

/// Every trip the caller belongs to, hosted ones included (the host is
/// always on their own roster).
pub fn mine(db: &Database, caller: Uuid) -> Result<Vec<TripResponse>, CoreError> {
    let rows = db.trips_joined_by(&caller.to_string())?;
    rows.into_iter().map(|row| assemble(db, row)).collect()
}

/// Host-driven lifecycle transition. Legal moves: planning -> confirmed,
/// confirmed -> completed, and planning/confirmed -> cancelled. The write
/// is a compare-and-set on the previous status.
pub fn update_status(
    db: &Database,
    trip_id: Uuid,
    caller: Uuid,
    new_status: TripStatus,
) -> Result<TripResponse, CoreError> {
    let row = db
        .get_trip(&trip_id.to_string())?
        .ok_or(CoreError::NotFound("trip"))?;
    if row.host_id != caller.to_string() {
        return Err(CoreError::Authorization("only the trip host may change its status"));
    }

    let current = trip_status(&row)?;
    let legal = matches!(
        (current, new_status),
        (TripStatus::Planning, TripStatus::Confirmed)
            | (TripStatus::Confirmed, TripStatus::Completed)
            | (TripStatus::Planning, TripStatus::Cancelled)
            | (TripStatus::Confirmed, TripStatus::Cancelled)
    );
    if !legal {
        return Err(CoreError::InvalidOperation("illegal trip status transition"));
    }

    if !db.update_trip_status(&row.id, current.as_str(), new_status.as_str())? {
        return Err(CoreError::InvalidOperation("trip status changed concurrently"));
    }

    let row = db
        .get_trip(&trip_id.to_string())?
        .ok_or(CoreError::NotFound("trip"))?;
    assemble(db, row)
}

pub fn delete(db: &Database, trip_id: Uuid, caller: Uuid) -> Result<(), CoreError> {
    let row = db
        .get_trip(&trip_id.to_string())?
        .ok_or(CoreError::NotFound("trip"))?;
    if row.host_id != caller.to_string() {
        return Err(CoreError::Authorization("only the trip host may delete a trip"));
    }
    db.delete_trip(&row.id)?;
    Ok(())
}

pub(crate) fn trip_status(row: &TripRow) -> Result<TripStatus, CoreError> {
    TripStatus::parse(&row.status)
        .ok_or_else(|| CoreError::Storage(anyhow!("Corrupt trip status: {}", row.status)))
}

fn assemble(db: &Database, row: TripRow) -> Result<TripResponse, CoreError> {
    let itinerary = db
        .get_itinerary(&row.id)?
        .into_iter()
        .map(|item| ItineraryItemResponse {
            id: parse_uuid(&item.id, "itinerary item"),
            title: item.title,
            day: item.day as u32,
            scheduled_at: parse_ts_opt(item.scheduled_at.as_deref()),
        })
        .collect();
    let members = db
        .members_of(&row.id)?
        .iter()
        .map(|id| parse_uuid(id, "user"))
        .collect();

    let status = trip_status(&row)?;
    let visibility = roam_types::Visibility::parse(&row.visibility)
        .ok_or_else(|| CoreError::Storage(anyhow!("Corrupt trip visibility: {}", row.visibility)))?;

    Ok(TripResponse {
        id: parse_uuid(&row.id, "trip"),
        host_id: parse_uuid(&row.host_id, "user"),
        destination: row.destination,
        description: row.description,
        start_date: parse_ts(&row.start_date),
        end_date: parse_ts(&row.end_date),
        visibility,
        status,
        itinerary,
        members,
        created_at: parse_ts(&row.created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use roam_types::Visibility;
    use roam_types::api::NewItineraryItem;

    fn create_req() -> CreateTripRequest {
        CreateTripRequest {
            destination: "Dolomites".to_string(),
            description: Some("Hut to hut".to_string()),
            start_date: Utc::now(),
            end_date: Utc::now(),
            visibility: Visibility::Public,
            itinerary: vec![
                NewItineraryItem {
                    title: "Alpe di Siusi".to_string(),
                    day: 1,
                    scheduled_at: None,
                },
                NewItineraryItem {
                    title: "Seceda ridge".to_string(),
                    day: 2,
                    scheduled_at: Some(Utc::now()),
                },
            ],
        }
    }

    #[test]
    fn create_awards_the_host_once() {
        let db = testutil::test_db();
        let host = testutil::user(&db, "liv", "Liv Aas");

        let trip = create(&db, host, &create_req()).unwrap();
        assert_eq!(trip.status, TripStatus::Planning);
        assert_eq!(trip.members, vec![host]);
        assert_eq!(trip.itinerary.len(), 2);
        assert_eq!(db.reputation_of(&host.to_string()).unwrap(), 70);

        // The flag on the trip row blocks a second grant.
        let row = db.get_trip(&trip.id.to_string()).unwrap().unwrap();
        assert!(row.host_reward_granted);
        assert!(reputation::award_host_trip(&db, &row).unwrap().is_none());
        assert_eq!(db.reputation_of(&host.to_string()).unwrap(), 70);
    }

    #[test]
    fn status_transitions_follow_the_lifecycle() {
        let db = testutil::test_db();
        let host = testutil::user(&db, "liv", "Liv Aas");
        let trip = create(&db, host, &create_req()).unwrap();

        let confirmed = update_status(&db, trip.id, host, TripStatus::Confirmed).unwrap();
        assert_eq!(confirmed.status, TripStatus::Confirmed);

        let completed = update_status(&db, trip.id, host, TripStatus::Completed).unwrap();
        assert_eq!(completed.status, TripStatus::Completed);

        // Completed is terminal.
        let err = update_status(&db, trip.id, host, TripStatus::Cancelled).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));
    }

    #[test]
    fn only_the_host_may_transition() {
        let db = testutil::test_db();
        let host = testutil::user(&db, "liv", "Liv Aas");
        let other = testutil::user(&db, "bo", "Bo Dahl");
        let trip = create(&db, host, &create_req()).unwrap();

        let err = update_status(&db, trip.id, other, TripStatus::Confirmed).unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));
    }

    #[test]
    fn private_trips_hide_from_strangers() {
        let db = testutil::test_db();
        let host = testutil::user(&db, "liv", "Liv Aas");
        let stranger = testutil::user(&db, "bo", "Bo Dahl");

        let mut req = create_req();
        req.visibility = Visibility::Private;
        let trip = create(&db, host, &req).unwrap();

        assert!(get(&db, trip.id, host).is_ok());
        let err = get(&db, trip.id, stranger).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
