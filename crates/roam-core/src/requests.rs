use std::collections::HashMap;

use anyhow::anyhow;
use chrono::Utc;
use roam_db::Database;
use roam_db::models::{RequestItemRow, TripRequestRow, UserRow};
use roam_types::RequestStatus;
use roam_types::api::{ChatRoomResponse, JoinRequestResponse, MyRequestResponse, RequestItemResponse};
use tracing::info;
use uuid::Uuid;

use crate::chat;
use crate::convert::{parse_ts, parse_ts_opt, parse_uuid};
use crate::error::CoreError;
use crate::membership;
use crate::privacy;

/// What `accept` leaves behind: the resolved request (host view), the chat
/// room binding the trip's members, and whether this acceptance created it.
#[derive(Debug)]
pub struct AcceptOutcome {
    pub request: JoinRequestResponse,
    pub room: ChatRoomResponse,
    pub room_created: bool,
}

/// Submit a join request for a trip. One request per (trip, requester),
/// ever — the uniqueness key is permanent, so a rejected requester cannot
/// re-request. Selected itinerary items are snapshotted with their labels;
/// ids not present in the trip are dropped silently.
pub fn submit(
    db: &Database,
    trip_id: Uuid,
    requester: Uuid,
    message: &str,
    item_ids: &[Uuid],
) -> Result<MyRequestResponse, CoreError> {
    let trip = db
        .get_trip(&trip_id.to_string())?
        .ok_or(CoreError::NotFound("trip"))?;

    if trip.host_id == requester.to_string() {
        return Err(CoreError::InvalidOperation(
            "hosts cannot request to join their own trip",
        ));
    }
    if db.find_request_for(&trip.id, &requester.to_string())?.is_some() {
        return Err(CoreError::Conflict(
            "a join request for this trip already exists",
        ));
    }

    let request_id = Uuid::new_v4();
    let itinerary = db.get_itinerary(&trip.id)?;
    let mut seen = std::collections::HashSet::new();
    let items: Vec<RequestItemRow> = item_ids
        .iter()
        .filter(|id| seen.insert(**id))
        .filter_map(|id| {
            let id = id.to_string();
            itinerary.iter().find(|item| item.id == id)
        })
        .map(|item| RequestItemRow {
            request_id: request_id.to_string(),
            item_id: item.id.clone(),
            title: item.title.clone(),
            scheduled_at: item.scheduled_at.clone(),
        })
        .collect();

    let row = TripRequestRow {
        id: request_id.to_string(),
        trip_id: trip.id.clone(),
        requester_id: requester.to_string(),
        trip_host_id: trip.host_id.clone(),
        message: message.to_string(),
        status: RequestStatus::Pending.as_str().to_string(),
        created_at: Utc::now().to_rfc3339(),
        responded_at: None,
    };
    db.create_request(&row, &items)?;
    info!("join request {} for trip {} by {}", request_id, trip_id, requester);

    Ok(own_view(row, to_item_responses(items)))
}

/// Pending requests for one trip, host only. Requesters pass through the
/// privacy projection — initials and score, never name or email.
pub fn pending_for_host(
    db: &Database,
    trip_id: Uuid,
    caller: Uuid,
) -> Result<Vec<JoinRequestResponse>, CoreError> {
    let trip = db
        .get_trip(&trip_id.to_string())?
        .ok_or(CoreError::NotFound("trip"))?;
    if trip.host_id != caller.to_string() {
        return Err(CoreError::Authorization(
            "only the trip host may list join requests",
        ));
    }

    host_views(db, db.pending_requests_for_trip(&trip.id)?)
}

/// Accept a pending request: admit the requester to the roster and their
/// selected itinerary items, make sure the trip's chat room exists and
/// includes them, and only then flip the request to accepted.
/// If admission or provisioning fails the request stays pending and the
/// whole operation can be retried.
pub fn accept(db: &Database, request_id: Uuid, caller: Uuid) -> Result<AcceptOutcome, CoreError> {
    let req = db
        .get_request(&request_id.to_string())?
        .ok_or(CoreError::NotFound("join request"))?;
    if req.trip_host_id != caller.to_string() {
        return Err(CoreError::Authorization(
            "only the trip host may resolve a join request",
        ));
    }
    if req.status != RequestStatus::Pending.as_str() {
        return Err(CoreError::InvalidOperation("request already resolved"));
    }

    let trip = db
        .get_trip(&req.trip_id)?
        .ok_or(CoreError::NotFound("trip"))?;

    let items = db.request_items(&req.id)?;
    let item_ids: Vec<String> = items.iter().map(|i| i.item_id.clone()).collect();
    membership::admit(db, &trip.id, &req.requester_id, &item_ids)?;

    let (room, room_created) = chat::ensure_room(db, &trip, &req.requester_id)?;

    // Membership and chat writes are idempotent, so losing this race leaves
    // nothing to undo.
    if !db.resolve_request(&req.id, RequestStatus::Accepted.as_str())? {
        return Err(CoreError::InvalidOperation("request already resolved"));
    }
    info!("request {} accepted, {} joins trip {}", req.id, req.requester_id, trip.id);

    let resolved = db
        .get_request(&req.id)?
        .ok_or(CoreError::NotFound("join request"))?;
    let request = host_view(db, resolved)?;

    Ok(AcceptOutcome {
        request,
        room,
        room_created,
    })
}

/// Reject a pending request. Same authority and single-resolution rules as
/// accept, no side effects beyond the status flip.
pub fn reject(db: &Database, request_id: Uuid, caller: Uuid) -> Result<JoinRequestResponse, CoreError> {
    let req = db
        .get_request(&request_id.to_string())?
        .ok_or(CoreError::NotFound("join request"))?;
    if req.trip_host_id != caller.to_string() {
        return Err(CoreError::Authorization(
            "only the trip host may resolve a join request",
        ));
    }
    if req.status != RequestStatus::Pending.as_str() {
        return Err(CoreError::InvalidOperation("request already resolved"));
    }

    if !db.resolve_request(&req.id, RequestStatus::Rejected.as_str())? {
        return Err(CoreError::InvalidOperation("request already resolved"));
    }

    let resolved = db
        .get_request(&req.id)?
        .ok_or(CoreError::NotFound("join request"))?;
    host_view(db, resolved)
}

/// The caller's own requests, newest first.
pub fn mine(db: &Database, requester: Uuid) -> Result<Vec<MyRequestResponse>, CoreError> {
    let rows = db.requests_by(&requester.to_string())?;
    rows.into_iter()
        .map(|row| {
            let items = to_item_responses(db.request_items(&row.id)?);
            Ok(own_view(row, items))
        })
        .collect()
}

/// Every request against any trip the caller hosts, newest first.
pub fn for_my_trips(db: &Database, host: Uuid) -> Result<Vec<JoinRequestResponse>, CoreError> {
    host_views(db, db.requests_for_host(&host.to_string())?)
}

fn request_status(row: &TripRequestRow) -> Result<RequestStatus, CoreError> {
    RequestStatus::parse(&row.status)
        .ok_or_else(|| CoreError::Storage(anyhow!("Corrupt request status: {}", row.status)))
}

fn to_item_responses(items: Vec<RequestItemRow>) -> Vec<RequestItemResponse> {
    items
        .into_iter()
        .map(|item| RequestItemResponse {
            item_id: parse_uuid(&item.item_id, "itinerary item"),
            title: item.title,
            scheduled_at: parse_ts_opt(item.scheduled_at.as_deref()),
        })
        .collect()
}

fn own_view(row: TripRequestRow, items: Vec<RequestItemResponse>) -> MyRequestResponse {
    let status = RequestStatus::parse(&row.status).unwrap_or(RequestStatus::Pending);
    MyRequestResponse {
        id: parse_uuid(&row.id, "join request"),
        trip_id: parse_uuid(&row.trip_id, "trip"),
        trip_host_id: parse_uuid(&row.trip_host_id, "user"),
        message: row.message,
        items,
        status,
        created_at: parse_ts(&row.created_at),
        responded_at: parse_ts_opt(row.responded_at.as_deref()),
    }
}

fn host_view(db: &Database, row: TripRequestRow) -> Result<JoinRequestResponse, CoreError> {
    let requester = db
        .get_user(&row.requester_id)?
        .ok_or(CoreError::NotFound("user"))?;
    let items = to_item_responses(db.request_items(&row.id)?);
    build_host_view(row, &requester, items)
}

fn host_views(
    db: &Database,
    rows: Vec<TripRequestRow>,
) -> Result<Vec<JoinRequestResponse>, CoreError> {
    let requester_ids: Vec<String> = rows.iter().map(|r| r.requester_id.clone()).collect();
    let users: HashMap<String, UserRow> = db
        .get_users(&requester_ids)?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    rows.into_iter()
        .map(|row| {
            let requester = users
                .get(&row.requester_id)
                .ok_or(CoreError::NotFound("user"))?;
            let items = to_item_responses(db.request_items(&row.id)?);
            build_host_view(row, requester, items)
        })
        .collect()
}

fn build_host_view(
    row: TripRequestRow,
    requester: &UserRow,
    items: Vec<RequestItemResponse>,
) -> Result<JoinRequestResponse, CoreError> {
    let status = request_status(&row)?;
    Ok(JoinRequestResponse {
        id: parse_uuid(&row.id, "join request"),
        trip_id: parse_uuid(&row.trip_id, "trip"),
        requester: privacy::project(requester),
        message: row.message,
        items,
        status,
        created_at: parse_ts(&row.created_at),
        responded_at: parse_ts_opt(row.responded_at.as_deref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use roam_types::TripStatus;

    fn setup() -> (Database, Uuid, Uuid, Uuid, Vec<Uuid>) {
        let db = testutil::test_db();
        let host = testutil::user(&db, "astrid", "Astrid Falk");
        let visitor = testutil::user(&db, "jonas", "Jonas Lie");
        let (trip_id, items) = testutil::trip(&db, host, TripStatus::Planning);
        (db, host, visitor, trip_id, items)
    }

    #[test]
    fn hosts_cannot_request_their_own_trip() {
        let (db, host, _, trip_id, items) = setup();
        let err = submit(&db, trip_id, host, "let me in", &[items[0]]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));
    }

    #[test]
    fn second_request_for_same_trip_conflicts() {
        let (db, _, visitor, trip_id, items) = setup();
        submit(&db, trip_id, visitor, "hi", &[items[0]]).unwrap();
        let err = submit(&db, trip_id, visitor, "hi again", &[items[0]]).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn rejected_requesters_cannot_re_request() {
        let (db, host, visitor, trip_id, _) = setup();
        let req = submit(&db, trip_id, visitor, "hi", &[]).unwrap();
        reject(&db, req.id, host).unwrap();

        let err = submit(&db, trip_id, visitor, "please?", &[]).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn unknown_itinerary_items_are_dropped_silently() {
        let (db, _, visitor, trip_id, items) = setup();
        let bogus = Uuid::new_v4();
        let req = submit(&db, trip_id, visitor, "hi", &[items[0], bogus]).unwrap();
        assert_eq!(req.items.len(), 1);
        assert_eq!(req.items[0].item_id, items[0]);
        assert_eq!(req.items[0].title, "Stop 1");
    }

    #[test]
    fn pending_listing_is_host_only_and_projected() {
        let (db, host, visitor, trip_id, items) = setup();
        submit(&db, trip_id, visitor, "hi", &[items[0]]).unwrap();

        let err = pending_for_host(&db, trip_id, visitor).unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));

        let pending = pending_for_host(&db, trip_id, host).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].requester.initials, "JL");
        assert_eq!(pending[0].requester.reputation, 0);
        assert_eq!(pending[0].status, RequestStatus::Pending);
    }

    #[test]
    fn accept_admits_member_and_provisions_chat() {
        let (db, host, visitor, trip_id, items) = setup();
        let req = submit(&db, trip_id, visitor, "hi", &[items[0]]).unwrap();

        let outcome = accept(&db, req.id, host).unwrap();
        assert_eq!(outcome.request.status, RequestStatus::Accepted);
        assert!(outcome.request.responded_at.is_some());
        assert!(outcome.room_created);
        assert_eq!(outcome.room.participants.len(), 2);
        assert!(outcome.room.participants.contains(&host));
        assert!(outcome.room.participants.contains(&visitor));

        assert!(db.is_member(&trip_id.to_string(), &visitor.to_string()).unwrap());
        assert_eq!(
            db.item_participants(&items[0].to_string()).unwrap(),
            vec![visitor.to_string()]
        );
        // Only the selected item gained a participant.
        assert!(db.item_participants(&items[1].to_string()).unwrap().is_empty());
    }

    #[test]
    fn requests_resolve_exactly_once() {
        let (db, host, visitor, trip_id, _) = setup();
        let req = submit(&db, trip_id, visitor, "hi", &[]).unwrap();
        accept(&db, req.id, host).unwrap();

        let err = accept(&db, req.id, host).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));
        let err = reject(&db, req.id, host).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));
    }

    #[test]
    fn only_the_host_resolves() {
        let (db, _, visitor, trip_id, _) = setup();
        let intruder = testutil::user(&db, "rolf", "Rolf Eng");
        let req = submit(&db, trip_id, visitor, "hi", &[]).unwrap();

        let err = accept(&db, req.id, intruder).unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));
        let err = reject(&db, req.id, visitor).unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));
    }

    #[test]
    fn listings_split_by_role() {
        let (db, host, visitor, trip_id, items) = setup();
        submit(&db, trip_id, visitor, "hi", &[items[1]]).unwrap();

        let mine_list = mine(&db, visitor).unwrap();
        assert_eq!(mine_list.len(), 1);
        assert_eq!(mine_list[0].trip_id, trip_id);
        assert_eq!(mine_list[0].trip_host_id, host);

        let incoming = for_my_trips(&db, host).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].requester.initials, "JL");
    }
}
