use std::collections::HashMap;

use roam_db::models::AttendanceRow;
use roam_db::{AttendanceWrite, Database};
use roam_types::{AttendanceStatus, TripStatus};
use roam_types::api::{PublicProfile, RosterEntryResponse};
use tracing::info;
use uuid::Uuid;

use crate::convert::{parse_ts, parse_uuid};
use crate::error::CoreError;
use crate::privacy;
use crate::trips::trip_status;

/// The trip roster as the host marks it: everyone except the host, privacy
/// projected, with their current attendance state. Unmarked participants
/// show as `pending` — no record exists for them yet.
pub fn roster(db: &Database, trip_id: Uuid, caller: Uuid) -> Result<Vec<RosterEntryResponse>, CoreError> {
    let trip = db
        .get_trip(&trip_id.to_string())?
        .ok_or(CoreError::NotFound("trip"))?;
    if trip.host_id != caller.to_string() {
        return Err(CoreError::Authorization(
            "only the trip host may view the attendance roster",
        ));
    }

    let members: Vec<String> = db
        .members_of(&trip.id)?
        .into_iter()
        .filter(|m| *m != trip.host_id)
        .collect();
    let marks: HashMap<String, AttendanceRow> = db
        .attendance_for_trip(&trip.id)?
        .into_iter()
        .map(|r| (r.participant_id.clone(), r))
        .collect();
    let users: HashMap<String, _> = db
        .get_users(&members)?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    members
        .iter()
        .map(|member| {
            let user = users.get(member).ok_or(CoreError::NotFound("user"))?;
            let (status, marked_at) = match marks.get(member) {
                Some(mark) => (
                    AttendanceStatus::parse(&mark.status).unwrap_or(AttendanceStatus::Pending),
                    Some(parse_ts(&mark.marked_at)),
                ),
                None => (AttendanceStatus::Pending, None),
            };
            Ok(RosterEntryResponse {
                participant: privacy::project(user),
                status,
                marked_at,
            })
        })
        .collect()
}

/// Mark (or correct) a participant's attendance and settle the reputation
/// consequences. First mark applies the status's delta; a correction first
/// reverts the previous status's nominal delta, then applies the new one.
/// Marking the same status twice fails. Cancelled trips never carry
/// attendance or reputation consequences.
pub fn mark(
    db: &Database,
    trip_id: Uuid,
    caller: Uuid,
    participant: Uuid,
    new_status: AttendanceStatus,
) -> Result<RosterEntryResponse, CoreError> {
    if new_status == AttendanceStatus::Pending {
        return Err(CoreError::InvalidOperation(
            "attendance can only be marked showed_up or no_show",
        ));
    }

    let trip = db
        .get_trip(&trip_id.to_string())?
        .ok_or(CoreError::NotFound("trip"))?;
    if trip.host_id != caller.to_string() {
        return Err(CoreError::Authorization(
            "only the trip host may mark attendance",
        ));
    }
    if !db.is_member(&trip.id, &participant.to_string())? {
        return Err(CoreError::NotFound("trip participant"));
    }
    if trip_status(&trip)? == TripStatus::Cancelled {
        return Err(CoreError::InvalidOperation(
            "attendance cannot be marked on a cancelled trip",
        ));
    }
    if participant.to_string() == trip.host_id {
        return Err(CoreError::InvalidOperation(
            "the trip host is not an attendance subject",
        ));
    }

    let outcome = db.record_attendance(
        &trip.id,
        &participant.to_string(),
        new_status,
        &caller.to_string(),
    )?;
    let (previous, marked_at, score) = match outcome {
        AttendanceWrite::AlreadyMarked => {
            return Err(CoreError::InvalidOperation("attendance already marked with this status"));
        }
        AttendanceWrite::Marked {
            previous,
            marked_at,
            score,
        } => (previous, marked_at, score),
    };
    info!(
        "attendance for {} on trip {}: {} -> {}",
        participant,
        trip_id,
        previous.as_str(),
        new_status.as_str()
    );

    let user = db
        .get_user(&participant.to_string())?
        .ok_or(CoreError::NotFound("user"))?;
    Ok(RosterEntryResponse {
        participant: PublicProfile {
            user_id: parse_uuid(&user.id, "user"),
            initials: privacy::initials(&user.display_name),
            reputation: score,
        },
        status: new_status,
        marked_at: Some(parse_ts(&marked_at)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{membership, testutil};

    fn setup(status: TripStatus) -> (Database, Uuid, Uuid, Uuid) {
        let db = testutil::test_db();
        let host = testutil::user(&db, "sigrid", "Sigrid Haug");
        let guest = testutil::user(&db, "arne", "Arne Foss");
        let (trip_id, _) = testutil::trip(&db, host, status);
        membership::admit(&db, &trip_id.to_string(), &guest.to_string(), &[]).unwrap();
        (db, host, guest, trip_id)
    }

    #[test]
    fn roster_is_host_only_and_excludes_the_host() {
        let (db, host, guest, trip_id) = setup(TripStatus::Confirmed);

        let err = roster(&db, trip_id, guest).unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));

        let entries = roster(&db, trip_id, host).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].participant.user_id, guest);
        assert_eq!(entries[0].participant.initials, "AF");
        assert_eq!(entries[0].status, AttendanceStatus::Pending);
        assert!(entries[0].marked_at.is_none());
    }

    #[test]
    fn first_mark_awards_show_up() {
        let (db, host, guest, trip_id) = setup(TripStatus::Confirmed);

        let entry = mark(&db, trip_id, host, guest, AttendanceStatus::ShowedUp).unwrap();
        assert_eq!(entry.status, AttendanceStatus::ShowedUp);
        assert_eq!(entry.participant.reputation, 40);
        assert!(entry.marked_at.is_some());

        let roster_after = roster(&db, trip_id, host).unwrap();
        assert_eq!(roster_after[0].status, AttendanceStatus::ShowedUp);
    }

    #[test]
    fn repeating_the_same_mark_fails() {
        let (db, host, guest, trip_id) = setup(TripStatus::Confirmed);

        mark(&db, trip_id, host, guest, AttendanceStatus::ShowedUp).unwrap();
        let err = mark(&db, trip_id, host, guest, AttendanceStatus::ShowedUp).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));

        // Score unchanged by the failed repeat.
        assert_eq!(db.reputation_of(&guest.to_string()).unwrap(), 40);
    }

    #[test]
    fn correction_reverts_then_applies_with_floor() {
        let (db, host, guest, trip_id) = setup(TripStatus::Confirmed);

        mark(&db, trip_id, host, guest, AttendanceStatus::ShowedUp).unwrap();
        assert_eq!(db.reputation_of(&guest.to_string()).unwrap(), 40);

        // revert +40 -> 0, apply -30 -> floored at 0
        let corrected = mark(&db, trip_id, host, guest, AttendanceStatus::NoShow).unwrap();
        assert_eq!(corrected.status, AttendanceStatus::NoShow);
        assert_eq!(corrected.participant.reputation, 0);

        let record = db
            .get_attendance(&trip_id.to_string(), &guest.to_string())
            .unwrap()
            .unwrap();
        assert_eq!(record.status, "no_show");
    }

    #[test]
    fn correction_nets_like_a_direct_mark_without_floor() {
        let (db, host, guest, trip_id) = setup(TripStatus::Confirmed);
        // Baseline of 100 so nothing clamps.
        for i in 0..5 {
            crate::reputation::award_post(&db, guest, &format!("post-{i}")).unwrap();
        }

        mark(&db, trip_id, host, guest, AttendanceStatus::ShowedUp).unwrap();
        assert_eq!(db.reputation_of(&guest.to_string()).unwrap(), 140);

        mark(&db, trip_id, host, guest, AttendanceStatus::NoShow).unwrap();
        // Same as applying no_show straight from pending: 100 - 30.
        assert_eq!(db.reputation_of(&guest.to_string()).unwrap(), 70);

        // And back: revert -30, apply +40.
        mark(&db, trip_id, host, guest, AttendanceStatus::ShowedUp).unwrap();
        assert_eq!(db.reputation_of(&guest.to_string()).unwrap(), 140);
    }

    #[test]
    fn marking_requires_the_host() {
        let (db, _, guest, trip_id) = setup(TripStatus::Confirmed);
        let err = mark(&db, trip_id, guest, guest, AttendanceStatus::ShowedUp).unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));
    }

    #[test]
    fn non_members_cannot_be_marked() {
        let (db, host, _, trip_id) = setup(TripStatus::Confirmed);
        let outsider = testutil::user(&db, "pia", "Pia Nes");
        let err = mark(&db, trip_id, host, outsider, AttendanceStatus::NoShow).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn cancelled_trips_never_carry_consequences() {
        let (db, host, guest, trip_id) = setup(TripStatus::Cancelled);
        let err = mark(&db, trip_id, host, guest, AttendanceStatus::ShowedUp).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));
        assert_eq!(db.reputation_of(&guest.to_string()).unwrap(), 0);
    }

    #[test]
    fn the_host_is_never_a_subject() {
        let (db, host, _, trip_id) = setup(TripStatus::Confirmed);
        let err = mark(&db, trip_id, host, host, AttendanceStatus::ShowedUp).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));
    }

    #[test]
    fn pending_is_not_a_markable_status() {
        let (db, host, guest, trip_id) = setup(TripStatus::Confirmed);
        let err = mark(&db, trip_id, host, guest, AttendanceStatus::Pending).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));
    }
}
