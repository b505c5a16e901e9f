use roam_db::Database;
use roam_db::models::TripRow;
use roam_types::RewardReason;
use tracing::debug;
use uuid::Uuid;

use crate::error::CoreError;

/// Result of a ledger mutation. `delta` is the nominal amount; when the
/// zero floor absorbed part of a penalty, `new - previous` is smaller in
/// magnitude than `delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerChange {
    pub previous: i64,
    pub new: i64,
    pub delta: i64,
}

/// Apply a reward-table event to a user's score. The score is clamped at a
/// floor of zero; the audit ledger records the nominal delta regardless.
pub fn apply(
    db: &Database,
    user_id: Uuid,
    reason: RewardReason,
    context: &str,
) -> Result<LedgerChange, CoreError> {
    let (previous, new) =
        db.apply_reputation(&user_id.to_string(), reason.delta(), reason.tag(), context)?;
    debug!(
        "reputation {} for {}: {} -> {}",
        reason.tag(),
        user_id,
        previous,
        new
    );
    Ok(LedgerChange {
        previous,
        new,
        delta: reason.delta(),
    })
}

/// Undo a previously applied event by subtracting its nominal delta —
/// not the clamped effective change, per the correction semantics.
pub fn revert(
    db: &Database,
    user_id: Uuid,
    reason: RewardReason,
    context: &str,
) -> Result<LedgerChange, CoreError> {
    let tag = format!("revert_{}", reason.tag());
    let (previous, new) =
        db.apply_reputation(&user_id.to_string(), -reason.delta(), &tag, context)?;
    Ok(LedgerChange {
        previous,
        new,
        delta: -reason.delta(),
    })
}

/// Hosting award, granted at most once per trip. The idempotency flag lives
/// on the trip row and is checked-and-set atomically with the award; a trip
/// whose flag is already set yields `None`.
pub fn award_host_trip(db: &Database, trip: &TripRow) -> Result<Option<LedgerChange>, CoreError> {
    let change = db.grant_host_reward(&trip.id, &trip.host_id)?;
    Ok(change.map(|(previous, new)| LedgerChange {
        previous,
        new,
        delta: RewardReason::HostTrip.delta(),
    }))
}

pub fn award_show_up(db: &Database, user_id: Uuid, trip_id: &str) -> Result<LedgerChange, CoreError> {
    apply(db, user_id, RewardReason::ShowUp, trip_id)
}

pub fn penalize_no_show(db: &Database, user_id: Uuid, trip_id: &str) -> Result<LedgerChange, CoreError> {
    apply(db, user_id, RewardReason::NoShow, trip_id)
}

pub fn award_post(db: &Database, user_id: Uuid, post_id: &str) -> Result<LedgerChange, CoreError> {
    apply(db, user_id, RewardReason::Post, post_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use roam_types::TripStatus;

    #[test]
    fn penalty_never_drives_score_negative() {
        let db = testutil::test_db();
        let user = testutil::user(&db, "nils", "Nils Berg");

        let change = penalize_no_show(&db, user, "trip-x").unwrap();
        assert_eq!(change.previous, 0);
        assert_eq!(change.new, 0);
        assert_eq!(change.delta, -30);
        assert_eq!(db.reputation_of(&user.to_string()).unwrap(), 0);
    }

    #[test]
    fn ledger_records_nominal_delta_under_the_floor() {
        let db = testutil::test_db();
        let user = testutil::user(&db, "ida", "Ida Holm");

        award_post(&db, user, "post-1").unwrap(); // 20
        let change = penalize_no_show(&db, user, "trip-x").unwrap(); // floored
        assert_eq!(change.previous, 20);
        assert_eq!(change.new, 0);

        let events = db.reputation_events_for(&user.to_string()).unwrap();
        let penalty = events.iter().find(|e| e.reason == "no_show").unwrap();
        assert_eq!(penalty.delta, -30);

        // Revert subtracts the nominal -30, not the 20 the floor let through.
        let reverted = revert(&db, user, roam_types::RewardReason::NoShow, "trip-x").unwrap();
        assert_eq!(reverted.new, 30);
    }

    #[test]
    fn host_award_is_granted_once_per_trip() {
        let db = testutil::test_db();
        let host = testutil::user(&db, "vera", "Vera Lund");
        let (trip_id, _) = testutil::trip(&db, host, TripStatus::Planning);
        let trip = db.get_trip(&trip_id.to_string()).unwrap().unwrap();

        let first = award_host_trip(&db, &trip).unwrap();
        assert_eq!(first.unwrap().new, 70);

        let second = award_host_trip(&db, &trip).unwrap();
        assert!(second.is_none());
        assert_eq!(db.reputation_of(&host.to_string()).unwrap(), 70);
    }

    #[test]
    fn audit_tags_follow_the_reason() {
        let db = testutil::test_db();
        let user = testutil::user(&db, "kai", "Kai Moe");

        award_show_up(&db, user, "trip-1").unwrap();
        revert(&db, user, roam_types::RewardReason::ShowUp, "trip-1").unwrap();

        let events = db.reputation_events_for(&user.to_string()).unwrap();
        let tags: Vec<&str> = events.iter().map(|e| e.reason.as_str()).collect();
        assert_eq!(tags, vec!["show_up", "revert_show_up"]);
    }
}
