use roam_db::Database;

use crate::error::CoreError;

/// Put a member on a trip's roster and on each itinerary item they picked.
/// Idempotent end to end: a second admission (or a concurrent one) changes
/// nothing, and item ids that no longer exist in the trip are dropped
/// silently rather than failing the whole admission.
pub fn admit(
    db: &Database,
    trip_id: &str,
    member_id: &str,
    item_ids: &[String],
) -> Result<(), CoreError> {
    db.admit_member(trip_id, member_id, item_ids)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use roam_types::TripStatus;

    #[test]
    fn admission_is_idempotent() {
        let db = testutil::test_db();
        let host = testutil::user(&db, "stine", "Stine Vik");
        let guest = testutil::user(&db, "omar", "Omar Said");
        let (trip_id, items) = testutil::trip(&db, host, TripStatus::Planning);

        let selected = vec![items[0].to_string()];
        admit(&db, &trip_id.to_string(), &guest.to_string(), &selected).unwrap();
        admit(&db, &trip_id.to_string(), &guest.to_string(), &selected).unwrap();

        let members = db.members_of(&trip_id.to_string()).unwrap();
        assert_eq!(
            members.iter().filter(|m| **m == guest.to_string()).count(),
            1
        );
        let participants = db.item_participants(&items[0].to_string()).unwrap();
        assert_eq!(participants, vec![guest.to_string()]);
    }

    #[test]
    fn stale_item_ids_are_dropped() {
        let db = testutil::test_db();
        let host = testutil::user(&db, "stine", "Stine Vik");
        let guest = testutil::user(&db, "omar", "Omar Said");
        let (trip_id, items) = testutil::trip(&db, host, TripStatus::Planning);

        let bogus = uuid::Uuid::new_v4().to_string();
        admit(
            &db,
            &trip_id.to_string(),
            &guest.to_string(),
            &[items[1].to_string(), bogus.clone()],
        )
        .unwrap();

        assert!(db.is_member(&trip_id.to_string(), &guest.to_string()).unwrap());
        assert_eq!(
            db.item_participants(&items[1].to_string()).unwrap(),
            vec![guest.to_string()]
        );
        assert!(db.item_participants(&bogus).unwrap().is_empty());
    }
}
