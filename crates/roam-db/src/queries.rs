use crate::Database;
use crate::models::{
    AttendanceRow, ChatMessageRow, ChatRoomRow, ItineraryItemRow, ReputationEventRow,
    RequestItemRow, TripRequestRow, TripRow, UserRow,
};
use anyhow::Result;
use chrono::Utc;
use roam_types::{AttendanceStatus, RewardReason};
use rusqlite::Connection;
use uuid::Uuid;

/// Outcome of an attendance write. The same-status check, the reputation
/// revert and the new apply all happen inside one locked transaction, so
/// two racing corrections cannot double-apply or double-revert.
pub enum AttendanceWrite {
    AlreadyMarked,
    Marked {
        previous: AttendanceStatus,
        marked_at: String,
        score: i64,
    },
}

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        display_name: &str,
        email: Option<&str>,
        password_hash: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, display_name, email, password, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, username, display_name, email, password_hash, now()],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{USER_COLS} WHERE username = ?1"))?;
            stmt.query_row([username], user_from_row).optional()
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{USER_COLS} WHERE id = ?1"))?;
            stmt.query_row([id], user_from_row).optional()
        })
    }

    /// Batch-fetch users for a set of ids (one query, not N).
    pub fn get_users(&self, ids: &[String]) -> Result<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!("{USER_COLS} WHERE id IN ({})", placeholders.join(", "));

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> =
                ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

            let rows = stmt
                .query_map(params.as_slice(), user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn reputation_of(&self, user_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT reputation FROM users WHERE id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .map_err(|_| anyhow::anyhow!("User not found: {}", user_id))
        })
    }

    // -- Reputation --

    /// Apply a nominal delta to a user's score, clamped at zero, and record
    /// the nominal amount in the audit ledger. Returns (previous, new).
    pub fn apply_reputation(
        &self,
        user_id: &str,
        delta: i64,
        reason_tag: &str,
        context: &str,
    ) -> Result<(i64, i64)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let change = apply_reputation_tx(&tx, user_id, delta, reason_tag, context)?;
            tx.commit()?;
            Ok(change)
        })
    }

    pub fn reputation_events_for(&self, user_id: &str) -> Result<Vec<ReputationEventRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, delta, reason, context, created_at
                 FROM reputation_events WHERE user_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ReputationEventRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        delta: row.get(2)?,
                        reason: row.get(3)?,
                        context: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Trips --

    /// Insert a trip with its itinerary and the host's roster row in one
    /// transaction. The host is always a member of their own trip.
    pub fn create_trip(&self, trip: &TripRow, items: &[ItineraryItemRow]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO trips (id, host_id, destination, description, start_date,
                                    end_date, visibility, status, host_reward_granted, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9)",
                rusqlite::params![
                    trip.id,
                    trip.host_id,
                    trip.destination,
                    trip.description,
                    trip.start_date,
                    trip.end_date,
                    trip.visibility,
                    trip.status,
                    trip.created_at,
                ],
            )?;
            for item in items {
                tx.execute(
                    "INSERT INTO itinerary_items (id, trip_id, title, day, scheduled_at, position)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![
                        item.id,
                        item.trip_id,
                        item.title,
                        item.day,
                        item.scheduled_at,
                        item.position
                    ],
                )?;
            }
            tx.execute(
                "INSERT INTO trip_members (trip_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![trip.id, trip.host_id, trip.created_at],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_trip(&self, id: &str) -> Result<Option<TripRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{TRIP_COLS} WHERE id = ?1"))?;
            stmt.query_row([id], trip_from_row).optional()
        })
    }

    pub fn get_itinerary(&self, trip_id: &str) -> Result<Vec<ItineraryItemRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, trip_id, title, day, scheduled_at, position
                 FROM itinerary_items WHERE trip_id = ?1 ORDER BY position",
            )?;
            let rows = stmt
                .query_map([trip_id], |row| {
                    Ok(ItineraryItemRow {
                        id: row.get(0)?,
                        trip_id: row.get(1)?,
                        title: row.get(2)?,
                        day: row.get(3)?,
                        scheduled_at: row.get(4)?,
                        position: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn trips_joined_by(&self, user_id: &str) -> Result<Vec<TripRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.host_id, t.destination, t.description, t.start_date,
                        t.end_date, t.visibility, t.status, t.host_reward_granted, t.created_at
                 FROM trips t
                 JOIN trip_members m ON t.id = m.trip_id
                 WHERE m.user_id = ?1
                 ORDER BY t.created_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], trip_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Compare-and-set status transition. Returns false if the trip was no
    /// longer in `from` — the caller lost a race or read a stale status.
    pub fn update_trip_status(&self, id: &str, from: &str, to: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let affected = conn.execute(
                "UPDATE trips SET status = ?1 WHERE id = ?2 AND status = ?3",
                rusqlite::params![to, id, from],
            )?;
            Ok(affected > 0)
        })
    }

    pub fn delete_trip(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM chat_participants WHERE room_id IN
                     (SELECT id FROM chat_rooms WHERE trip_id = ?1)",
                [id],
            )?;
            tx.execute(
                "DELETE FROM chat_messages WHERE room_id IN
                     (SELECT id FROM chat_rooms WHERE trip_id = ?1)",
                [id],
            )?;
            tx.execute("DELETE FROM chat_rooms WHERE trip_id = ?1", [id])?;
            tx.execute("DELETE FROM attendance_records WHERE trip_id = ?1", [id])?;
            tx.execute(
                "DELETE FROM trip_request_items WHERE request_id IN
                     (SELECT id FROM trip_requests WHERE trip_id = ?1)",
                [id],
            )?;
            tx.execute("DELETE FROM trip_requests WHERE trip_id = ?1", [id])?;
            tx.execute("DELETE FROM itinerary_participants WHERE trip_id = ?1", [id])?;
            tx.execute("DELETE FROM itinerary_items WHERE trip_id = ?1", [id])?;
            tx.execute("DELETE FROM trip_members WHERE trip_id = ?1", [id])?;
            tx.execute("DELETE FROM trips WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Grant the hosting award at most once per trip. The flag check-and-set
    /// and the score change are one transaction; a second call returns None
    /// and leaves the score untouched.
    pub fn grant_host_reward(&self, trip_id: &str, host_id: &str) -> Result<Option<(i64, i64)>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let affected = tx.execute(
                "UPDATE trips SET host_reward_granted = 1
                 WHERE id = ?1 AND host_reward_granted = 0",
                [trip_id],
            )?;
            if affected == 0 {
                return Ok(None);
            }
            let reason = RewardReason::HostTrip;
            let change = apply_reputation_tx(&tx, host_id, reason.delta(), reason.tag(), trip_id)?;
            tx.commit()?;
            Ok(Some(change))
        })
    }

    // -- Join requests --

    pub fn create_request(&self, req: &TripRequestRow, items: &[RequestItemRow]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO trip_requests (id, trip_id, requester_id, trip_host_id,
                                            message, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    req.id,
                    req.trip_id,
                    req.requester_id,
                    req.trip_host_id,
                    req.message,
                    req.status,
                    req.created_at,
                ],
            )?;
            for item in items {
                tx.execute(
                    "INSERT INTO trip_request_items (request_id, item_id, title, scheduled_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![item.request_id, item.item_id, item.title, item.scheduled_at],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn find_request_for(&self, trip_id: &str, requester_id: &str) -> Result<Option<TripRequestRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("{REQUEST_COLS} WHERE trip_id = ?1 AND requester_id = ?2"))?;
            stmt.query_row([trip_id, requester_id], request_from_row).optional()
        })
    }

    pub fn get_request(&self, id: &str) -> Result<Option<TripRequestRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{REQUEST_COLS} WHERE id = ?1"))?;
            stmt.query_row([id], request_from_row).optional()
        })
    }

    pub fn request_items(&self, request_id: &str) -> Result<Vec<RequestItemRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT request_id, item_id, title, scheduled_at
                 FROM trip_request_items WHERE request_id = ?1",
            )?;
            let rows = stmt
                .query_map([request_id], |row| {
                    Ok(RequestItemRow {
                        request_id: row.get(0)?,
                        item_id: row.get(1)?,
                        title: row.get(2)?,
                        scheduled_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn pending_requests_for_trip(&self, trip_id: &str) -> Result<Vec<TripRequestRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{REQUEST_COLS} WHERE trip_id = ?1 AND status = 'pending' ORDER BY created_at"
            ))?;
            let rows = stmt
                .query_map([trip_id], request_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn requests_by(&self, requester_id: &str) -> Result<Vec<TripRequestRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{REQUEST_COLS} WHERE requester_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([requester_id], request_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// All requests against trips owned by `host_id` — served off the
    /// denormalized trip_host_id column, no join.
    pub fn requests_for_host(&self, host_id: &str) -> Result<Vec<TripRequestRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{REQUEST_COLS} WHERE trip_host_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([host_id], request_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flip a pending request to its final status. Returns false if the
    /// request was already resolved — resolution happens exactly once.
    pub fn resolve_request(&self, id: &str, to_status: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let affected = conn.execute(
                "UPDATE trip_requests SET status = ?1, responded_at = ?2
                 WHERE id = ?3 AND status = 'pending'",
                rusqlite::params![to_status, now(), id],
            )?;
            Ok(affected > 0)
        })
    }

    // -- Membership --

    /// Add a member to the roster and to their selected itinerary items.
    /// Idempotent on both: INSERT OR IGNORE against the UNIQUE keys. Item
    /// ids that no longer exist in the trip are dropped silently.
    pub fn admit_member(&self, trip_id: &str, user_id: &str, item_ids: &[String]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let joined_at = now();
            tx.execute(
                "INSERT OR IGNORE INTO trip_members (trip_id, user_id, joined_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![trip_id, user_id, joined_at],
            )?;
            for item_id in item_ids {
                tx.execute(
                    "INSERT OR IGNORE INTO itinerary_participants (trip_id, item_id, user_id, joined_at)
                     SELECT trip_id, id, ?1, ?2 FROM itinerary_items
                     WHERE id = ?3 AND trip_id = ?4",
                    rusqlite::params![user_id, joined_at, item_id, trip_id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn is_member(&self, trip_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM trip_members WHERE trip_id = ?1 AND user_id = ?2",
                    [trip_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn members_of(&self, trip_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM trip_members WHERE trip_id = ?1 ORDER BY joined_at",
            )?;
            let rows = stmt
                .query_map([trip_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn item_participants(&self, item_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM itinerary_participants WHERE item_id = ?1 ORDER BY joined_at",
            )?;
            let rows = stmt
                .query_map([item_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Chat --

    /// Create the trip's active room if none exists, otherwise add the new
    /// member to it. Check-then-mutate runs inside one locked transaction.
    /// Returns the room and whether it was created by this call.
    pub fn ensure_chat_room(
        &self,
        trip_id: &str,
        host_id: &str,
        member_id: &str,
        new_room_id: &str,
        new_external_id: &str,
    ) -> Result<(ChatRoomRow, bool)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = now();

            let existing = {
                let mut stmt = tx
                    .prepare(&format!("{ROOM_COLS} WHERE trip_id = ?1 AND active = 1"))?;
                stmt.query_row([trip_id], room_from_row).optional()?
            };

            let (room, created) = match existing {
                Some(room) => {
                    tx.execute(
                        "INSERT OR IGNORE INTO chat_participants (room_id, user_id, joined_at)
                         VALUES (?1, ?2, ?3)",
                        rusqlite::params![room.id, member_id, ts],
                    )?;
                    (room, false)
                }
                None => {
                    tx.execute(
                        "INSERT INTO chat_rooms (id, trip_id, host_id, external_id, active,
                                                 last_activity_at, created_at)
                         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
                        rusqlite::params![new_room_id, trip_id, host_id, new_external_id, ts],
                    )?;
                    for user in [host_id, member_id] {
                        tx.execute(
                            "INSERT OR IGNORE INTO chat_participants (room_id, user_id, joined_at)
                             VALUES (?1, ?2, ?3)",
                            rusqlite::params![new_room_id, user, ts],
                        )?;
                    }
                    let room = ChatRoomRow {
                        id: new_room_id.to_string(),
                        trip_id: trip_id.to_string(),
                        host_id: host_id.to_string(),
                        external_id: new_external_id.to_string(),
                        active: true,
                        last_activity_at: ts.clone(),
                        created_at: ts,
                    };
                    (room, true)
                }
            };

            tx.commit()?;
            Ok((room, created))
        })
    }

    pub fn get_chat_room(&self, id: &str) -> Result<Option<ChatRoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{ROOM_COLS} WHERE id = ?1"))?;
            stmt.query_row([id], room_from_row).optional()
        })
    }

    pub fn room_participants(&self, room_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM chat_participants WHERE room_id = ?1 ORDER BY joined_at",
            )?;
            let rows = stmt
                .query_map([room_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn is_room_participant(&self, room_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM chat_participants WHERE room_id = ?1 AND user_id = ?2",
                    [room_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Soft delete: history is kept, the room just stops being active.
    /// Returns false if the room was already deactivated.
    pub fn deactivate_room(&self, room_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let affected = conn.execute(
                "UPDATE chat_rooms SET active = 0 WHERE id = ?1 AND active = 1",
                [room_id],
            )?;
            Ok(affected > 0)
        })
    }

    /// Active rooms the user participates in, most recently active first.
    pub fn rooms_for_user(&self, user_id: &str) -> Result<Vec<ChatRoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.trip_id, r.host_id, r.external_id, r.active,
                        r.last_activity_at, r.created_at
                 FROM chat_rooms r
                 JOIN chat_participants p ON r.id = p.room_id
                 WHERE p.user_id = ?1 AND r.active = 1
                 ORDER BY r.last_activity_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], room_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Insert a message and bump the room's last-activity timestamp in one
    /// transaction. Returns the stored created_at.
    pub fn insert_chat_message(
        &self,
        id: &str,
        room_id: &str,
        author_id: &str,
        body: &str,
    ) -> Result<String> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = now();
            tx.execute(
                "INSERT INTO chat_messages (id, room_id, author_id, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, room_id, author_id, body, ts],
            )?;
            tx.execute(
                "UPDATE chat_rooms SET last_activity_at = ?1 WHERE id = ?2",
                rusqlite::params![ts, room_id],
            )?;
            tx.commit()?;
            Ok(ts)
        })
    }

    /// Cursor-based pagination — pass the `created_at` of the oldest message
    /// from the previous page to fetch older messages.
    pub fn get_chat_messages(
        &self,
        room_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<ChatMessageRow>> {
        self.with_conn(|conn| {
            let (sql, params): (&str, Vec<&dyn rusqlite::types::ToSql>) = match before {
                Some(ref cursor) => (
                    "SELECT id, room_id, author_id, body, created_at
                     FROM chat_messages
                     WHERE room_id = ?1 AND created_at < ?2
                     ORDER BY created_at DESC LIMIT ?3",
                    vec![
                        &room_id as &dyn rusqlite::types::ToSql,
                        cursor as &dyn rusqlite::types::ToSql,
                        &limit as &dyn rusqlite::types::ToSql,
                    ],
                ),
                None => (
                    "SELECT id, room_id, author_id, body, created_at
                     FROM chat_messages
                     WHERE room_id = ?1
                     ORDER BY created_at DESC LIMIT ?2",
                    vec![
                        &room_id as &dyn rusqlite::types::ToSql,
                        &limit as &dyn rusqlite::types::ToSql,
                    ],
                ),
            };

            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(ChatMessageRow {
                        id: row.get(0)?,
                        room_id: row.get(1)?,
                        author_id: row.get(2)?,
                        body: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Attendance --

    pub fn attendance_for_trip(&self, trip_id: &str) -> Result<Vec<AttendanceRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT trip_id, participant_id, status, marked_at, marked_by
                 FROM attendance_records WHERE trip_id = ?1",
            )?;
            let rows = stmt
                .query_map([trip_id], attendance_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_attendance(&self, trip_id: &str, participant_id: &str) -> Result<Option<AttendanceRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT trip_id, participant_id, status, marked_at, marked_by
                 FROM attendance_records WHERE trip_id = ?1 AND participant_id = ?2",
            )?;
            stmt.query_row([trip_id, participant_id], attendance_from_row).optional()
        })
    }

    /// Upsert an attendance mark and settle its reputation consequences.
    ///
    /// Inside one transaction: read the previous status, bail out if it
    /// equals the new one, revert the previous status's nominal delta if a
    /// mark existed (the correction path), write the record, apply the new
    /// status's delta. The score is clamped at zero on every step while the
    /// ledger keeps nominal amounts.
    pub fn record_attendance(
        &self,
        trip_id: &str,
        participant_id: &str,
        new_status: AttendanceStatus,
        marked_by: &str,
    ) -> Result<AttendanceWrite> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let previous: Option<String> = tx
                .query_row(
                    "SELECT status FROM attendance_records
                     WHERE trip_id = ?1 AND participant_id = ?2",
                    [trip_id, participant_id],
                    |row| row.get(0),
                )
                .optional()?;
            let previous = match previous.as_deref() {
                Some(s) => AttendanceStatus::parse(s)
                    .ok_or_else(|| anyhow::anyhow!("Corrupt attendance status: {}", s))?,
                None => AttendanceStatus::Pending,
            };

            if previous == new_status {
                return Ok(AttendanceWrite::AlreadyMarked);
            }

            if let Some(reason) = previous.reward() {
                apply_reputation_tx(
                    &tx,
                    participant_id,
                    -reason.delta(),
                    &format!("revert_{}", reason.tag()),
                    trip_id,
                )?;
            }

            let marked_at = now();
            tx.execute(
                "INSERT INTO attendance_records (trip_id, participant_id, status, marked_at, marked_by)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(trip_id, participant_id)
                 DO UPDATE SET status = ?3, marked_at = ?4, marked_by = ?5",
                rusqlite::params![trip_id, participant_id, new_status.as_str(), marked_at, marked_by],
            )?;

            if let Some(reason) = new_status.reward() {
                apply_reputation_tx(&tx, participant_id, reason.delta(), reason.tag(), trip_id)?;
            }

            let score: i64 = tx.query_row(
                "SELECT reputation FROM users WHERE id = ?1",
                [participant_id],
                |row| row.get(0),
            )?;

            tx.commit()?;
            Ok(AttendanceWrite::Marked {
                previous,
                marked_at,
                score,
            })
        })
    }
}

const USER_COLS: &str = "SELECT id, username, display_name, email, avatar_url, password, \
                         reputation, created_at FROM users";
const TRIP_COLS: &str = "SELECT id, host_id, destination, description, start_date, end_date, \
                         visibility, status, host_reward_granted, created_at FROM trips";
const REQUEST_COLS: &str = "SELECT id, trip_id, requester_id, trip_host_id, message, status, \
                            created_at, responded_at FROM trip_requests";
const ROOM_COLS: &str = "SELECT id, trip_id, host_id, external_id, active, last_activity_at, \
                         created_at FROM chat_rooms";

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// The single write path for the reputation score: clamp at zero, record
/// the nominal delta in the audit ledger. Returns (previous, new).
fn apply_reputation_tx(
    conn: &Connection,
    user_id: &str,
    delta: i64,
    reason_tag: &str,
    context: &str,
) -> Result<(i64, i64)> {
    let previous: i64 = conn.query_row(
        "SELECT reputation FROM users WHERE id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    conn.execute(
        "UPDATE users SET reputation = MAX(0, reputation + ?1) WHERE id = ?2",
        rusqlite::params![delta, user_id],
    )?;
    conn.execute(
        "INSERT INTO reputation_events (id, user_id, delta, reason, context, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            Uuid::new_v4().to_string(),
            user_id,
            delta,
            reason_tag,
            context,
            now()
        ],
    )?;
    Ok((previous, previous.saturating_add(delta).max(0)))
}

fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        email: row.get(3)?,
        avatar_url: row.get(4)?,
        password: row.get(5)?,
        reputation: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn trip_from_row(row: &rusqlite::Row) -> rusqlite::Result<TripRow> {
    Ok(TripRow {
        id: row.get(0)?,
        host_id: row.get(1)?,
        destination: row.get(2)?,
        description: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        visibility: row.get(6)?,
        status: row.get(7)?,
        host_reward_granted: row.get::<_, i64>(8)? != 0,
        created_at: row.get(9)?,
    })
}

fn request_from_row(row: &rusqlite::Row) -> rusqlite::Result<TripRequestRow> {
    Ok(TripRequestRow {
        id: row.get(0)?,
        trip_id: row.get(1)?,
        requester_id: row.get(2)?,
        trip_host_id: row.get(3)?,
        message: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
        responded_at: row.get(7)?,
    })
}

fn room_from_row(row: &rusqlite::Row) -> rusqlite::Result<ChatRoomRow> {
    Ok(ChatRoomRow {
        id: row.get(0)?,
        trip_id: row.get(1)?,
        host_id: row.get(2)?,
        external_id: row.get(3)?,
        active: row.get::<_, i64>(4)? != 0,
        last_activity_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn attendance_from_row(row: &rusqlite::Row) -> rusqlite::Result<AttendanceRow> {
    Ok(AttendanceRow {
        trip_id: row.get(0)?,
        participant_id: row.get(1)?,
        status: row.get(2)?,
        marked_at: row.get(3)?,
        marked_by: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
