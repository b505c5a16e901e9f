use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            username        TEXT NOT NULL UNIQUE,
            display_name    TEXT NOT NULL,
            email           TEXT,
            avatar_url      TEXT,
            password        TEXT NOT NULL,
            reputation      INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS trips (
            id                  TEXT PRIMARY KEY,
            host_id             TEXT NOT NULL REFERENCES users(id),
            destination         TEXT NOT NULL,
            description         TEXT,
            start_date          TEXT NOT NULL,
            end_date            TEXT NOT NULL,
            visibility          TEXT NOT NULL,
            status              TEXT NOT NULL,
            host_reward_granted INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_trips_host
            ON trips(host_id);

        CREATE TABLE IF NOT EXISTS itinerary_items (
            id              TEXT PRIMARY KEY,
            trip_id         TEXT NOT NULL REFERENCES trips(id),
            title           TEXT NOT NULL,
            day             INTEGER NOT NULL,
            scheduled_at    TEXT,
            position        INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_itinerary_trip
            ON itinerary_items(trip_id, position);

        CREATE TABLE IF NOT EXISTS trip_members (
            trip_id     TEXT NOT NULL REFERENCES trips(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            joined_at   TEXT NOT NULL,
            UNIQUE(trip_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS itinerary_participants (
            trip_id     TEXT NOT NULL REFERENCES trips(id),
            item_id     TEXT NOT NULL REFERENCES itinerary_items(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            joined_at   TEXT NOT NULL,
            UNIQUE(item_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_item_participants_trip
            ON itinerary_participants(trip_id);

        -- One request per (trip, requester), ever. The key is permanent:
        -- a rejected requester cannot re-request.
        CREATE TABLE IF NOT EXISTS trip_requests (
            id              TEXT PRIMARY KEY,
            trip_id         TEXT NOT NULL REFERENCES trips(id),
            requester_id    TEXT NOT NULL REFERENCES users(id),
            trip_host_id    TEXT NOT NULL REFERENCES users(id),
            message         TEXT NOT NULL DEFAULT '',
            status          TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            responded_at    TEXT,
            UNIQUE(trip_id, requester_id)
        );

        CREATE INDEX IF NOT EXISTS idx_requests_host
            ON trip_requests(trip_host_id, status);
        CREATE INDEX IF NOT EXISTS idx_requests_requester
            ON trip_requests(requester_id);

        -- Snapshot of the itinerary selection at submission time, with the
        -- item label and schedule the requester saw.
        CREATE TABLE IF NOT EXISTS trip_request_items (
            request_id      TEXT NOT NULL REFERENCES trip_requests(id),
            item_id         TEXT NOT NULL REFERENCES itinerary_items(id),
            title           TEXT NOT NULL,
            scheduled_at    TEXT,
            UNIQUE(request_id, item_id)
        );

        -- A row exists only once a participant has been marked; 'pending'
        -- is the absence of a row and is never stored.
        CREATE TABLE IF NOT EXISTS attendance_records (
            trip_id         TEXT NOT NULL REFERENCES trips(id),
            participant_id  TEXT NOT NULL REFERENCES users(id),
            status          TEXT NOT NULL,
            marked_at       TEXT NOT NULL,
            marked_by       TEXT NOT NULL REFERENCES users(id),
            UNIQUE(trip_id, participant_id)
        );

        CREATE TABLE IF NOT EXISTS chat_rooms (
            id                  TEXT PRIMARY KEY,
            trip_id             TEXT NOT NULL REFERENCES trips(id),
            host_id             TEXT NOT NULL REFERENCES users(id),
            external_id         TEXT NOT NULL UNIQUE,
            active              INTEGER NOT NULL DEFAULT 1,
            last_activity_at    TEXT NOT NULL,
            created_at          TEXT NOT NULL
        );

        -- Exactly one active room per trip; deactivated rooms keep history.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_chat_rooms_trip_active
            ON chat_rooms(trip_id) WHERE active = 1;

        CREATE TABLE IF NOT EXISTS chat_participants (
            room_id     TEXT NOT NULL REFERENCES chat_rooms(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            joined_at   TEXT NOT NULL,
            UNIQUE(room_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS chat_messages (
            id          TEXT PRIMARY KEY,
            room_id     TEXT NOT NULL REFERENCES chat_rooms(id),
            author_id   TEXT NOT NULL REFERENCES users(id),
            body        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_room
            ON chat_messages(room_id, created_at);

        -- Durable audit ledger. 'delta' is the nominal amount of the event,
        -- recorded even when the zero floor absorbed part of it.
        CREATE TABLE IF NOT EXISTS reputation_events (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            delta       INTEGER NOT NULL,
            reason      TEXT NOT NULL,
            context     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reputation_user
            ON reputation_events(user_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
