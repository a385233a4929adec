use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- pair_key is the canonical unordered member pair; its UNIQUE
        -- constraint is the authoritative backstop against two concurrent
        -- creates slipping past the existence check.
        CREATE TABLE IF NOT EXISTS chats (
            id          TEXT PRIMARY KEY,
            pair_key    TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS chat_members (
            id          TEXT PRIMARY KEY,
            chat_id     TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            UNIQUE(chat_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_chat_members_user
            ON chat_members(user_id);

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            chat_id     TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            author_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            text        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_chat
            ON messages(chat_id, created_at);

        -- Contacts are directed rows that only ever exist in symmetric
        -- pairs; each direction is unique on its own.
        CREATE TABLE IF NOT EXISTS contacts (
            id          TEXT PRIMARY KEY,
            owner_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            peer_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(owner_id, peer_id)
        );

        CREATE INDEX IF NOT EXISTS idx_contacts_owner
            ON contacts(owner_id);

        -- At most one pending request per unordered pair, in either
        -- direction, enforced by the pair_key UNIQUE constraint.
        CREATE TABLE IF NOT EXISTS requests (
            id          TEXT PRIMARY KEY,
            from_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            to_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            pair_key    TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_requests_from ON requests(from_id);
        CREATE INDEX IF NOT EXISTS idx_requests_to   ON requests(to_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
