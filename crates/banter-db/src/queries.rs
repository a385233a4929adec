use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use banter_types::error::Error;

use crate::models::{ChatMemberRow, ChatSummary, ContactRow, MessageRow, RequestRow, UserRow};
use crate::store_err;

// -- Users --

pub fn insert_user(
    conn: &Connection,
    id: Uuid,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO users (id, username, email, password) VALUES (?1, ?2, ?3, ?4)",
        params![id.to_string(), username, email, password_hash],
    )
    .map_err(store_err)?;
    Ok(())
}

pub fn user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>, Error> {
    conn.prepare(
        "SELECT id, username, email, password, created_at FROM users WHERE username = ?1",
    )
    .and_then(|mut stmt| stmt.query_row([username], map_user).optional())
    .map_err(store_err)
}

pub fn user_by_id(conn: &Connection, id: Uuid) -> Result<Option<UserRow>, Error> {
    conn.prepare("SELECT id, username, email, password, created_at FROM users WHERE id = ?1")
        .and_then(|mut stmt| stmt.query_row([id.to_string()], map_user).optional())
        .map_err(store_err)
}

pub fn user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>, Error> {
    conn.prepare("SELECT id, username, email, password, created_at FROM users WHERE email = ?1")
        .and_then(|mut stmt| stmt.query_row([email], map_user).optional())
        .map_err(store_err)
}

/// Substring search over username and email, case-insensitive. Blank
/// filters fall back to the full listing ordered by username.
pub fn search_users(conn: &Connection, username: &str, email: &str) -> Result<Vec<UserRow>, Error> {
    let mut stmt = conn
        .prepare(
            "SELECT id, username, email, password, created_at FROM users
             WHERE username LIKE '%' || ?1 || '%' COLLATE NOCASE
               AND email LIKE '%' || ?2 || '%' COLLATE NOCASE
             ORDER BY username ASC",
        )
        .map_err(store_err)?;
    let rows = stmt
        .query_map([username, email], map_user)
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(store_err)?;
    Ok(rows)
}

pub fn update_user(
    conn: &Connection,
    id: Uuid,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<(), Error> {
    conn.execute(
        "UPDATE users SET username = ?2, email = ?3, password = ?4 WHERE id = ?1",
        params![id.to_string(), username, email, password_hash],
    )
    .map_err(store_err)?;
    Ok(())
}

pub fn delete_user(conn: &Connection, id: Uuid) -> Result<(), Error> {
    conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])
        .map_err(store_err)?;
    Ok(())
}

pub fn user_exists(conn: &Connection, id: Uuid) -> Result<bool, Error> {
    exists(conn, "SELECT 1 FROM users WHERE id = ?1", [id.to_string()])
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: row.get(4)?,
    })
}

// -- Chats --

pub fn insert_chat(conn: &Connection, id: Uuid, pair_key: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO chats (id, pair_key) VALUES (?1, ?2)",
        params![id.to_string(), pair_key],
    )
    .map_err(store_err)?;
    Ok(())
}

pub fn insert_chat_member(
    conn: &Connection,
    id: Uuid,
    chat_id: Uuid,
    user_id: Uuid,
) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO chat_members (id, chat_id, user_id) VALUES (?1, ?2, ?3)",
        params![id.to_string(), chat_id.to_string(), user_id.to_string()],
    )
    .map_err(store_err)?;
    Ok(())
}

pub fn chat_exists(conn: &Connection, id: Uuid) -> Result<bool, Error> {
    exists(conn, "SELECT 1 FROM chats WHERE id = ?1", [id.to_string()])
}

pub fn chat_exists_by_pair(conn: &Connection, pair_key: &str) -> Result<bool, Error> {
    exists(conn, "SELECT 1 FROM chats WHERE pair_key = ?1", [pair_key])
}

pub fn is_chat_member(conn: &Connection, user_id: Uuid, chat_id: Uuid) -> Result<bool, Error> {
    exists(
        conn,
        "SELECT 1 FROM chat_members WHERE user_id = ?1 AND chat_id = ?2",
        params![user_id.to_string(), chat_id.to_string()],
    )
}

pub fn chat_members(conn: &Connection, chat_id: Uuid) -> Result<Vec<ChatMemberRow>, Error> {
    let mut stmt = conn
        .prepare(
            "SELECT m.id, m.chat_id, m.user_id, u.username
             FROM chat_members m
             JOIN users u ON u.id = m.user_id
             WHERE m.chat_id = ?1",
        )
        .map_err(store_err)?;
    let rows = stmt
        .query_map([chat_id.to_string()], |row| {
            Ok(ChatMemberRow {
                id: row.get(0)?,
                chat_id: row.get(1)?,
                user_id: row.get(2)?,
                username: row.get(3)?,
            })
        })
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(store_err)?;
    Ok(rows)
}

/// Chats the user belongs to, each named after the other participant.
pub fn chats_by_user(conn: &Connection, user_id: Uuid) -> Result<Vec<ChatSummary>, Error> {
    let mut stmt = conn
        .prepare(
            "SELECT c.id, u.username
             FROM chats c
             JOIN chat_members mine  ON mine.chat_id = c.id AND mine.user_id = ?1
             JOIN chat_members other ON other.chat_id = c.id AND other.user_id != ?1
             JOIN users u ON u.id = other.user_id
             ORDER BY c.created_at DESC",
        )
        .map_err(store_err)?;
    let rows = stmt
        .query_map([user_id.to_string()], |row| {
            Ok(ChatSummary {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(store_err)?;
    Ok(rows)
}

pub fn chat_ids_by_user(conn: &Connection, user_id: Uuid) -> Result<Vec<String>, Error> {
    let mut stmt = conn
        .prepare("SELECT chat_id FROM chat_members WHERE user_id = ?1")
        .map_err(store_err)?;
    let rows = stmt
        .query_map([user_id.to_string()], |row| row.get(0))
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(store_err)?;
    Ok(rows)
}

pub fn delete_chat(conn: &Connection, id: Uuid) -> Result<(), Error> {
    conn.execute("DELETE FROM chats WHERE id = ?1", [id.to_string()])
        .map_err(store_err)?;
    Ok(())
}

pub fn delete_chat_members(conn: &Connection, chat_id: Uuid) -> Result<(), Error> {
    conn.execute(
        "DELETE FROM chat_members WHERE chat_id = ?1",
        [chat_id.to_string()],
    )
    .map_err(store_err)?;
    Ok(())
}

pub fn chat_member_count(conn: &Connection, chat_id: Uuid) -> Result<i64, Error> {
    conn.query_row(
        "SELECT COUNT(*) FROM chat_members WHERE chat_id = ?1",
        [chat_id.to_string()],
        |row| row.get(0),
    )
    .map_err(store_err)
}

// -- Messages --

pub fn insert_message(
    conn: &Connection,
    id: Uuid,
    chat_id: Uuid,
    author_id: Uuid,
    text: &str,
    created_at: &str,
) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO messages (id, chat_id, author_id, text, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id.to_string(),
            chat_id.to_string(),
            author_id.to_string(),
            text,
            created_at
        ],
    )
    .map_err(store_err)?;
    Ok(())
}

pub fn message_by_id(conn: &Connection, id: Uuid) -> Result<Option<MessageRow>, Error> {
    conn.prepare(
        "SELECT m.id, m.chat_id, m.author_id, u.username, m.text, m.created_at
         FROM messages m
         JOIN users u ON u.id = m.author_id
         WHERE m.id = ?1",
    )
    .and_then(|mut stmt| stmt.query_row([id.to_string()], map_message).optional())
    .map_err(store_err)
}

pub fn messages_by_chat(conn: &Connection, chat_id: Uuid) -> Result<Vec<MessageRow>, Error> {
    let mut stmt = conn
        .prepare(
            "SELECT m.id, m.chat_id, m.author_id, u.username, m.text, m.created_at
             FROM messages m
             JOIN users u ON u.id = m.author_id
             WHERE m.chat_id = ?1
             ORDER BY m.created_at ASC",
        )
        .map_err(store_err)?;
    let rows = stmt
        .query_map([chat_id.to_string()], map_message)
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(store_err)?;
    Ok(rows)
}

pub fn message_count_by_chat(conn: &Connection, chat_id: Uuid) -> Result<i64, Error> {
    conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE chat_id = ?1",
        [chat_id.to_string()],
        |row| row.get(0),
    )
    .map_err(store_err)
}

pub fn update_message_text(conn: &Connection, id: Uuid, text: &str) -> Result<(), Error> {
    conn.execute(
        "UPDATE messages SET text = ?2 WHERE id = ?1",
        params![id.to_string(), text],
    )
    .map_err(store_err)?;
    Ok(())
}

pub fn delete_message(conn: &Connection, id: Uuid) -> Result<(), Error> {
    conn.execute("DELETE FROM messages WHERE id = ?1", [id.to_string()])
        .map_err(store_err)?;
    Ok(())
}

pub fn message_exists(conn: &Connection, id: Uuid) -> Result<bool, Error> {
    exists(
        conn,
        "SELECT 1 FROM messages WHERE id = ?1",
        [id.to_string()],
    )
}

pub fn delete_messages_by_chat(conn: &Connection, chat_id: Uuid) -> Result<(), Error> {
    conn.execute(
        "DELETE FROM messages WHERE chat_id = ?1",
        [chat_id.to_string()],
    )
    .map_err(store_err)?;
    Ok(())
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        text: row.get(4)?,
        created_at: row.get(5)?,
    })
}

// -- Contacts --

pub fn insert_contact(
    conn: &Connection,
    id: Uuid,
    owner_id: Uuid,
    peer_id: Uuid,
) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO contacts (id, owner_id, peer_id) VALUES (?1, ?2, ?3)",
        params![id.to_string(), owner_id.to_string(), peer_id.to_string()],
    )
    .map_err(store_err)?;
    Ok(())
}

pub fn contact_by_id(conn: &Connection, id: Uuid) -> Result<Option<ContactRow>, Error> {
    conn.prepare(&format!("{CONTACT_SELECT} WHERE c.id = ?1"))
        .and_then(|mut stmt| stmt.query_row([id.to_string()], map_contact).optional())
        .map_err(store_err)
}

pub fn contact_by_owner_peer(
    conn: &Connection,
    owner_id: Uuid,
    peer_id: Uuid,
) -> Result<Option<ContactRow>, Error> {
    conn.prepare(&format!(
        "{CONTACT_SELECT} WHERE c.owner_id = ?1 AND c.peer_id = ?2"
    ))
    .and_then(|mut stmt| {
        stmt.query_row([owner_id.to_string(), peer_id.to_string()], map_contact)
            .optional()
    })
    .map_err(store_err)
}

/// Existence in either direction: the unordered duplicate check.
pub fn contact_exists_between(conn: &Connection, a: Uuid, b: Uuid) -> Result<bool, Error> {
    exists(
        conn,
        "SELECT 1 FROM contacts
         WHERE (owner_id = ?1 AND peer_id = ?2) OR (owner_id = ?2 AND peer_id = ?1)",
        params![a.to_string(), b.to_string()],
    )
}

pub fn contacts_by_owner(conn: &Connection, owner_id: Uuid) -> Result<Vec<ContactRow>, Error> {
    let mut stmt = conn
        .prepare(&format!(
            "{CONTACT_SELECT} WHERE c.owner_id = ?1 ORDER BY peer.username ASC"
        ))
        .map_err(store_err)?;
    let rows = stmt
        .query_map([owner_id.to_string()], map_contact)
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(store_err)?;
    Ok(rows)
}

pub fn delete_contact(conn: &Connection, id: Uuid) -> Result<(), Error> {
    conn.execute("DELETE FROM contacts WHERE id = ?1", [id.to_string()])
        .map_err(store_err)?;
    Ok(())
}

pub fn contact_exists(conn: &Connection, id: Uuid) -> Result<bool, Error> {
    exists(
        conn,
        "SELECT 1 FROM contacts WHERE id = ?1",
        [id.to_string()],
    )
}

pub fn delete_contacts_of_user(conn: &Connection, user_id: Uuid) -> Result<(), Error> {
    conn.execute(
        "DELETE FROM contacts WHERE owner_id = ?1 OR peer_id = ?1",
        [user_id.to_string()],
    )
    .map_err(store_err)?;
    Ok(())
}

const CONTACT_SELECT: &str = "SELECT c.id, c.owner_id, owner.username, c.peer_id, peer.username
     FROM contacts c
     JOIN users owner ON owner.id = c.owner_id
     JOIN users peer  ON peer.id = c.peer_id";

fn map_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContactRow> {
    Ok(ContactRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        owner_username: row.get(2)?,
        peer_id: row.get(3)?,
        peer_username: row.get(4)?,
    })
}

// -- Requests --

pub fn insert_request(
    conn: &Connection,
    id: Uuid,
    from_id: Uuid,
    to_id: Uuid,
    pair_key: &str,
) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO requests (id, from_id, to_id, pair_key) VALUES (?1, ?2, ?3, ?4)",
        params![
            id.to_string(),
            from_id.to_string(),
            to_id.to_string(),
            pair_key
        ],
    )
    .map_err(store_err)?;
    Ok(())
}

pub fn request_by_id(conn: &Connection, id: Uuid) -> Result<Option<RequestRow>, Error> {
    conn.prepare(&format!("{REQUEST_SELECT} WHERE r.id = ?1"))
        .and_then(|mut stmt| stmt.query_row([id.to_string()], map_request).optional())
        .map_err(store_err)
}

pub fn request_exists_by_pair(conn: &Connection, pair_key: &str) -> Result<bool, Error> {
    exists(
        conn,
        "SELECT 1 FROM requests WHERE pair_key = ?1",
        [pair_key],
    )
}

pub fn requests_from(conn: &Connection, user_id: Uuid) -> Result<Vec<RequestRow>, Error> {
    let mut stmt = conn
        .prepare(&format!(
            "{REQUEST_SELECT} WHERE r.from_id = ?1 ORDER BY r.created_at DESC"
        ))
        .map_err(store_err)?;
    let rows = stmt
        .query_map([user_id.to_string()], map_request)
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(store_err)?;
    Ok(rows)
}

pub fn requests_to(conn: &Connection, user_id: Uuid) -> Result<Vec<RequestRow>, Error> {
    let mut stmt = conn
        .prepare(&format!(
            "{REQUEST_SELECT} WHERE r.to_id = ?1 ORDER BY r.created_at DESC"
        ))
        .map_err(store_err)?;
    let rows = stmt
        .query_map([user_id.to_string()], map_request)
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(store_err)?;
    Ok(rows)
}

pub fn delete_request(conn: &Connection, id: Uuid) -> Result<(), Error> {
    conn.execute("DELETE FROM requests WHERE id = ?1", [id.to_string()])
        .map_err(store_err)?;
    Ok(())
}

pub fn request_exists(conn: &Connection, id: Uuid) -> Result<bool, Error> {
    exists(
        conn,
        "SELECT 1 FROM requests WHERE id = ?1",
        [id.to_string()],
    )
}

pub fn delete_requests_of_user(conn: &Connection, user_id: Uuid) -> Result<(), Error> {
    conn.execute(
        "DELETE FROM requests WHERE from_id = ?1 OR to_id = ?1",
        [user_id.to_string()],
    )
    .map_err(store_err)?;
    Ok(())
}

const REQUEST_SELECT: &str = "SELECT r.id, r.from_id, f.username, r.to_id, t.username
     FROM requests r
     JOIN users f ON f.id = r.from_id
     JOIN users t ON t.id = r.to_id";

fn map_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get(0)?,
        from_id: row.get(1)?,
        from_username: row.get(2)?,
        to_id: row.get(3)?,
        to_username: row.get(4)?,
    })
}

fn exists<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<bool, Error> {
    conn.query_row(sql, params, |_| Ok(()))
        .optional()
        .map(|row| row.is_some())
        .map_err(store_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use banter_types::error::ErrorKind;
    use banter_types::models::pair_key;

    fn seed_user(db: &Database, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.with_conn(|conn| {
            insert_user(conn, id, username, &format!("{username}@example.com"), "hash")
        })
        .unwrap();
        id
    }

    #[test]
    fn duplicate_username_is_a_conflict() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "alice");
        let err = db
            .with_conn(|conn| insert_user(conn, Uuid::new_v4(), "alice", "other@example.com", "h"))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[test]
    fn chat_pair_key_constraint_blocks_second_chat() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "alice");
        let b = seed_user(&db, "bob");
        let key = pair_key(a, b);

        db.with_conn(|conn| insert_chat(conn, Uuid::new_v4(), &key))
            .unwrap();
        let err = db
            .with_conn(|conn| insert_chat(conn, Uuid::new_v4(), &key))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[test]
    fn chats_by_user_names_the_other_participant() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "alice");
        let b = seed_user(&db, "bob");
        let chat_id = Uuid::new_v4();

        db.with_conn(|conn| {
            insert_chat(conn, chat_id, &pair_key(a, b))?;
            insert_chat_member(conn, Uuid::new_v4(), chat_id, a)?;
            insert_chat_member(conn, Uuid::new_v4(), chat_id, b)
        })
        .unwrap();

        let for_alice = db.with_conn(|conn| chats_by_user(conn, a)).unwrap();
        assert_eq!(for_alice.len(), 1);
        assert_eq!(for_alice[0].name, "bob");

        let for_bob = db.with_conn(|conn| chats_by_user(conn, b)).unwrap();
        assert_eq!(for_bob[0].name, "alice");
    }

    #[test]
    fn contact_exists_between_is_direction_blind() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "alice");
        let b = seed_user(&db, "bob");

        db.with_conn(|conn| insert_contact(conn, Uuid::new_v4(), a, b))
            .unwrap();

        assert!(db.with_conn(|conn| contact_exists_between(conn, a, b)).unwrap());
        assert!(db.with_conn(|conn| contact_exists_between(conn, b, a)).unwrap());
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "alice");
        let b = seed_user(&db, "bob");
        let chat_id = Uuid::new_v4();

        let result: Result<(), Error> = db.transaction(|conn| {
            insert_chat(conn, chat_id, &pair_key(a, b))?;
            Err(Error::operation_failed(
                banter_types::error::Entity::Chat,
                "forced rollback",
            ))
        });
        assert!(result.is_err());

        assert!(!db.with_conn(|conn| chat_exists(conn, chat_id)).unwrap());
    }

    #[test]
    fn search_users_matches_substrings_case_insensitively() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "alice");
        seed_user(&db, "alicia");
        seed_user(&db, "bob");

        let hits = db.with_conn(|conn| search_users(conn, "ALI", "")).unwrap();
        assert_eq!(hits.len(), 2);

        let all = db.with_conn(|conn| search_users(conn, "", "")).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].username, "alice");
    }
}
