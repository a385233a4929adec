pub mod migrations;
pub mod models;
pub mod queries;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use banter_types::error::{Entity, Error, ErrorKind};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database with the full schema applied. Used by tests.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run read-only work against the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&Connection) -> Result<T, Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::operation_failed(Entity::Store, format!("DB lock poisoned: {e}")))?;
        f(&conn)
    }

    /// Run a unit of work atomically: all writes commit together or roll
    /// back together when the closure returns an error.
    pub fn transaction<F, T>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&Connection) -> Result<T, Error>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| Error::operation_failed(Entity::Store, format!("DB lock poisoned: {e}")))?;
        let tx = conn.transaction().map_err(store_err)?;
        let out = f(&tx)?;
        tx.commit().map_err(store_err)?;
        Ok(out)
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<models::UserRow>, Error> {
        self.with_conn(|conn| queries::user_by_username(conn, username))
    }

    pub fn user_by_id(&self, id: uuid::Uuid) -> Result<Option<models::UserRow>, Error> {
        self.with_conn(|conn| queries::user_by_id(conn, id))
    }

    pub fn is_chat_member(&self, user_id: uuid::Uuid, chat_id: uuid::Uuid) -> Result<bool, Error> {
        self.with_conn(|conn| queries::is_chat_member(conn, user_id, chat_id))
    }
}

/// Map a SQLite failure onto the shared error type. A uniqueness violation
/// is the store's authoritative duplicate check firing underneath the
/// optimistic one, so it surfaces as a conflict rather than a 500.
pub fn store_err(e: rusqlite::Error) -> Error {
    let kind = match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            ErrorKind::Conflict
        }
        _ => ErrorKind::OperationFailed,
    };
    Error::new(kind, Entity::Store, e.to_string())
}
