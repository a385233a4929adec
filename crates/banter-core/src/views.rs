use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use banter_db::models::{ContactRow, MessageRow, RequestRow};
use banter_types::models::{ContactView, MessageView, RequestView};

/// Ids are written as canonical UUID strings by this crate; a parse
/// failure here means the row was corrupted outside of it.
pub(crate) fn parse_id(field: &str, value: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {field} '{value}': {e}");
        Uuid::default()
    })
}

pub(crate) fn contact_view(row: &ContactRow) -> ContactView {
    ContactView {
        id: parse_id("contact id", &row.id),
        owner_user_id: parse_id("owner_id", &row.owner_id),
        owner_username: row.owner_username.clone(),
        peer_user_id: parse_id("peer_id", &row.peer_id),
        peer_username: row.peer_username.clone(),
    }
}

pub(crate) fn request_view(row: &RequestRow) -> RequestView {
    RequestView {
        id: parse_id("request id", &row.id),
        from_user_id: parse_id("from_id", &row.from_id),
        from_username: row.from_username.clone(),
        to_user_id: parse_id("to_id", &row.to_id),
        to_username: row.to_username.clone(),
    }
}

pub(crate) fn message_view(row: &MessageRow) -> MessageView {
    MessageView {
        id: parse_id("message id", &row.id),
        chat_id: parse_id("chat_id", &row.chat_id),
        author_id: parse_id("author_id", &row.author_id),
        author_username: row.author_username.clone(),
        text: row.text.clone(),
        created_at: row
            .created_at
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|e| {
                warn!(
                    "Corrupt created_at '{}' on message '{}': {}",
                    row.created_at, row.id, e
                );
                DateTime::default()
            }),
    }
}
