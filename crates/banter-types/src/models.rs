use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The resolved identity of the caller, attached to a request or WebSocket
/// session by the auth middleware. Immutable for the duration of the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// Canonical unordered key for a pair of users. Duplicate checks for chats,
/// contacts and requests always go through this key so that swapping the
/// direction of a call cannot bypass them.
pub fn pair_key(a: Uuid, b: Uuid) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}|{hi}")
}

// -- Views --
// Per-viewer projections of the stored entities. Rows hold ids plus the
// usernames denormalised out of JOINs; nothing keeps a live back-reference.

/// A chat as one member sees it: the display name is the *other*
/// participant's username, computed per viewer and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatView {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatListView {
    pub username: String,
    pub chats: Vec<ChatView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactView {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub owner_username: String,
    pub peer_user_id: Uuid,
    pub peer_username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestView {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub from_username: String,
    pub to_user_id: Uuid,
    pub to_username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_ignores_direction() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(pair_key(a, b), pair_key(b, a));
    }

    #[test]
    fn pair_key_orders_low_first() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let key = pair_key(a, b);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        assert_eq!(key, format!("{lo}|{hi}"));
    }
}
