/// Raw rows as they come out of SQLite. Ids stay TEXT here; parsing to
/// `Uuid` happens where views are built.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

/// A chat as listed for one user: `name` is the other participant's
/// username, resolved in the query.
#[derive(Debug, Clone)]
pub struct ChatSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ChatMemberRow {
    pub id: String,
    pub chat_id: String,
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub chat_id: String,
    pub author_id: String,
    pub author_username: String,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ContactRow {
    pub id: String,
    pub owner_id: String,
    pub owner_username: String,
    pub peer_id: String,
    pub peer_username: String,
}

#[derive(Debug, Clone)]
pub struct RequestRow {
    pub id: String,
    pub from_id: String,
    pub from_username: String,
    pub to_id: String,
    pub to_username: String,
}
