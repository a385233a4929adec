pub mod chats;
pub mod contacts;
pub mod fanout;
pub mod messages;
pub mod requests;
pub mod users;

mod views;

pub use fanout::Fanout;

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use tokio::sync::mpsc;
    use uuid::Uuid;

    use banter_db::{Database, queries};
    use banter_gateway::Dispatcher;
    use banter_types::events::ServerFrame;
    use banter_types::models::Principal;
    use banter_types::topics::Topic;

    use crate::fanout::Fanout;

    pub fn test_env() -> (Arc<Database>, Fanout, Dispatcher) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let dispatcher = Dispatcher::new();
        (db, Fanout::new(dispatcher.clone()), dispatcher)
    }

    pub fn seed_principal(db: &Database, username: &str) -> Principal {
        let id = Uuid::new_v4();
        db.with_conn(|conn| {
            queries::insert_user(conn, id, username, &format!("{username}@example.com"), "hash")
        })
        .unwrap();
        Principal {
            id,
            username: username.to_string(),
            email: format!("{username}@example.com"),
        }
    }

    /// A fake client session subscribed to the given topics.
    pub fn listener(
        dispatcher: &Dispatcher,
        topics: &[Topic],
    ) -> mpsc::UnboundedReceiver<ServerFrame> {
        let (conn_id, rx) = dispatcher.register();
        for topic in topics {
            dispatcher.subscribe(conn_id, topic);
        }
        rx
    }
}
