use banter_db::{Database, queries};
use banter_types::error::{Entity, Error, Result};
use banter_types::models::{Principal, UserView};

use crate::views::parse_id;

/// Directory search by username/email substring; blank filters list
/// everyone, ordered by username.
pub fn search(db: &Database, username: &str, email: &str) -> Result<Vec<UserView>> {
    let rows = db.with_conn(|conn| queries::search_users(conn, username, email))?;
    Ok(rows
        .iter()
        .map(|row| UserView {
            id: parse_id("user id", &row.id),
            username: row.username.clone(),
            email: row.email.clone(),
        })
        .collect())
}

/// Remove the actor's account and everything hanging off it: chats (with
/// their messages and memberships), contacts in both directions, and
/// requests in either direction, all in one unit of work.
pub fn delete_account(db: &Database, actor: &Principal) -> Result<()> {
    db.transaction(|conn| {
        if !queries::user_exists(conn, actor.id)? {
            return Err(Error::not_found(Entity::User, "current user not found"));
        }

        for chat_id in queries::chat_ids_by_user(conn, actor.id)? {
            let chat_id = parse_id("chat_id", &chat_id);
            queries::delete_messages_by_chat(conn, chat_id)?;
            queries::delete_chat_members(conn, chat_id)?;
            queries::delete_chat(conn, chat_id)?;
        }

        queries::delete_contacts_of_user(conn, actor.id)?;
        queries::delete_requests_of_user(conn, actor.id)?;
        queries::delete_user(conn, actor.id)?;

        if queries::user_exists(conn, actor.id)? {
            return Err(Error::operation_failed(
                Entity::User,
                "user still exists after deletion",
            ));
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chats::{chats_for, create_chat};
    use crate::contacts::contacts_for;
    use crate::messages::create_message;
    use crate::requests::{approve_request, create_request};
    use crate::testutil::{seed_principal, test_env};

    #[test]
    fn search_filters_by_substring() {
        let (db, _, _) = test_env();
        seed_principal(&db, "alice");
        seed_principal(&db, "alicia");
        seed_principal(&db, "bob");

        let hits = search(&db, "ali", "").unwrap();
        assert_eq!(hits.len(), 2);
        let all = search(&db, "", "").unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn delete_account_cascades_relationships() {
        let (db, fanout, _) = test_env();
        let alice = seed_principal(&db, "alice");
        let bob = seed_principal(&db, "bob");
        let carol = seed_principal(&db, "carol");

        // alice <-> bob are contacts with a chat; carol has a pending
        // request to alice.
        let request = create_request(&db, &fanout, &alice, bob.id).unwrap();
        approve_request(&db, &fanout, &bob, request.id).unwrap();
        let chat = create_chat(&db, &fanout, &alice, bob.id).unwrap();
        create_message(&db, &fanout, &alice, chat.id, "hi").unwrap();
        create_request(&db, &fanout, &carol, alice.id).unwrap();

        delete_account(&db, &alice).unwrap();

        assert!(search(&db, "alice", "").unwrap().is_empty());
        assert!(chats_for(&db, &bob).unwrap().chats.is_empty());
        assert!(contacts_for(&db, &bob).unwrap().is_empty());
        assert!(
            crate::requests::sent_requests(&db, &carol)
                .unwrap()
                .is_empty()
        );

        // bob can start over with a fresh request to carol.
        create_request(&db, &fanout, &bob, carol.id).unwrap();
    }
}
