use uuid::Uuid;

use banter_db::{Database, queries};
use banter_types::error::{Entity, Error, Result};
use banter_types::models::{ChatListView, ChatView, Principal, pair_key};

use crate::fanout::Fanout;
use crate::views::parse_id;

pub fn chats_for(db: &Database, actor: &Principal) -> Result<ChatListView> {
    let chats = db.with_conn(|conn| queries::chats_by_user(conn, actor.id))?;
    Ok(ChatListView {
        username: actor.username.clone(),
        chats: chats
            .iter()
            .map(|chat| ChatView {
                id: parse_id("chat id", &chat.id),
                name: chat.name.clone(),
            })
            .collect(),
    })
}

pub fn chat_by_id(db: &Database, actor: &Principal, chat_id: Uuid) -> Result<ChatView> {
    db.with_conn(|conn| {
        if !queries::chat_exists(conn, chat_id)? {
            return Err(Error::not_found(Entity::Chat, "chat not found"));
        }
        if !queries::is_chat_member(conn, actor.id, chat_id)? {
            return Err(Error::access_denied(
                Entity::Chat,
                "you are not a member of this chat",
            ));
        }
        let name = queries::chat_members(conn, chat_id)?
            .into_iter()
            .find(|member| member.user_id != actor.id.to_string())
            .map(|member| member.username)
            .unwrap_or_default();
        Ok(ChatView { id: chat_id, name })
    })
}

/// Create the unique chat between the actor and another user. The
/// existence check runs on the unordered pair key, and the pair_key
/// UNIQUE constraint catches the race two concurrent creators can win
/// against the check.
pub fn create_chat(
    db: &Database,
    fanout: &Fanout,
    actor: &Principal,
    target_user_id: Uuid,
) -> Result<ChatView> {
    if actor.id == target_user_id {
        return Err(Error::conflict(
            Entity::Chat,
            "cannot create a chat with yourself",
        ));
    }

    let (chat_id, target_username) = db.transaction(|conn| {
        let target = queries::user_by_id(conn, target_user_id)?
            .ok_or_else(|| Error::not_found(Entity::User, "target user not found"))?;

        let key = pair_key(actor.id, target_user_id);
        if queries::chat_exists_by_pair(conn, &key)? {
            return Err(Error::conflict(
                Entity::Chat,
                "chat already exists between these users",
            ));
        }

        let chat_id = Uuid::new_v4();
        queries::insert_chat(conn, chat_id, &key)?;
        queries::insert_chat_member(conn, Uuid::new_v4(), chat_id, actor.id)?;
        queries::insert_chat_member(conn, Uuid::new_v4(), chat_id, target_user_id)?;

        // Re-query to confirm the writes took effect before committing.
        if !queries::chat_exists(conn, chat_id)?
            || !queries::is_chat_member(conn, actor.id, chat_id)?
            || !queries::is_chat_member(conn, target_user_id, chat_id)?
        {
            return Err(Error::operation_failed(
                Entity::Chat,
                "chat members not created",
            ));
        }

        Ok((chat_id, target.username))
    })?;

    let for_actor = ChatView {
        id: chat_id,
        name: target_username.clone(),
    };
    let for_target = ChatView {
        id: chat_id,
        name: actor.username.clone(),
    };
    fanout.chat_created(&actor.username, for_actor.clone());
    fanout.chat_created(&target_username, for_target);

    Ok(for_actor)
}

/// Delete a chat the actor is a member of, cascading messages and
/// membership rows. All prior members are notified afterwards, each with
/// their own view of the chat.
pub fn delete_chat(db: &Database, fanout: &Fanout, actor: &Principal, chat_id: Uuid) -> Result<ChatView> {
    let members = db.transaction(|conn| {
        if !queries::chat_exists(conn, chat_id)? {
            return Err(Error::not_found(Entity::Chat, "chat not found"));
        }
        if !queries::is_chat_member(conn, actor.id, chat_id)? {
            return Err(Error::access_denied(
                Entity::Chat,
                "you are not a member of this chat",
            ));
        }

        let members = queries::chat_members(conn, chat_id)?;

        queries::delete_messages_by_chat(conn, chat_id)?;
        queries::delete_chat_members(conn, chat_id)?;
        queries::delete_chat(conn, chat_id)?;

        if queries::chat_exists(conn, chat_id)?
            || queries::chat_member_count(conn, chat_id)? != 0
            || queries::message_count_by_chat(conn, chat_id)? != 0
        {
            return Err(Error::operation_failed(
                Entity::Chat,
                "chat still present after deletion",
            ));
        }

        Ok(members)
    })?;

    let mut actor_view = ChatView {
        id: chat_id,
        name: String::new(),
    };
    for member in &members {
        let name = members
            .iter()
            .find(|other| other.user_id != member.user_id)
            .map(|other| other.username.clone())
            .unwrap_or_default();
        let view = ChatView { id: chat_id, name };
        if member.user_id == actor.id.to_string() {
            actor_view = view.clone();
        }
        fanout.chat_deleted(&member.username, view);
    }

    Ok(actor_view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{listener, seed_principal, test_env};
    use banter_types::error::ErrorKind;
    use banter_types::events::{RelationEvent, ServerFrame};
    use banter_types::topics::Topic;

    #[test]
    fn create_chat_rejects_self() {
        let (db, fanout, _) = test_env();
        let alice = seed_principal(&db, "alice");

        let err = create_chat(&db, &fanout, &alice, alice.id).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[test]
    fn create_chat_rejects_unknown_target() {
        let (db, fanout, _) = test_env();
        let alice = seed_principal(&db, "alice");

        let err = create_chat(&db, &fanout, &alice, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.entity, Entity::User);
    }

    #[test]
    fn second_chat_for_the_pair_conflicts_in_either_direction() {
        let (db, fanout, _) = test_env();
        let alice = seed_principal(&db, "alice");
        let bob = seed_principal(&db, "bob");

        create_chat(&db, &fanout, &alice, bob.id).unwrap();

        let err = create_chat(&db, &fanout, &alice, bob.id).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        // Swapping direction must not bypass the duplicate check.
        let err = create_chat(&db, &fanout, &bob, alice.id).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[test]
    fn chat_is_named_after_the_other_participant() {
        let (db, fanout, _) = test_env();
        let alice = seed_principal(&db, "alice");
        let bob = seed_principal(&db, "bob");

        let view = create_chat(&db, &fanout, &alice, bob.id).unwrap();
        assert_eq!(view.name, "bob");

        let bob_list = chats_for(&db, &bob).unwrap();
        assert_eq!(bob_list.chats.len(), 1);
        assert_eq!(bob_list.chats[0].name, "alice");

        let fetched = chat_by_id(&db, &bob, view.id).unwrap();
        assert_eq!(fetched.name, "alice");
    }

    #[test]
    fn create_chat_notifies_both_members_with_their_own_view() {
        let (db, fanout, dispatcher) = test_env();
        let alice = seed_principal(&db, "alice");
        let bob = seed_principal(&db, "bob");

        let mut alice_rx = listener(&dispatcher, &[Topic::Chats("alice".into())]);
        let mut bob_rx = listener(&dispatcher, &[Topic::Chats("bob".into())]);

        create_chat(&db, &fanout, &alice, bob.id).unwrap();

        match alice_rx.try_recv().unwrap() {
            ServerFrame::Event {
                event: RelationEvent::ChatCreated { chat },
                ..
            } => assert_eq!(chat.name, "bob"),
            other => panic!("unexpected frame: {other:?}"),
        }
        match bob_rx.try_recv().unwrap() {
            ServerFrame::Event {
                event: RelationEvent::ChatCreated { chat },
                ..
            } => assert_eq!(chat.name, "alice"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn delete_chat_requires_membership() {
        let (db, fanout, _) = test_env();
        let alice = seed_principal(&db, "alice");
        let bob = seed_principal(&db, "bob");
        let mallory = seed_principal(&db, "mallory");

        let chat = create_chat(&db, &fanout, &alice, bob.id).unwrap();

        let err = delete_chat(&db, &fanout, &mallory, chat.id).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AccessDenied);
    }

    #[test]
    fn delete_chat_cascades_and_notifies_prior_members() {
        let (db, fanout, dispatcher) = test_env();
        let alice = seed_principal(&db, "alice");
        let bob = seed_principal(&db, "bob");

        let chat = create_chat(&db, &fanout, &alice, bob.id).unwrap();
        for text in ["hi", "hello", "how are you"] {
            crate::messages::create_message(&db, &fanout, &alice, chat.id, text).unwrap();
        }

        let mut bob_rx = listener(&dispatcher, &[Topic::Chats("bob".into())]);

        delete_chat(&db, &fanout, &bob, chat.id).unwrap();

        let err = chat_by_id(&db, &alice, chat.id).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        let remaining = db
            .with_conn(|conn| queries::message_count_by_chat(conn, chat.id))
            .unwrap();
        assert_eq!(remaining, 0);

        match bob_rx.try_recv().unwrap() {
            ServerFrame::Event {
                event: RelationEvent::ChatDeleted { chat },
                ..
            } => assert_eq!(chat.name, "alice"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn concurrent_creates_for_the_same_pair_yield_exactly_one_chat() {
        use std::sync::Arc;

        let (db, fanout, _) = test_env();
        let alice = Arc::new(seed_principal(&db, "alice"));
        let bob = Arc::new(seed_principal(&db, "bob"));

        let mut handles = Vec::new();
        for i in 0..8 {
            let db = db.clone();
            let fanout = fanout.clone();
            let alice = alice.clone();
            let bob = bob.clone();
            handles.push(std::thread::spawn(move || {
                // Half the attempts come from each direction.
                if i % 2 == 0 {
                    create_chat(&db, &fanout, &alice, bob.id).is_ok()
                } else {
                    create_chat(&db, &fanout, &bob, alice.id).is_ok()
                }
            }));
        }

        let successes = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|created| *created)
            .count();
        assert_eq!(successes, 1);

        let list = chats_for(&db, &alice).unwrap();
        assert_eq!(list.chats.len(), 1);
    }
}
