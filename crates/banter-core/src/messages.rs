use chrono::Utc;
use uuid::Uuid;

use banter_db::{Database, queries};
use banter_types::error::{Entity, Error, Result};
use banter_types::models::{MessageView, Principal};

use crate::fanout::Fanout;
use crate::views::message_view;

pub fn messages_for_chat(db: &Database, actor: &Principal, chat_id: Uuid) -> Result<Vec<MessageView>> {
    let rows = db.with_conn(|conn| {
        require_membership(conn, actor, chat_id)?;
        queries::messages_by_chat(conn, chat_id)
    })?;
    Ok(rows.iter().map(message_view).collect())
}

pub fn create_message(
    db: &Database,
    fanout: &Fanout,
    actor: &Principal,
    chat_id: Uuid,
    text: &str,
) -> Result<MessageView> {
    let row = db.transaction(|conn| {
        require_membership(conn, actor, chat_id)?;

        let message_id = Uuid::new_v4();
        queries::insert_message(
            conn,
            message_id,
            chat_id,
            actor.id,
            text,
            &Utc::now().to_rfc3339(),
        )?;

        if !queries::message_exists(conn, message_id)? {
            return Err(Error::operation_failed(
                Entity::Message,
                "message not found after creation",
            ));
        }

        queries::message_by_id(conn, message_id)?.ok_or_else(|| {
            Error::operation_failed(Entity::Message, "message not readable after creation")
        })
    })?;

    let view = message_view(&row);
    fanout.message_created(view.clone());
    Ok(view)
}

pub fn update_message(
    db: &Database,
    fanout: &Fanout,
    actor: &Principal,
    chat_id: Uuid,
    message_id: Uuid,
    text: &str,
) -> Result<MessageView> {
    let row = db.transaction(|conn| {
        require_membership(conn, actor, chat_id)?;
        require_own_message(conn, actor, chat_id, message_id)?;

        queries::update_message_text(conn, message_id, text)?;

        queries::message_by_id(conn, message_id)?.ok_or_else(|| {
            Error::operation_failed(Entity::Message, "message not found after update")
        })
    })?;

    let view = message_view(&row);
    fanout.message_updated(view.clone());
    Ok(view)
}

pub fn delete_message(
    db: &Database,
    fanout: &Fanout,
    actor: &Principal,
    chat_id: Uuid,
    message_id: Uuid,
) -> Result<MessageView> {
    let row = db.transaction(|conn| {
        require_membership(conn, actor, chat_id)?;
        let message = require_own_message(conn, actor, chat_id, message_id)?;

        queries::delete_message(conn, message_id)?;
        if queries::message_exists(conn, message_id)? {
            return Err(Error::operation_failed(
                Entity::Message,
                "message still exists after deletion",
            ));
        }
        Ok(message)
    })?;

    let view = message_view(&row);
    fanout.message_deleted(view.clone());
    Ok(view)
}

fn require_membership(
    conn: &rusqlite::Connection,
    actor: &Principal,
    chat_id: Uuid,
) -> Result<()> {
    if !queries::chat_exists(conn, chat_id)? {
        return Err(Error::not_found(Entity::Chat, "chat not found"));
    }
    if !queries::is_chat_member(conn, actor.id, chat_id)? {
        return Err(Error::access_denied(
            Entity::Chat,
            "you are not a member of this chat",
        ));
    }
    Ok(())
}

/// Messages are owned exclusively by their author for edit and delete.
fn require_own_message(
    conn: &rusqlite::Connection,
    actor: &Principal,
    chat_id: Uuid,
    message_id: Uuid,
) -> Result<banter_db::models::MessageRow> {
    let message = queries::message_by_id(conn, message_id)?
        .ok_or_else(|| Error::not_found(Entity::Message, "message not found"))?;

    if message.chat_id != chat_id.to_string() {
        return Err(Error::not_found(Entity::Message, "message not found"));
    }
    if message.author_id != actor.id.to_string() {
        return Err(Error::access_denied(
            Entity::Message,
            "cannot modify others' messages",
        ));
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chats::create_chat;
    use crate::testutil::{listener, seed_principal, test_env};
    use banter_types::error::ErrorKind;
    use banter_types::events::{RelationEvent, ServerFrame};
    use banter_types::topics::Topic;

    #[test]
    fn non_members_cannot_read_or_post() {
        let (db, fanout, _) = test_env();
        let alice = seed_principal(&db, "alice");
        let bob = seed_principal(&db, "bob");
        let mallory = seed_principal(&db, "mallory");

        let chat = create_chat(&db, &fanout, &alice, bob.id).unwrap();

        let err = messages_for_chat(&db, &mallory, chat.id).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AccessDenied);
        let err = create_message(&db, &fanout, &mallory, chat.id, "hi").unwrap_err();
        assert_eq!(err.kind, ErrorKind::AccessDenied);
    }

    #[test]
    fn messages_are_ordered_and_scoped_to_their_chat() {
        let (db, fanout, _) = test_env();
        let alice = seed_principal(&db, "alice");
        let bob = seed_principal(&db, "bob");

        let chat = create_chat(&db, &fanout, &alice, bob.id).unwrap();
        create_message(&db, &fanout, &alice, chat.id, "first").unwrap();
        create_message(&db, &fanout, &bob, chat.id, "second").unwrap();

        let messages = messages_for_chat(&db, &alice, chat.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "first");
        assert_eq!(messages[0].author_username, "alice");
        assert_eq!(messages[1].author_username, "bob");
    }

    #[test]
    fn only_the_author_may_edit_or_delete() {
        let (db, fanout, _) = test_env();
        let alice = seed_principal(&db, "alice");
        let bob = seed_principal(&db, "bob");

        let chat = create_chat(&db, &fanout, &alice, bob.id).unwrap();
        let message = create_message(&db, &fanout, &alice, chat.id, "hi").unwrap();

        let err = update_message(&db, &fanout, &bob, chat.id, message.id, "edited").unwrap_err();
        assert_eq!(err.kind, ErrorKind::AccessDenied);
        let err = delete_message(&db, &fanout, &bob, chat.id, message.id).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AccessDenied);

        let updated = update_message(&db, &fanout, &alice, chat.id, message.id, "edited").unwrap();
        assert_eq!(updated.text, "edited");

        delete_message(&db, &fanout, &alice, chat.id, message.id).unwrap();
        assert!(messages_for_chat(&db, &alice, chat.id).unwrap().is_empty());
    }

    #[test]
    fn message_mutations_fan_out_to_the_chat_topic() {
        let (db, fanout, dispatcher) = test_env();
        let alice = seed_principal(&db, "alice");
        let bob = seed_principal(&db, "bob");

        let chat = create_chat(&db, &fanout, &alice, bob.id).unwrap();
        let mut rx = listener(&dispatcher, &[Topic::ChatMessages(chat.id)]);

        let message = create_message(&db, &fanout, &alice, chat.id, "hi").unwrap();
        update_message(&db, &fanout, &alice, chat.id, message.id, "hi!").unwrap();
        delete_message(&db, &fanout, &alice, chat.id, message.id).unwrap();

        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerFrame::Event {
                event: RelationEvent::MessageCreated { .. },
                ..
            }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerFrame::Event {
                event: RelationEvent::MessageUpdated { .. },
                ..
            }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerFrame::Event {
                event: RelationEvent::MessageDeleted { .. },
                ..
            }
        ));
    }

    #[test]
    fn message_in_another_chat_is_not_found_via_the_wrong_chat_id() {
        let (db, fanout, _) = test_env();
        let alice = seed_principal(&db, "alice");
        let bob = seed_principal(&db, "bob");
        let carol = seed_principal(&db, "carol");

        let chat_ab = create_chat(&db, &fanout, &alice, bob.id).unwrap();
        let chat_ac = create_chat(&db, &fanout, &alice, carol.id).unwrap();
        let message = create_message(&db, &fanout, &alice, chat_ab.id, "hi").unwrap();

        let err =
            update_message(&db, &fanout, &alice, chat_ac.id, message.id, "oops").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
