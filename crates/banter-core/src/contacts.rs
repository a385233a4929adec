use uuid::Uuid;

use banter_db::{Database, queries};
use banter_types::error::{Entity, Error, Result};
use banter_types::models::{ContactView, Principal};

use crate::fanout::Fanout;
use crate::views::{contact_view, parse_id};

pub fn contacts_for(db: &Database, actor: &Principal) -> Result<Vec<ContactView>> {
    let rows = db.with_conn(|conn| queries::contacts_by_owner(conn, actor.id))?;
    Ok(rows.iter().map(contact_view).collect())
}

/// Delete a contact the actor owns together with its symmetric
/// counterpart. The counterpart may already be missing after a prior
/// partial failure; deletion stays idempotent in that case instead of
/// failing.
pub fn delete_contact(
    db: &Database,
    fanout: &Fanout,
    actor: &Principal,
    contact_id: Uuid,
) -> Result<()> {
    let (forward, reverse) = db.transaction(|conn| {
        let contact = queries::contact_by_id(conn, contact_id)?
            .ok_or_else(|| Error::not_found(Entity::Contact, "contact not found"))?;

        if contact.owner_id != actor.id.to_string() {
            return Err(Error::access_denied(
                Entity::Contact,
                "it is not your contact",
            ));
        }

        let owner_id = parse_id("owner_id", &contact.owner_id);
        let peer_id = parse_id("peer_id", &contact.peer_id);
        let reverse = queries::contact_by_owner_peer(conn, peer_id, owner_id)?;

        queries::delete_contact(conn, contact_id)?;
        if let Some(reverse) = &reverse {
            queries::delete_contact(conn, parse_id("contact id", &reverse.id))?;
        }

        let forward_remains = queries::contact_exists(conn, contact_id)?;
        let reverse_remains = match &reverse {
            Some(reverse) => {
                queries::contact_exists(conn, parse_id("contact id", &reverse.id))?
            }
            None => false,
        };
        if forward_remains || reverse_remains {
            return Err(Error::operation_failed(
                Entity::Contact,
                "failed to delete contact rows",
            ));
        }

        Ok((contact, reverse))
    })?;

    let forward_view = contact_view(&forward);
    // If the counterpart row was already gone, synthesize the peer's view
    // from the forward row; the peer still needs to hear the pair ended.
    let reverse_view = reverse.as_ref().map(contact_view).unwrap_or(ContactView {
        id: forward_view.id,
        owner_user_id: forward_view.peer_user_id,
        owner_username: forward_view.peer_username.clone(),
        peer_user_id: forward_view.owner_user_id,
        peer_username: forward_view.owner_username.clone(),
    });

    fanout.contact_removed(&forward.owner_username, forward_view);
    fanout.contact_removed(&forward.peer_username, reverse_view);

    Ok(())
}
