use uuid::Uuid;

use banter_db::{Database, queries};
use banter_types::error::{Entity, Error, Result};
use banter_types::models::{ContactView, Principal, RequestView, pair_key};

use crate::fanout::Fanout;
use crate::views::{contact_view, parse_id, request_view};

pub fn sent_requests(db: &Database, actor: &Principal) -> Result<Vec<RequestView>> {
    let rows = db.with_conn(|conn| queries::requests_from(conn, actor.id))?;
    Ok(rows.iter().map(request_view).collect())
}

pub fn received_requests(db: &Database, actor: &Principal) -> Result<Vec<RequestView>> {
    let rows = db.with_conn(|conn| queries::requests_to(conn, actor.id))?;
    Ok(rows.iter().map(request_view).collect())
}

/// Either party of a request may fetch it; everyone else is denied.
pub fn request_by_id(db: &Database, actor: &Principal, request_id: Uuid) -> Result<RequestView> {
    let row = db
        .with_conn(|conn| queries::request_by_id(conn, request_id))?
        .ok_or_else(|| Error::not_found(Entity::Request, "request not found"))?;

    let actor_id = actor.id.to_string();
    if row.from_id != actor_id && row.to_id != actor_id {
        return Err(Error::access_denied(
            Entity::Request,
            "it is not your request",
        ));
    }
    Ok(request_view(&row))
}

/// Send a contact request. Duplicate checks run on the unordered pair in
/// both the contact and request tables, so neither an existing contact
/// nor a pending request in the opposite direction can be worked around.
pub fn create_request(
    db: &Database,
    fanout: &Fanout,
    actor: &Principal,
    target_user_id: Uuid,
) -> Result<RequestView> {
    if actor.id == target_user_id {
        return Err(Error::conflict(
            Entity::Request,
            "cannot send a contact request to yourself",
        ));
    }

    let row = db.transaction(|conn| {
        if queries::user_by_id(conn, target_user_id)?.is_none() {
            return Err(Error::not_found(Entity::User, "target user not found"));
        }

        if queries::contact_exists_between(conn, actor.id, target_user_id)? {
            return Err(Error::conflict(
                Entity::Contact,
                "contact already exists between these users",
            ));
        }

        let key = pair_key(actor.id, target_user_id);
        if queries::request_exists_by_pair(conn, &key)? {
            return Err(Error::conflict(
                Entity::Request,
                "a request already exists between these users",
            ));
        }

        let request_id = Uuid::new_v4();
        queries::insert_request(conn, request_id, actor.id, target_user_id, &key)?;

        if !queries::request_exists(conn, request_id)? {
            return Err(Error::operation_failed(
                Entity::Request,
                "request not created",
            ));
        }

        queries::request_by_id(conn, request_id)?.ok_or_else(|| {
            Error::operation_failed(Entity::Request, "request not readable after creation")
        })
    })?;

    let view = request_view(&row);
    fanout.request_created(&view);
    Ok(view)
}

/// Approve a pending request: the request row is replaced by a symmetric
/// pair of contact rows in one unit of work. A contact pair that persists
/// while the request deletion fails would be contradictory state, so that
/// path aborts the transaction as an operation failure.
pub fn approve_request(
    db: &Database,
    fanout: &Fanout,
    actor: &Principal,
    request_id: Uuid,
) -> Result<ContactView> {
    let (forward, reverse, request) = db.transaction(|conn| {
        let request = queries::request_by_id(conn, request_id)?
            .ok_or_else(|| Error::not_found(Entity::Request, "request not found"))?;

        if request.to_id != actor.id.to_string() {
            return Err(Error::access_denied(
                Entity::Request,
                "only the recipient may approve a request",
            ));
        }

        let from_id = parse_id("from_id", &request.from_id);
        let to_id = parse_id("to_id", &request.to_id);

        // Race guard: a contact pair may have appeared since the request
        // was created.
        if queries::contact_exists_between(conn, from_id, to_id)? {
            return Err(Error::conflict(
                Entity::Contact,
                "contact already exists between these users",
            ));
        }

        let forward_id = Uuid::new_v4();
        let reverse_id = Uuid::new_v4();
        queries::insert_contact(conn, forward_id, from_id, to_id)?;
        queries::insert_contact(conn, reverse_id, to_id, from_id)?;

        if !queries::contact_exists(conn, forward_id)?
            || !queries::contact_exists(conn, reverse_id)?
        {
            return Err(Error::operation_failed(
                Entity::Contact,
                "contact rows not created",
            ));
        }

        queries::delete_request(conn, request_id)?;
        if queries::request_exists(conn, request_id)? {
            return Err(Error::operation_failed(
                Entity::Request,
                "approved request still present",
            ));
        }

        let forward = queries::contact_by_id(conn, forward_id)?;
        let reverse = queries::contact_by_id(conn, reverse_id)?;
        match (forward, reverse) {
            (Some(forward), Some(reverse)) => Ok((forward, reverse, request)),
            _ => Err(Error::operation_failed(
                Entity::Contact,
                "contact rows not readable after creation",
            )),
        }
    })?;

    let request = request_view(&request);
    let forward = contact_view(&forward);
    let reverse = contact_view(&reverse);

    fanout.contact_created(&forward.owner_username, forward.clone());
    fanout.contact_created(&reverse.owner_username, reverse.clone());
    fanout.request_removed(&request);

    // The actor is the approving recipient; hand back their own row.
    Ok(reverse)
}

/// Reject a request addressed to the actor.
pub fn reject_request(db: &Database, fanout: &Fanout, actor: &Principal, request_id: Uuid) -> Result<()> {
    remove_request(db, fanout, request_id, |request| {
        if request.to_id != actor.id.to_string() {
            return Err(Error::access_denied(
                Entity::Request,
                "it is not your request",
            ));
        }
        Ok(())
    })
}

/// Withdraw a request the actor sent.
pub fn delete_own_request(
    db: &Database,
    fanout: &Fanout,
    actor: &Principal,
    request_id: Uuid,
) -> Result<()> {
    remove_request(db, fanout, request_id, |request| {
        if request.from_id != actor.id.to_string() {
            return Err(Error::access_denied(
                Entity::Request,
                "it is not your user request",
            ));
        }
        Ok(())
    })
}

fn remove_request(
    db: &Database,
    fanout: &Fanout,
    request_id: Uuid,
    check_access: impl FnOnce(&banter_db::models::RequestRow) -> Result<()>,
) -> Result<()> {
    let row = db.transaction(|conn| {
        let request = queries::request_by_id(conn, request_id)?
            .ok_or_else(|| Error::not_found(Entity::Request, "request not found"))?;

        check_access(&request)?;

        queries::delete_request(conn, request_id)?;
        if queries::request_exists(conn, request_id)? {
            return Err(Error::operation_failed(
                Entity::Request,
                "request still present after deletion",
            ));
        }
        Ok(request)
    })?;

    fanout.request_removed(&request_view(&row));
    Ok(())
}
