use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use banter_core::users;
use banter_db::queries;
use banter_types::api::{AuthResponse, DeleteUserRequest, FindUserQuery, UpdateUserRequest};
use banter_types::error::{Entity, Error};
use banter_types::models::{Principal, UserView};

use crate::error::ApiError;
use crate::{AppState, blocking};

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<FindUserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let users = blocking(move || {
        users::search(
            &state.db,
            query.username.as_deref().unwrap_or(""),
            query.email.as_deref().unwrap_or(""),
        )
    })
    .await?;
    Ok(Json(users))
}

/// Update the caller's own profile and/or password. A successful change
/// invalidates every cached token for the account and hands back a fresh
/// one, so stale credentials stop resolving immediately.
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id != principal.id {
        return Err(ApiError(Error::access_denied(
            Entity::User,
            "you can only update your own account",
        )));
    }

    let state_bg = state.clone();
    let response = blocking(move || {
        let user = state_bg
            .db
            .user_by_id(principal.id)?
            .ok_or_else(|| Error::not_found(Entity::User, "current user not found"))?;

        verify_password(&req.current_password, &user.password)
            .map_err(|_| Error::access_denied(Entity::User, "current password is incorrect"))?;

        let username = match &req.username {
            Some(username) if !username.is_empty() && *username != user.username => {
                if state_bg.db.with_conn(|conn| {
                    Ok(queries::user_by_username(conn, username)?.is_some())
                })? {
                    return Err(Error::conflict(Entity::User, "username already taken"));
                }
                username.clone()
            }
            _ => user.username.clone(),
        };
        let email = match &req.email {
            Some(email) if !email.is_empty() && *email != user.email => {
                if state_bg
                    .db
                    .with_conn(|conn| Ok(queries::user_by_email(conn, email)?.is_some()))?
                {
                    return Err(Error::conflict(Entity::User, "email already taken"));
                }
                email.clone()
            }
            _ => user.email.clone(),
        };
        let password_hash = match &req.new_password {
            Some(new_password) if !new_password.is_empty() => hash_password(new_password)
                .map_err(|_| Error::operation_failed(Entity::User, "password hashing failed"))?,
            _ => user.password.clone(),
        };

        if username == user.username && email == user.email && password_hash == user.password {
            return Err(Error::conflict(Entity::User, "no fields to update"));
        }

        state_bg.db.with_conn(|conn| {
            queries::update_user(conn, principal.id, &username, &email, &password_hash)
        })?;

        // Credentials changed: every token cached for the old identity is
        // stale now.
        state_bg.gate.invalidate_user(&user.username);

        let token = state_bg
            .gate
            .issue(&username)
            .map_err(|_| Error::operation_failed(Entity::User, "token issue failed"))?;

        Ok(AuthResponse {
            token,
            user: UserView {
                id: principal.id,
                username,
                email,
            },
        })
    })
    .await?;

    Ok(Json(response))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<DeleteUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id != principal.id {
        return Err(ApiError(Error::access_denied(
            Entity::User,
            "you can only delete your own account",
        )));
    }

    blocking(move || {
        let user = state
            .db
            .user_by_id(principal.id)?
            .ok_or_else(|| Error::not_found(Entity::User, "current user not found"))?;

        verify_password(&req.password, &user.password)
            .map_err(|_| Error::access_denied(Entity::User, "wrong password"))?;

        users::delete_account(&state.db, &principal)?;
        state.gate.invalidate_user(&principal.username);
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<(), argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    Argon2::default().verify_password(password.as_bytes(), &parsed)
}
