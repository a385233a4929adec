use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use banter_auth::gate::bearer_token;
use banter_db::queries;
use banter_types::api::{AuthResponse, LoginRequest, RegisterRequest};
use banter_types::models::UserView;

use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if !req.email.contains('@') {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let response = tokio::task::spawn_blocking(move || {
        let taken = state
            .db
            .with_conn(|conn| {
                Ok(queries::user_by_username(conn, &req.username)?.is_some()
                    || queries::user_by_email(conn, &req.email)?.is_some())
            })
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        if taken {
            return Err(StatusCode::CONFLICT);
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .to_string();

        let user_id = Uuid::new_v4();
        state
            .db
            .with_conn(|conn| {
                queries::insert_user(conn, user_id, &req.username, &req.email, &password_hash)
            })
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let token = state
            .gate
            .issue(&req.username)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        Ok(AuthResponse {
            token,
            user: UserView {
                id: user_id,
                username: req.username,
                email: req.email,
            },
        })
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let response = tokio::task::spawn_blocking(move || {
        let user = state
            .db
            .user_by_username(&req.username)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        // Verify password
        let parsed_hash =
            PasswordHash::new(&user.password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        let user_id: Uuid = user
            .id
            .parse()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let token = state
            .gate
            .issue(&user.username)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        Ok::<_, StatusCode>(AuthResponse {
            token,
            user: UserView {
                id: user_id,
                username: user.username,
                email: user.email,
            },
        })
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    Ok(Json(response))
}

/// Drop the presented token from the validation cache so it stops
/// resolving before its TTL runs out.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    state.gate.invalidate_token(token);
    Ok(StatusCode::NO_CONTENT)
}
