use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use banter_core::chats;
use banter_types::api::CreateChatRequest;
use banter_types::models::Principal;

use crate::error::ApiError;
use crate::{AppState, blocking};

pub async fn get_chats(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let list = blocking(move || chats::chats_for(&state.db, &principal)).await?;
    Ok(Json(list))
}

pub async fn get_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let chat = blocking(move || chats::chat_by_id(&state.db, &principal, chat_id)).await?;
    Ok(Json(chat))
}

pub async fn create_chat(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let chat = blocking(move || {
        chats::create_chat(&state.db, &state.fanout, &principal, req.user_id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

pub async fn delete_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let chat = blocking(move || {
        chats::delete_chat(&state.db, &state.fanout, &principal, chat_id)
    })
    .await?;
    Ok(Json(chat))
}
