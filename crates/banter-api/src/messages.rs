use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use banter_core::messages;
use banter_types::api::{CreateMessageRequest, UpdateMessageRequest};
use banter_types::models::Principal;

use crate::error::ApiError;
use crate::{AppState, blocking};

pub async fn get_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let list =
        blocking(move || messages::messages_for_chat(&state.db, &principal, chat_id)).await?;
    Ok(Json(list))
}

pub async fn create_message(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = blocking(move || {
        messages::create_message(&state.db, &state.fanout, &principal, chat_id, &req.text)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn update_message(
    State(state): State<AppState>,
    Path((chat_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<UpdateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = blocking(move || {
        messages::update_message(
            &state.db,
            &state.fanout,
            &principal,
            chat_id,
            message_id,
            &req.text,
        )
    })
    .await?;
    Ok(Json(message))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path((chat_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let message = blocking(move || {
        messages::delete_message(&state.db, &state.fanout, &principal, chat_id, message_id)
    })
    .await?;
    Ok(Json(message))
}
