use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use banter_core::contacts;
use banter_types::models::Principal;

use crate::error::ApiError;
use crate::{AppState, blocking};

pub async fn get_contacts(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let list = blocking(move || contacts::contacts_for(&state.db, &principal)).await?;
    Ok(Json(list))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(move || {
        contacts::delete_contact(&state.db, &state.fanout, &principal, contact_id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
