use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use banter_core::requests;
use banter_types::models::Principal;

use crate::error::ApiError;
use crate::{AppState, blocking};

pub async fn sent_requests(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let list = blocking(move || requests::sent_requests(&state.db, &principal)).await?;
    Ok(Json(list))
}

pub async fn received_requests(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let list = blocking(move || requests::received_requests(&state.db, &principal)).await?;
    Ok(Json(list))
}

pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let request =
        blocking(move || requests::request_by_id(&state.db, &principal, request_id)).await?;
    Ok(Json(request))
}

pub async fn create_request(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let request = blocking(move || {
        requests::create_request(&state.db, &state.fanout, &principal, user_id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn approve_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let contact = blocking(move || {
        requests::approve_request(&state.db, &state.fanout, &principal, request_id)
    })
    .await?;
    Ok(Json(contact))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(move || {
        requests::reject_request(&state.db, &state.fanout, &principal, request_id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(move || {
        requests::delete_own_request(&state.db, &state.fanout, &principal, request_id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
