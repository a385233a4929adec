use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};

use banter_auth::gate::bearer_token;

use crate::AppState;

/// Resolve the bearer token and attach the Principal to the request.
/// Routes behind this layer answer 401 when no principal resolves; the
/// gate itself never errors, it only declines to attach one.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = bearer_token(auth_header)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let gate_state = state.clone();
    let principal = tokio::task::spawn_blocking(move || gate_state.gate.resolve(&token))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
