use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use banter_types::error::{Entity, Error, ErrorKind};

/// Wraps the shared error type so it can cross the HTTP boundary. This is
/// the single place where error kinds turn into status codes.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorKind,
    entity: Entity,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::AccessDenied => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::OperationFailed => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // A failed post-condition means the optimistic check and the
        // store constraint disagreed; that is a data-integrity signal,
        // not just a failed request.
        if self.0.kind == ErrorKind::OperationFailed {
            error!("operation failed on {}: {}", self.0.entity, self.0.message);
        }

        let body = ErrorBody {
            error: self.0.kind,
            entity: self.0.entity,
            message: self.0.message,
        };
        (status, Json(body)).into_response()
    }
}
