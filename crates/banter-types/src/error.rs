use serde::Serialize;
use thiserror::Error;

/// What went wrong. Mapped to an HTTP status exactly once, at the API
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Entity absent.
    NotFound,
    /// Actor lacks rights over the entity.
    AccessDenied,
    /// Duplicate or contradictory relationship, or an operation on self.
    Conflict,
    /// A post-condition check failed: the store accepted a write that did
    /// not take effect, or a multi-step operation partially failed.
    OperationFailed,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::AccessDenied => "access denied",
            ErrorKind::Conflict => "conflict",
            ErrorKind::OperationFailed => "operation failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    User,
    Chat,
    Contact,
    Request,
    Message,
    Store,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Entity::User => "user",
            Entity::Chat => "chat",
            Entity::Contact => "contact",
            Entity::Request => "request",
            Entity::Message => "message",
            Entity::Store => "store",
        };
        f.write_str(s)
    }
}

/// The one error type shared by the store and the relationship engine.
#[derive(Debug, Clone, Error)]
#[error("{entity} {kind}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub entity: Entity,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, entity: Entity, message: impl Into<String>) -> Self {
        Self { kind, entity, message: message.into() }
    }

    pub fn not_found(entity: Entity, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, entity, message)
    }

    pub fn access_denied(entity: Entity, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessDenied, entity, message)
    }

    pub fn conflict(entity: Entity, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, entity, message)
    }

    pub fn operation_failed(entity: Entity, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OperationFailed, entity, message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
