use axum::{
    Json,
    http::{StatusCode, header::InvalidHeaderValue},
    response::IntoResponse,
};
use mongodb::error::Error as MongoError;
use serde::Serialize;
use thiserror::Error as ThisError;

/// Why the database refused a connection. Only used to pick a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    Authentication,
    Connectivity,
}

impl RejectionKind {
    /// Atlas reports bad credentials as either "authentication failed" or "bad auth".
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("authentication failed") || lowered.contains("bad auth") {
            Self::Authentication
        } else {
            Self::Connectivity
        }
    }
}

#[derive(Debug, ThisError)]
pub enum AppError {
    #[error("database connection rejected ({kind:?}): {detail}")]
    ConnectionRejected { kind: RejectionKind, detail: String },

    #[error("session store creation failed: {0}")]
    SessionStoreCreationFailed(String),

    #[error("fatal startup: {0}")]
    FatalStartup(&'static str),

    #[error("session store operation failed: {0}")]
    SessionPersistFailed(String),

    #[error("routes have already been registered")]
    RoutesAlreadyRegistered,

    #[error("no session attached to request; session middleware missing")]
    SessionMissing,

    #[error("user already exists")]
    UserExists,

    #[error("Database error: {0}")]
    Database(#[from] MongoError),

    #[error("password hashing error: {0}")]
    PasswordHash(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),

    #[error("handler panicked: {0}")]
    Panic(String),
}

impl AppError {
    /// Stable machine-readable kind reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ConnectionRejected { .. } => "CONNECTION_REJECTED",
            AppError::SessionStoreCreationFailed(_) => "SESSION_STORE_UNAVAILABLE",
            AppError::FatalStartup(_) => "FATAL_STARTUP",
            AppError::SessionPersistFailed(_) => "SESSION_PERSIST_FAILED",
            AppError::RoutesAlreadyRegistered => "ROUTES_ALREADY_REGISTERED",
            AppError::SessionMissing => "SESSION_MISSING",
            AppError::UserExists => "USER_EXISTS",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::PasswordHash(_) => "PASSWORD_HASH_ERROR",
            AppError::Json(_) => "SERIALIZATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::InvalidHeader(_) => "INVALID_HEADER",
            AppError::Panic(_) => "HANDLER_PANIC",
        }
    }

    pub fn fault(&self) -> HandlerFault {
        HandlerFault {
            kind: self.kind(),
            detail: self.to_string(),
        }
    }
}

/// Marker left in the response extensions of a failed handler.
/// The fault boundary reads it to render the final body.
#[derive(Debug, Clone)]
pub struct HandlerFault {
    pub kind: &'static str,
    pub detail: String,
}

impl HandlerFault {
    pub fn into_response_with(self, include_detail: bool) -> axum::response::Response {
        let body = ApiErrorResponse {
            error: "Internal Server Error",
            kind: self.kind,
            message: include_detail.then(|| self.detail.clone()),
        };
        let mut resp = (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
        resp.extensions_mut().insert(self);
        resp
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // Detail is added later by the fault boundary when not in production.
        self.fault().into_response_with(false)
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: &'static str,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_detects_auth_failures_case_insensitively() {
        assert_eq!(
            RejectionKind::classify("bad auth : Authentication failed."),
            RejectionKind::Authentication
        );
        assert_eq!(
            RejectionKind::classify("SCRAM failure: AUTHENTICATION FAILED"),
            RejectionKind::Authentication
        );
        assert_eq!(
            RejectionKind::classify("Server selection timeout: No available servers"),
            RejectionKind::Connectivity
        );
    }
}
