//! Error types for the web API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use seedkeeper_core::CoreError;
use thiserror::Error;

use crate::auth::AuthError;

#[derive(Error, Debug, Clone)]
pub enum WebError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::Forbidden(_) => StatusCode::FORBIDDEN,
            WebError::Conflict(_) => StatusCode::CONFLICT,
            WebError::Engine(_) => StatusCode::BAD_GATEWAY,
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Auth(_) => StatusCode::UNAUTHORIZED,
            WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<CoreError> for WebError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(_) => WebError::NotFound("Torrent not found".to_string()),
            CoreError::AccessDenied { .. } => WebError::Forbidden("Access denied".to_string()),
            CoreError::DuplicateJob(id) => {
                WebError::Conflict(format!("Torrent already added: {}", id))
            }
            CoreError::Engine(msg) => WebError::Engine(msg),
            CoreError::InvalidInput(msg) => WebError::BadRequest(msg),
        }
    }
}

impl From<AuthError> for WebError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::Token(_) => WebError::Auth(err.to_string()),
            AuthError::UserExists(_) => WebError::Conflict(err.to_string()),
            AuthError::InvalidInput(_) => WebError::BadRequest(err.to_string()),
            AuthError::Hash(_) => WebError::Internal(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for WebError {
    fn from(err: anyhow::Error) -> Self {
        WebError::Internal(err.to_string())
    }
}

pub type WebResult<T> = Result<T, WebError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_statuses() {
        let cases = [
            (CoreError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                CoreError::AccessDenied {
                    job_id: "x".into(),
                    username: "bob".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (CoreError::DuplicateJob("x".into()), StatusCode::CONFLICT),
            (CoreError::Engine("boom".into()), StatusCode::BAD_GATEWAY),
            (CoreError::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
        ];
        for (core, status) in cases {
            assert_eq!(WebError::from(core).status(), status);
        }
    }

    #[test]
    fn test_engine_message_is_kept() {
        let err = WebError::from(CoreError::Engine("tracker refused".into()));
        assert_eq!(err.to_string(), "Engine error: tracker refused");
    }
}
