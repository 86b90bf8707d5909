use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

/// Message returned for every failed login, whichever check failed.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials";

#[derive(ThisError, Debug)]
pub enum Error {
    /// Unknown username or wrong password. The two cases are never told apart.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No usable session on a route that needs one
    #[error("Not authenticated")]
    Unauthenticated,

    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// Upstream data API failed or is unreachable. `message` is shown to the client.
    #[error("Backend request failed: {message}")]
    BadGateway { message: String },

    /// Invalid or missing configuration; fatal at startup
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials | Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            Error::Config { .. } | Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidCredentials => INVALID_CREDENTIALS_MESSAGE.to_string(),
            Error::Unauthenticated => "Authentication required".to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::BadGateway { message } => message.clone(),
            Error::Config { .. } | Error::Internal { .. } => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Config { .. } | Error::Internal { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::BadGateway { .. } => {
                tracing::warn!("Upstream error: {}", self);
            }
            Error::InvalidCredentials | Error::Unauthenticated => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = json!({ "ok": false, "error": self.user_message() });
        (status, Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = Error::Internal {
            operation: "read secret from /etc/paydash".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "Internal server error");
    }

    #[test]
    fn test_credential_failure_message_is_generic() {
        assert_eq!(Error::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::InvalidCredentials.user_message(), "Invalid credentials");
    }

    #[tokio::test]
    async fn test_error_response_body_shape() {
        let response = Error::BadGateway {
            message: "Backend not configured".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "ok": false, "error": "Backend not configured" }));
    }
}
