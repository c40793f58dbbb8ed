use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

/// Every failure the session protocol and the authorization gate can surface.
///
/// Messages are deliberately generic: the body never says which credential
/// factor was wrong or why a token was refused.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    AlreadyExists,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("refresh token is no longer valid")]
    TokenReuseDetected,

    #[error("authentication required")]
    Unauthorized,

    #[error("insufficient permissions")]
    Forbidden,

    #[error("user not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials
            | Self::InvalidToken
            | Self::TokenReuseDetected
            | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::AlreadyExists => StatusCode::CONFLICT,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Body parse failures keep serde's detail out of the response.
impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(reason = %rejection.body_text(), "request body rejected");
        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => "expected a JSON request body",
            JsonRejection::JsonSyntaxError(_) => "malformed JSON request body",
            _ => "invalid request body",
        };
        Self::Validation(message.into())
    }
}

impl From<QueryRejection> for AuthError {
    fn from(rejection: QueryRejection) -> Self {
        debug!(reason = %rejection.body_text(), "query string rejected");
        Self::Validation("invalid query string".into())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            error!(error = ?e, "internal error");
        }
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_their_cause() {
        let err = AuthError::from(anyhow::anyhow!("connection refused on 10.0.0.7"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "internal server error");
    }

    #[test]
    fn token_failures_share_a_status() {
        assert_eq!(AuthError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::TokenReuseDetected.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Forbidden.status(), StatusCode::FORBIDDEN);
    }
}
