//! Request-level errors and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    auth::{jwt::TokenError, password::PasswordError},
    response::Envelope,
    users::repo::StoreError,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[allow(dead_code)]
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    ResourceNotFound(String),

    #[error("{message}")]
    Internal { name: String, message: String },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::ResourceNotFound(msg.into())
    }

    pub fn internal(name: impl Into<String>, msg: impl ToString) -> Self {
        Self::Internal {
            name: name.into(),
            message: msg.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error name as it appears in the envelope's `errors` list.
    pub fn name(&self) -> &str {
        match self {
            Self::BadRequest(_) => "BadRequestError",
            Self::Unauthorized(_) => "UnAuthorizedError",
            Self::Forbidden(_) => "ForbiddenError",
            Self::ResourceNotFound(_) => "ResourceNotFoundError",
            Self::Internal { name, .. } => name.as_str(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(name = %self.name(), error = %self, "request failed");
        }
        (status, Json(Envelope::failure(&self))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(field) => {
                Self::BadRequest(format!("A user with this {field} already exists."))
            }
            StoreError::BalanceOutOfRange => Self::BadRequest("Balance out of range".into()),
            StoreError::Database(e) => Self::internal("DatabaseError", e),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(e) => Self::internal("TokenError", e),
            other => {
                tracing::debug!(reason = %other, "token rejected");
                Self::Unauthorized("Authorization failed.".into())
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        Self::internal("PasswordHashError", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_kind() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::internal("DatabaseError", "boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_error_echoes_name_and_message() {
        let err = ApiError::internal("DatabaseError", "connection reset");
        assert_eq!(err.name(), "DatabaseError");
        assert_eq!(err.to_string(), "connection reset");
    }

    #[test]
    fn every_token_rejection_is_the_same_unauthorized() {
        let expired = ApiError::from(TokenError::Expired);
        let invalid = ApiError::from(TokenError::Invalid);
        assert_eq!(expired.to_string(), invalid.to_string());
        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn duplicate_email_is_bad_request() {
        let err = ApiError::from(StoreError::Duplicate("email"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.name(), "BadRequestError");
    }

    #[test]
    fn balance_overflow_is_bad_request() {
        let err = ApiError::from(StoreError::BalanceOutOfRange);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Balance out of range");
    }

    #[test]
    fn unreadable_password_hash_is_internal() {
        let err = ApiError::from(crate::auth::password::verify_password("x", "garbage").unwrap_err());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.name(), "PasswordHashError");
    }
}
