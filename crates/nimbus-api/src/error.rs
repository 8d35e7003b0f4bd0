//! Maps domain `AppError` to OCS failure responses.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use nimbus_auth::challenge;
use nimbus_core::error::{AppError, ErrorKind};

use crate::ocs::Ocs;

/// Realm announced to API clients that did not authenticate.
pub const API_REALM: &str = "Nimbus";

/// An [`AppError`] on its way out of a handler.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub AppError);

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        self.0.kind
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound | ErrorKind::ShareNotFound => StatusCode::NOT_FOUND,
        ErrorKind::Validation
        | ErrorKind::Provider
        | ErrorKind::Backend
        | ErrorKind::IllegalIdChange => StatusCode::BAD_REQUEST,
        ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        ErrorKind::Internal
        | ErrorKind::Database
        | ErrorKind::Configuration
        | ErrorKind::Mail
        | ErrorKind::Registration
        | ErrorKind::Serialization => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind);
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(kind = %self.0.kind, error = %self.0.message, "Internal server error");
            "Internal server error".to_string()
        } else {
            self.0.message
        };

        let mut response = Ocs::failure(status, message).into_response();
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(value) = HeaderValue::from_str(&challenge(API_REALM)) {
                response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
            }
        }
        response
    }
}
