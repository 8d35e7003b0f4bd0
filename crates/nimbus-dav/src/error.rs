//! Protocol errors raised while serving a DAV request.
//!
//! Every hook and method handler returns [`DavResult`]. Domain failures from
//! the service layer arrive as [`AppError`] and are mapped onto an HTTP
//! status; protocol conditions with no domain equivalent (locked resources,
//! exhausted quota, maintenance) are built directly.

use http::StatusCode;
use thiserror::Error;

use nimbus_auth::challenge;
use nimbus_core::error::{AppError, ErrorKind};

/// Result alias for DAV hooks and handlers.
pub type DavResult<T> = Result<T, DavError>;

/// An error turned into a DAV error response.
#[derive(Debug, Clone, Error)]
#[error("{exception}: {message}")]
pub struct DavError {
    /// Response status.
    pub status: StatusCode,
    /// Short exception name reported in the error body.
    pub exception: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Extra response headers, e.g. an authentication challenge.
    pub headers: Vec<(&'static str, String)>,
}

impl DavError {
    pub fn new(status: StatusCode, exception: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            exception,
            message: message.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BadRequest", message)
    }

    /// 401 with a Basic challenge for `realm`.
    pub fn not_authenticated(realm: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "NotAuthenticated", message)
            .with_header("WWW-Authenticate", challenge(realm))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "Forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NotFound", message)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "Conflict", message)
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PRECONDITION_FAILED, "PreconditionFailed", message)
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "UnsupportedMediaType",
            message,
        )
    }

    pub fn locked(message: impl Into<String>) -> Self {
        Self::new(StatusCode::LOCKED, "Locked", message)
    }

    pub fn insufficient_storage(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INSUFFICIENT_STORAGE, "InsufficientStorage", message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_IMPLEMENTED, "NotImplemented", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "ServiceUnavailable", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError", message)
    }

    /// Whether this is a client-side condition rather than a server fault.
    pub fn is_expected(&self) -> bool {
        !self.status.is_server_error()
            || self.status == StatusCode::SERVICE_UNAVAILABLE
            || self.status == StatusCode::INSUFFICIENT_STORAGE
            || self.status == StatusCode::NOT_IMPLEMENTED
    }
}

impl From<AppError> for DavError {
    fn from(err: AppError) -> Self {
        match err.kind {
            ErrorKind::NotFound | ErrorKind::ShareNotFound => Self::not_found(err.message),
            ErrorKind::Authentication => {
                Self::new(StatusCode::UNAUTHORIZED, "NotAuthenticated", err.message)
            }
            ErrorKind::Authorization => Self::forbidden(err.message),
            ErrorKind::Validation | ErrorKind::Provider | ErrorKind::IllegalIdChange => {
                Self::bad_request(err.message)
            }
            ErrorKind::Conflict => Self::conflict(err.message),
            ErrorKind::NotImplemented => Self::not_implemented(err.message),
            _ => Self::internal(err.message),
        }
    }
}

impl From<std::io::Error> for DavError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::forbidden(err.to_string()),
            std::io::ErrorKind::AlreadyExists => Self::method_not_allowed(err.to_string()),
            _ => Self::internal(format!("Filesystem error: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_mapping() {
        assert_eq!(
            DavError::from(AppError::share_not_found("gone")).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            DavError::from(AppError::authorization("no")).status,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            DavError::from(AppError::not_implemented("later")).status,
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            DavError::from(AppError::database("down")).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_authenticated_carries_challenge() {
        let err = DavError::not_authenticated("Nimbus", "No credentials");
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.headers[0].0, "WWW-Authenticate");
        assert!(err.headers[0].1.contains("realm=\"Nimbus\""));
    }

    #[test]
    fn test_expected_errors() {
        assert!(DavError::not_found("x").is_expected());
        assert!(DavError::service_unavailable("x").is_expected());
        assert!(!DavError::internal("x").is_expected());
    }
}
