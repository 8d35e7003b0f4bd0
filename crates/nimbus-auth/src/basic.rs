//! HTTP Basic authentication against the account directory.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use http::HeaderMap;
use tracing::debug;

use nimbus_core::error::AppError;
use nimbus_database::traits::UserBackend;
use nimbus_entity::user::User;

use crate::password::PasswordHasher;

/// Username and password taken from an `Authorization: Basic` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl BasicCredentials {
    /// Parse the `Authorization` header.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, CredentialError> {
        let value = headers
            .get(http::header::AUTHORIZATION)
            .ok_or(CredentialError::MissingHeader)?
            .to_str()
            .map_err(|_| CredentialError::InvalidHeader)?;
        Self::parse(value)
    }

    /// Parse a raw `Basic <base64>` header value.
    pub fn parse(value: &str) -> Result<Self, CredentialError> {
        let encoded = value
            .strip_prefix("Basic ")
            .ok_or(CredentialError::NotBasicAuth)?;
        let decoded = BASE64
            .decode(encoded.trim())
            .map_err(|_| CredentialError::InvalidEncoding)?;
        let decoded = String::from_utf8(decoded).map_err(|_| CredentialError::InvalidEncoding)?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or(CredentialError::InvalidFormat)?;
        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// Why credentials could not be accepted.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Invalid Authorization header")]
    InvalidHeader,

    #[error("Not Basic authentication")]
    NotBasicAuth,

    #[error("Invalid base64 encoding")]
    InvalidEncoding,

    #[error("Invalid credentials format")]
    InvalidFormat,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,
}

impl From<CredentialError> for AppError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::AccountDisabled => AppError::authorization(e.to_string()),
            _ => AppError::authentication(e.to_string()),
        }
    }
}

/// Checks Basic credentials against [`UserBackend`] password hashes.
#[derive(Debug, Clone)]
pub struct Authenticator {
    users: Arc<dyn UserBackend>,
    hasher: PasswordHasher,
}

impl Authenticator {
    pub fn new(users: Arc<dyn UserBackend>) -> Self {
        Self {
            users,
            hasher: PasswordHasher::new(),
        }
    }

    /// Resolve the account behind a request, if its credentials are valid.
    pub async fn authenticate_headers(&self, headers: &HeaderMap) -> Result<User, AppError> {
        let credentials = BasicCredentials::from_headers(headers)?;
        self.authenticate(&credentials).await
    }

    pub async fn authenticate(&self, credentials: &BasicCredentials) -> Result<User, AppError> {
        let user = self
            .users
            .get(&credentials.username)
            .await?
            .ok_or(CredentialError::InvalidCredentials)?;

        let Some(hash) = user.password_hash.as_deref() else {
            debug!(uid = %user.uid, "Account has no password set");
            return Err(CredentialError::InvalidCredentials.into());
        };
        if !self.hasher.verify(&credentials.password, hash)? {
            debug!(uid = %user.uid, "Password mismatch");
            return Err(CredentialError::InvalidCredentials.into());
        }
        if !user.enabled {
            return Err(CredentialError::AccountDisabled.into());
        }
        Ok(user)
    }
}

/// `WWW-Authenticate` value for a realm.
pub fn challenge(realm: &str) -> String {
    format!("Basic realm=\"{realm}\", charset=\"UTF-8\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_core::error::ErrorKind;
    use nimbus_database::memory::MemoryDirectory;

    fn header(user: &str, pass: &str) -> String {
        format!("Basic {}", BASE64.encode(format!("{user}:{pass}")))
    }

    #[test]
    fn test_parse_credentials() {
        let creds = BasicCredentials::parse(&header("alice", "pa:ss")).unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "pa:ss");
        assert_eq!(
            BasicCredentials::parse("Bearer abc"),
            Err(CredentialError::NotBasicAuth)
        );
        assert_eq!(
            BasicCredentials::parse("Basic !!!"),
            Err(CredentialError::InvalidEncoding)
        );
    }

    #[tokio::test]
    async fn test_authenticate() {
        let dir = Arc::new(MemoryDirectory::new());
        let mut alice = User::new("alice");
        alice.password_hash = Some(PasswordHasher::new().hash("secret").unwrap());
        UserBackend::save(dir.as_ref(), &alice).await.unwrap();

        let auth = Authenticator::new(dir.clone());
        let ok = BasicCredentials::parse(&header("alice", "secret")).unwrap();
        assert_eq!(auth.authenticate(&ok).await.unwrap().uid, "alice");

        let bad = BasicCredentials::parse(&header("alice", "nope")).unwrap();
        assert_eq!(
            auth.authenticate(&bad).await.unwrap_err().kind,
            ErrorKind::Authentication
        );

        alice.enabled = false;
        UserBackend::save(dir.as_ref(), &alice).await.unwrap();
        assert_eq!(
            auth.authenticate(&ok).await.unwrap_err().kind,
            ErrorKind::Authorization
        );
    }
}
