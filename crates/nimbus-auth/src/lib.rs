//! # nimbus-auth
//!
//! Argon2id password hashing and HTTP Basic authentication against the
//! account directory. Shared by the OCS API and the WebDAV endpoint.

pub mod basic;
pub mod password;

pub use basic::{Authenticator, BasicCredentials, CredentialError, challenge};
pub use password::PasswordHasher;
