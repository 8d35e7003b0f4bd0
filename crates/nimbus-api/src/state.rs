//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use nimbus_auth::{Authenticator, PasswordHasher};
use nimbus_core::config::AppConfig;
use nimbus_service::{AccountService, Backends, ShareProvider, TokenGenerator};

/// Group whose members may use the administration endpoints.
pub const ADMIN_GROUP: &str = "admin";

/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub backends: Backends,
    pub shares: Arc<ShareProvider>,
    pub accounts: Arc<AccountService>,
    pub authenticator: Arc<Authenticator>,
    /// Hashes link share passwords before they are stored.
    pub hasher: Arc<PasswordHasher>,
    pub tokens: TokenGenerator,
}

impl AppState {
    pub fn new(config: AppConfig, backends: Backends, shares: Arc<ShareProvider>) -> Self {
        let hasher = Arc::new(PasswordHasher::new());
        let accounts = Arc::new(AccountService::new(
            backends.clone(),
            shares.clone(),
            hasher.clone(),
        ));
        Self {
            config: Arc::new(config),
            authenticator: Arc::new(Authenticator::new(backends.users.clone())),
            backends,
            shares,
            accounts,
            hasher,
            tokens: TokenGenerator::new(),
        }
    }
}
