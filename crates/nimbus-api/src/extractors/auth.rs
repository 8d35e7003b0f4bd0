//! `AuthUser` extractor: checks Basic credentials and builds the request context.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use nimbus_service::RequestContext;

use crate::error::ApiError;
use crate::state::{ADMIN_GROUP, AppState};

/// The authenticated account of the current request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub RequestContext);

impl std::ops::Deref for AuthUser {
    type Target = RequestContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = state
            .authenticator
            .authenticate_headers(&parts.headers)
            .await?;
        let is_admin = state
            .backends
            .groups
            .is_in_group(&user.uid, ADMIN_GROUP)
            .await?;

        Ok(AuthUser(RequestContext::new(user.uid, is_admin)))
    }
}
