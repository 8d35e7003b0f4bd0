//! Authentication plugins for account and public-share requests.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use nimbus_auth::{Authenticator, BasicCredentials, PasswordHasher};
use nimbus_core::error::ErrorKind;
use nimbus_entity::share::{Permissions, ShareType};
use nimbus_service::ShareProvider;

use crate::error::{DavError, DavResult};
use crate::server::{DavContext, DavRequest, DavServer, Flow, ServerPlugin};

/// Priority of authentication plugins.
pub const AUTH_PRIORITY: i32 = 10;

/// 401 for a failed login, without a challenge for script requests so
/// browsers do not pop up their own dialog.
fn unauthorized(req: &DavRequest, realm: &str, message: &str) -> DavError {
    let scripted = req
        .header("X-Requested-With")
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));
    if scripted {
        DavError::new(http::StatusCode::UNAUTHORIZED, "NotAuthenticated", message)
    } else {
        DavError::not_authenticated(realm, message)
    }
}

/// HTTP Basic authentication against the account directory.
#[derive(Debug, Clone)]
pub struct BasicAuthPlugin {
    authenticator: Authenticator,
    realm: String,
}

impl BasicAuthPlugin {
    pub fn new(authenticator: Authenticator, realm: impl Into<String>) -> Self {
        Self {
            authenticator,
            realm: realm.into(),
        }
    }
}

#[async_trait]
impl ServerPlugin for BasicAuthPlugin {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn priority(&self) -> i32 {
        AUTH_PRIORITY
    }

    async fn before_method(
        &self,
        _server: &DavServer,
        req: &DavRequest,
        ctx: &mut DavContext,
    ) -> DavResult<Flow> {
        if ctx.user.is_some() {
            return Ok(Flow::Continue);
        }
        if !req.has_authorization() {
            return Err(unauthorized(
                req,
                &self.realm,
                "No 'Authorization: Basic' header found. Either the client didn't send one, or the server is misconfigured",
            ));
        }

        match self.authenticator.authenticate_headers(&req.headers).await {
            Ok(user) => {
                debug!(uid = %user.uid, request_id = %ctx.request_id, "DAV request authenticated");
                ctx.user = Some(user);
                Ok(Flow::Continue)
            }
            Err(err) if matches!(err.kind, ErrorKind::Authentication | ErrorKind::Authorization) => {
                debug!(error = %err, "DAV authentication failed");
                Err(unauthorized(req, &self.realm, "Username or password was incorrect"))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Authenticates requests against a link share: the token comes from the
/// URL, a password protected share additionally needs Basic credentials
/// carrying the share password.
#[derive(Debug, Clone)]
pub struct PublicShareAuthPlugin {
    shares: Arc<ShareProvider>,
    hasher: PasswordHasher,
    realm: String,
    token: String,
}

impl PublicShareAuthPlugin {
    pub fn new(
        shares: Arc<ShareProvider>,
        realm: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            shares,
            hasher: PasswordHasher::new(),
            realm: realm.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl ServerPlugin for PublicShareAuthPlugin {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn priority(&self) -> i32 {
        AUTH_PRIORITY
    }

    async fn before_method(
        &self,
        _server: &DavServer,
        req: &DavRequest,
        ctx: &mut DavContext,
    ) -> DavResult<Flow> {
        let share = match self.shares.get_share_by_token(&self.token).await {
            Ok(share) => share,
            Err(err) if err.is_share_not_found() => {
                return Err(DavError::not_found("Share not found"));
            }
            Err(err) => return Err(err.into()),
        };
        if share.share_type != ShareType::Link || share.is_expired() {
            return Err(DavError::not_found("Share not found"));
        }
        if !share.permissions.contains(Permissions::READ) {
            return Err(DavError::forbidden("Share is not readable"));
        }

        if let Some(hash) = share.password.as_deref().filter(|h| !h.is_empty()) {
            let credentials = BasicCredentials::from_headers(&req.headers)
                .map_err(|_| unauthorized(req, &self.realm, "Share is password protected"))?;
            if !self.hasher.verify(&credentials.password, hash)? {
                debug!(token = %self.token, "Wrong public share password");
                return Err(unauthorized(req, &self.realm, "Wrong share password"));
            }
        }

        debug!(token = %self.token, request_id = %ctx.request_id, "Public share request authenticated");
        ctx.share = Some(share);
        Ok(Flow::Continue)
    }
}
