//! Plugins that turn requests away before authentication matters.

use async_trait::async_trait;
use http::StatusCode;

use crate::error::{DavError, DavResult};
use crate::server::{DavContext, DavRequest, DavServer, Flow, ServerPlugin, empty_response};

/// Answers every request with 503 while maintenance mode is on.
#[derive(Debug, Clone)]
pub struct MaintenancePlugin {
    enabled: bool,
}

impl MaintenancePlugin {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl ServerPlugin for MaintenancePlugin {
    fn name(&self) -> &'static str {
        "maintenance"
    }

    fn priority(&self) -> i32 {
        1
    }

    async fn before_method(
        &self,
        _server: &DavServer,
        _req: &DavRequest,
        _ctx: &mut DavContext,
    ) -> DavResult<Flow> {
        if self.enabled {
            return Err(DavError::service_unavailable("System is in maintenance mode."));
        }
        Ok(Flow::Continue)
    }
}

/// Rejects desktop clients (`mirall/x.y.z`) older than the configured
/// minimum version.
#[derive(Debug, Clone)]
pub struct BlockLegacyClientPlugin {
    minimum: String,
}

impl BlockLegacyClientPlugin {
    pub fn new(minimum: impl Into<String>) -> Self {
        Self {
            minimum: minimum.into(),
        }
    }
}

#[async_trait]
impl ServerPlugin for BlockLegacyClientPlugin {
    fn name(&self) -> &'static str {
        "block-legacy-client"
    }

    fn priority(&self) -> i32 {
        200
    }

    async fn before_method(
        &self,
        _server: &DavServer,
        req: &DavRequest,
        _ctx: &mut DavContext,
    ) -> DavResult<Flow> {
        let Some(version) = desktop_client_version(req.user_agent()) else {
            return Ok(Flow::Continue);
        };
        if version_less(&version, &parse_version(&self.minimum)) {
            return Err(DavError::forbidden(format!(
                "This version of the client is unsupported. Upgrade to version {} or later.",
                self.minimum
            )));
        }
        Ok(Flow::Continue)
    }
}

/// Version from a `mirall/2.6.4 (...)` user agent.
fn desktop_client_version(user_agent: &str) -> Option<Vec<u32>> {
    let idx = user_agent.find("mirall/")?;
    let raw: String = user_agent[idx + "mirall/".len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let version = parse_version(&raw);
    (!version.is_empty()).then_some(version)
}

fn parse_version(raw: &str) -> Vec<u32> {
    raw.split('.')
        .map_while(|part| part.parse::<u32>().ok())
        .collect()
}

fn version_less(a: &[u32], b: &[u32]) -> bool {
    let len = a.len().max(b.len());
    for i in 0..len {
        let (x, y) = (
            a.get(i).copied().unwrap_or(0),
            b.get(i).copied().unwrap_or(0),
        );
        if x != y {
            return x < y;
        }
    }
    false
}

/// Lets unauthenticated `OPTIONS` requests, and Office probing the root,
/// through without credentials.
#[derive(Debug, Clone, Default)]
pub struct AnonymousOptionsPlugin;

#[async_trait]
impl ServerPlugin for AnonymousOptionsPlugin {
    fn name(&self) -> &'static str {
        "anonymous-options"
    }

    fn priority(&self) -> i32 {
        9
    }

    async fn before_method(
        &self,
        server: &DavServer,
        req: &DavRequest,
        _ctx: &mut DavContext,
    ) -> DavResult<Flow> {
        if req.has_authorization() {
            return Ok(Flow::Continue);
        }
        match req.method.as_str() {
            "OPTIONS" => Ok(Flow::Respond(server.options_response())),
            "GET" | "HEAD"
                if req.path.is_empty() && req.user_agent().contains("Microsoft Office") =>
            {
                Ok(Flow::Respond(empty_response(StatusCode::OK)))
            }
            _ => Ok(Flow::Continue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_client_version() {
        assert_eq!(
            desktop_client_version("Mozilla/5.0 (Linux) mirall/2.6.4stable (build 1)"),
            Some(vec![2, 6, 4])
        );
        assert_eq!(desktop_client_version("curl/8.0"), None);
    }

    #[test]
    fn test_version_less() {
        assert!(version_less(&[2, 6, 4], &[2, 7, 0]));
        assert!(!version_less(&[2, 7], &[2, 7, 0]));
        assert!(!version_less(&[3, 0, 0], &[2, 7, 0]));
    }
}
