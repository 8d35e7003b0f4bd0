//! Request-scoped path locking and the fake LOCK/UNLOCK support some
//! clients insist on.

use std::sync::Mutex;

use async_trait::async_trait;
use http::StatusCode;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DavError, DavResult};
use crate::methods::PropFind;
use crate::properties::{PropName, PropValue, xml_escape};
use crate::server::lock::{LockManager, PathLock};
use crate::server::{
    DavContext, DavRequest, DavResponse, DavServer, Flow, ServerPlugin, empty_response,
    set_header, xml_response,
};
use crate::view::DavEntry;

/// Holds exclusive locks on the paths a write request touches until the
/// response is produced.
#[derive(Debug)]
pub struct LockPlugin {
    manager: LockManager,
    held: Mutex<Vec<PathLock>>,
}

impl LockPlugin {
    pub fn new(manager: LockManager) -> Self {
        Self {
            manager,
            held: Mutex::new(Vec::new()),
        }
    }

    fn hold(&self, lock: PathLock) {
        self.held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(lock);
    }
}

#[async_trait]
impl ServerPlugin for LockPlugin {
    fn name(&self) -> &'static str {
        "locks"
    }

    fn priority(&self) -> i32 {
        50
    }

    async fn before_method(
        &self,
        _server: &DavServer,
        req: &DavRequest,
        ctx: &mut DavContext,
    ) -> DavResult<Flow> {
        if !req.is_write() {
            return Ok(Flow::Continue);
        }
        let Some(view) = ctx.view.clone() else {
            return Ok(Flow::Continue);
        };

        let mut paths = vec![req.path.clone()];
        if matches!(req.method.as_str(), "MOVE" | "COPY") {
            if let Ok(destination) = req.destination(&ctx.base_uri) {
                paths.push(destination);
            }
        }
        // COPY only locks its destination.
        if req.method.as_str() == "COPY" {
            paths.remove(0);
        }

        for path in paths {
            let storage_path = view.storage_path(&path);
            match self.manager.try_lock(view.storage_id(), &storage_path) {
                Some(lock) => self.hold(lock),
                None => {
                    debug!(path = %storage_path, "Path is locked by another request");
                    return Err(DavError::locked(format!("\"{path}\" is locked")));
                }
            }
        }
        Ok(Flow::Continue)
    }

    async fn after_method(
        &self,
        _req: &DavRequest,
        _ctx: &DavContext,
        _response: &mut DavResponse,
    ) -> DavResult<()> {
        self.held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        Ok(())
    }
}

/// User agents that refuse to write without DAV class 2 locking.
const FAKE_LOCK_AGENTS: [&str; 3] = ["WebDAVFS/", "OneNote", "Microsoft-WebDAV"];

/// Pretends to support locking: LOCK always succeeds with a fresh token,
/// UNLOCK is a no-op.
#[derive(Debug, Clone, Default)]
pub struct FakeLockerPlugin;

impl FakeLockerPlugin {
    pub fn wanted_by(user_agent: &str) -> bool {
        FAKE_LOCK_AGENTS.iter().any(|agent| user_agent.contains(agent))
    }
}

#[async_trait]
impl ServerPlugin for FakeLockerPlugin {
    fn name(&self) -> &'static str {
        "fake-locker"
    }

    fn features(&self) -> Vec<&'static str> {
        vec!["2"]
    }

    fn methods(&self) -> Vec<&'static str> {
        vec!["LOCK", "UNLOCK"]
    }

    async fn handle_method(
        &self,
        _server: &DavServer,
        req: &DavRequest,
        ctx: &DavContext,
    ) -> DavResult<Option<DavResponse>> {
        match req.method.as_str() {
            "LOCK" => {
                let token = format!("opaquelocktoken:{}", Uuid::new_v4());
                let owner = ctx.uid().unwrap_or_default();
                let xml = format!(
                    r#"<?xml version="1.0" encoding="utf-8"?>
<d:prop xmlns:d="DAV:">
  <d:lockdiscovery>
    <d:activelock>
      <d:locktype><d:write/></d:locktype>
      <d:lockscope><d:exclusive/></d:lockscope>
      <d:depth>0</d:depth>
      <d:owner>{}</d:owner>
      <d:timeout>Second-1800</d:timeout>
      <d:locktoken><d:href>{}</d:href></d:locktoken>
    </d:activelock>
  </d:lockdiscovery>
</d:prop>
"#,
                    xml_escape(owner),
                    token
                );
                let mut resp = xml_response(StatusCode::OK, xml);
                set_header(&mut resp, "Lock-Token", &format!("<{token}>"));
                Ok(Some(resp))
            }
            "UNLOCK" => Ok(Some(empty_response(StatusCode::NO_CONTENT))),
            _ => Ok(None),
        }
    }

    async fn propfind(
        &self,
        _ctx: &DavContext,
        _entry: &DavEntry,
        props: &mut PropFind,
    ) -> DavResult<()> {
        props.set(
            PropName::dav("supportedlock"),
            PropValue::Xml(
                "<d:lockentry><d:lockscope><d:exclusive/></d:lockscope><d:locktype><d:write/></d:locktype></d:lockentry>\
                 <d:lockentry><d:lockscope><d:shared/></d:lockscope><d:locktype><d:write/></d:locktype></d:lockentry>"
                    .to_string(),
            ),
        );
        props.set(PropName::dav("lockdiscovery"), PropValue::Empty);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_lock_agents() {
        assert!(FakeLockerPlugin::wanted_by("WebDAVFS/3.0.0 (03008000) Darwin/22.1.0"));
        assert!(FakeLockerPlugin::wanted_by("Microsoft-WebDAV-MiniRedir/10.0.19043"));
        assert!(!FakeLockerPlugin::wanted_by("mirall/3.4.0"));
    }
}
