//! File properties, filename validation and download headers.

use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use nimbus_database::traits::{NodeLookup, UserBackend};
use nimbus_entity::node::Node;
use nimbus_entity::share::Permissions;

use crate::error::{DavError, DavResult};
use crate::methods::{PropFind, PropPatch};
use crate::properties::{PropName, PropValue};
use crate::server::{
    DavContext, DavRequest, DavResponse, DavServer, ServerPlugin, set_header,
};
use crate::view::{DavEntry, View, split_parent};

/// Names that may not be created anywhere in the tree.
const FORBIDDEN_NAMES: [&str; 2] = [".htaccess", ".nimbus-part"];

const MAX_NAME_LENGTH: usize = 250;

/// Serves `oc:fileid`, `oc:permissions`, `oc:size` and owner properties,
/// validates names of created items and marks downloads as attachments.
#[derive(Debug, Clone)]
pub struct FilesPlugin {
    nodes: Arc<dyn NodeLookup>,
    users: Arc<dyn UserBackend>,
}

impl FilesPlugin {
    pub fn new(nodes: Arc<dyn NodeLookup>, users: Arc<dyn UserBackend>) -> Self {
        Self { nodes, users }
    }

    fn computed() -> [PropName; 6] {
        [
            PropName::oc("fileid"),
            PropName::oc("permissions"),
            PropName::oc("size"),
            PropName::oc("owner-id"),
            PropName::oc("owner-display-name"),
            PropName::nc("has-preview"),
        ]
    }
}

/// File cache entry behind a view path, if the file cache knows it.
pub async fn node_for(
    nodes: &dyn NodeLookup,
    view: &View,
    path: &str,
) -> DavResult<Option<Node>> {
    Ok(nodes
        .get_by_path(view.storage_id(), &view.storage_path(path))
        .await?)
}

/// Permission letters clients use to enable or disable actions:
/// `R` reshare, `G` read, `D` delete, `NV` rename/move, `W` write (files),
/// `CK` create (folders).
pub fn dav_permissions(permissions: Permissions, is_collection: bool) -> String {
    let mut letters = String::new();
    if permissions.contains(Permissions::SHARE) {
        letters.push('R');
    }
    if permissions.contains(Permissions::READ) {
        letters.push('G');
    }
    if permissions.contains(Permissions::DELETE) {
        letters.push('D');
    }
    if permissions.contains(Permissions::UPDATE) {
        letters.push_str("NV");
        if !is_collection {
            letters.push('W');
        }
    }
    if is_collection && permissions.contains(Permissions::CREATE) {
        letters.push_str("CK");
    }
    letters
}

/// Reject names the tree may not contain.
pub fn validate_file_name(name: &str) -> DavResult<()> {
    if name.trim().is_empty() {
        return Err(DavError::bad_request("Empty filename is not allowed"));
    }
    if FORBIDDEN_NAMES.iter().any(|f| name.eq_ignore_ascii_case(f)) {
        return Err(DavError::bad_request(format!(
            "\"{name}\" is a forbidden file or folder name."
        )));
    }
    if name.trim() != name {
        return Err(DavError::bad_request(format!(
            "\"{name}\" has leading or trailing whitespace."
        )));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(DavError::bad_request("Filename is too long"));
    }
    Ok(())
}

#[async_trait]
impl ServerPlugin for FilesPlugin {
    fn name(&self) -> &'static str {
        "files"
    }

    async fn handle_method(
        &self,
        _server: &DavServer,
        req: &DavRequest,
        ctx: &DavContext,
    ) -> DavResult<Option<DavResponse>> {
        let target = match req.method.as_str() {
            "PUT" | "MKCOL" => req.path.clone(),
            "MOVE" | "COPY" => req.destination(&ctx.base_uri)?,
            _ => return Ok(None),
        };
        if !target.is_empty() {
            let (_, name) = split_parent(&target);
            validate_file_name(&name)?;
        }
        Ok(None)
    }

    async fn propfind(
        &self,
        ctx: &DavContext,
        entry: &DavEntry,
        props: &mut PropFind,
    ) -> DavResult<()> {
        let view = ctx.view()?;

        if props.wants(&PropName::oc("fileid")) {
            if let Some(node) = node_for(self.nodes.as_ref(), view, &entry.path).await? {
                props.set(PropName::oc("fileid"), PropValue::text(node.id.to_string()));
            }
        }
        props.set(
            PropName::oc("permissions"),
            PropValue::text(dav_permissions(view.permissions(), entry.is_collection)),
        );
        if props.wants(&PropName::oc("size")) {
            let size = if entry.is_collection {
                view.size_of(&entry.path).await?
            } else {
                entry.size
            };
            props.set(PropName::oc("size"), PropValue::text(size.to_string()));
        }
        props.set(PropName::oc("owner-id"), PropValue::text(view.owner()));
        if props.wants(&PropName::oc("owner-display-name")) {
            let display_name = match self.users.get(view.owner()).await? {
                Some(user) => user.display_name_or_uid().to_string(),
                None => view.owner().to_string(),
            };
            props.set(PropName::oc("owner-display-name"), PropValue::text(display_name));
        }
        props.set(PropName::nc("has-preview"), PropValue::text("false"));
        Ok(())
    }

    async fn proppatch(
        &self,
        _ctx: &DavContext,
        _entry: &DavEntry,
        patch: &mut PropPatch,
    ) -> DavResult<()> {
        for name in Self::computed() {
            if patch.op(&name).is_some() {
                patch.handle(&name, http::StatusCode::FORBIDDEN);
            }
        }
        Ok(())
    }

    async fn after_method(
        &self,
        req: &DavRequest,
        ctx: &DavContext,
        response: &mut DavResponse,
    ) -> DavResult<()> {
        match req.method.as_str() {
            "GET" if response.status() == http::StatusCode::OK => {
                let Some(view) = ctx.view.as_ref() else {
                    return Ok(());
                };
                if let Some(entry) = view.entry(&req.path).await? {
                    if !entry.is_collection {
                        let encoded =
                            utf8_percent_encode(&entry.name, NON_ALPHANUMERIC).to_string();
                        set_header(
                            response,
                            "Content-Disposition",
                            &format!("attachment; filename*=UTF-8''{encoded}; filename=\"{encoded}\""),
                        );
                        set_header(response, "X-Accel-Buffering", "no");
                    }
                }
            }
            "PUT" if response.status().is_success() => {
                let Some(view) = ctx.view.as_ref() else {
                    return Ok(());
                };
                if let Some(node) = node_for(self.nodes.as_ref(), view, &req.path).await? {
                    set_header(response, "OC-FileId", &node.id.to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dav_permissions() {
        assert_eq!(dav_permissions(Permissions::ALL, true), "RGDNVCK");
        assert_eq!(dav_permissions(Permissions::ALL, false), "RGDNVW");
        assert_eq!(dav_permissions(Permissions::READ, false), "G");
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("report.pdf").is_ok());
        assert!(validate_file_name(".HTACCESS").is_err());
        assert!(validate_file_name(" padded").is_err());
        assert!(validate_file_name("  ").is_err());
        assert!(validate_file_name(&"a".repeat(300)).is_err());
    }
}
