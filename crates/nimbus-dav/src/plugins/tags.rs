//! Favorites and personal tags (`oc:favorite`, `oc:tags`).

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;

use nimbus_database::traits::{FAVORITE_TAG, TagStore};

use crate::error::DavResult;
use crate::methods::{PropFind, PropPatch};
use crate::properties::{PropName, PropValue, xml_escape};
use crate::server::{DavContext, DavRequest, DavResponse, ServerPlugin};
use crate::view::DavEntry;

#[derive(Debug, Clone)]
pub struct TagsPlugin {
    tags: Arc<dyn TagStore>,
}

impl TagsPlugin {
    pub fn new(tags: Arc<dyn TagStore>) -> Self {
        Self { tags }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true")
}

#[async_trait]
impl ServerPlugin for TagsPlugin {
    fn name(&self) -> &'static str {
        "tags"
    }

    async fn propfind(
        &self,
        ctx: &DavContext,
        entry: &DavEntry,
        props: &mut PropFind,
    ) -> DavResult<()> {
        let (Some(uid), Ok(view)) = (ctx.uid(), ctx.view()) else {
            return Ok(());
        };
        let tags_name = PropName::oc("tags");
        let favorite_name = PropName::oc("favorite");
        if !props.wants(&tags_name) && !props.wants(&favorite_name) {
            return Ok(());
        }

        let tags = self.tags.tags(uid, &view.storage_path(&entry.path)).await?;
        let favorite = tags.iter().any(|t| t == FAVORITE_TAG);
        let xml: String = tags
            .iter()
            .filter(|t| *t != FAVORITE_TAG)
            .map(|t| format!("<oc:tag>{}</oc:tag>", xml_escape(t)))
            .collect();
        props.set(tags_name, PropValue::Xml(xml));
        props.set(favorite_name, PropValue::text(if favorite { "1" } else { "0" }));
        Ok(())
    }

    async fn proppatch(
        &self,
        ctx: &DavContext,
        entry: &DavEntry,
        patch: &mut PropPatch,
    ) -> DavResult<()> {
        let (Some(uid), Ok(view)) = (ctx.uid(), ctx.view()) else {
            return Ok(());
        };
        let path = view.storage_path(&entry.path);

        for op in patch.pending() {
            if op.name == PropName::oc("favorite") {
                let favorite = op.value.as_ref().is_some_and(|v| is_truthy(&v.value()));
                if favorite {
                    self.tags.tag(uid, &path, FAVORITE_TAG).await?;
                } else {
                    self.tags.untag(uid, &path, FAVORITE_TAG).await?;
                }
                patch.handle(&op.name, StatusCode::OK);
            } else if op.name == PropName::oc("tags") {
                let wanted: Vec<String> = op
                    .value
                    .as_ref()
                    .map(|v| {
                        v.children
                            .iter()
                            .map(|c| c.text.trim().to_string())
                            .filter(|t| !t.is_empty() && t != FAVORITE_TAG)
                            .collect()
                    })
                    .unwrap_or_default();
                let current = self.tags.tags(uid, &path).await?;
                for tag in current.iter().filter(|t| *t != FAVORITE_TAG) {
                    if !wanted.contains(tag) {
                        self.tags.untag(uid, &path, tag).await?;
                    }
                }
                for tag in wanted.iter().filter(|t| !current.contains(t)) {
                    self.tags.tag(uid, &path, tag).await?;
                }
                patch.handle(&op.name, StatusCode::OK);
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
        let (Some(uid), Some(view)) = (ctx.uid(), ctx.view.as_ref()) else {
            return Ok(());
        };
        if !response.status().is_success() {
            return Ok(());
        }
        match req.method.as_str() {
            "DELETE" => {
                self.tags.delete_path(uid, &view.storage_path(&req.path)).await?;
            }
            "MOVE" => {
                let destination = req.destination(&ctx.base_uri)?;
                self.tags
                    .move_path(
                        uid,
                        &view.storage_path(&req.path),
                        &view.storage_path(&destination),
                    )
                    .await?;
            }
            _ => {}
        }
        Ok(())
    }
}
