//! `REPORT oc:filter-files`: search a subtree by favorite flag and system tags.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use tracing::debug;

use nimbus_database::traits::{FAVORITE_TAG, NodeLookup, SystemTagMapper, TagStore, path_is_under};

use crate::error::{DavError, DavResult};
use crate::methods::propfind::collect_properties;
use crate::properties::{
    OC_NS, PropfindRequest, XmlElement, build_multistatus_xml, parse_xml,
};
use crate::server::{DavContext, DavRequest, DavResponse, DavServer, ServerPlugin, xml_response};
use crate::view::View;

#[derive(Debug, Clone)]
pub struct FilesReportPlugin {
    tags: Arc<dyn TagStore>,
    system_tags: Arc<dyn SystemTagMapper>,
    nodes: Arc<dyn NodeLookup>,
}

/// Parsed `oc:filter-rules`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRules {
    pub favorite: bool,
    pub system_tags: Vec<String>,
}

impl FilterRules {
    pub fn from_element(rules: &XmlElement) -> Self {
        let favorite = rules
            .child(OC_NS, "favorite")
            .is_some_and(|f| matches!(f.text.trim(), "1" | "true"));
        let system_tags = rules
            .children_named(OC_NS, "systemtag")
            .map(|t| t.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            favorite,
            system_tags,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.favorite && self.system_tags.is_empty()
    }
}

impl FilesReportPlugin {
    pub fn new(
        tags: Arc<dyn TagStore>,
        system_tags: Arc<dyn SystemTagMapper>,
        nodes: Arc<dyn NodeLookup>,
    ) -> Self {
        Self {
            tags,
            system_tags,
            nodes,
        }
    }

    /// View paths below `root` matching every rule.
    async fn matching_paths(
        &self,
        uid: &str,
        view: &View,
        root: &str,
        rules: &FilterRules,
    ) -> DavResult<BTreeSet<String>> {
        let mut result: Option<BTreeSet<String>> = None;

        if rules.favorite {
            let favorites = self
                .tags
                .paths_with_tag(uid, FAVORITE_TAG)
                .await?
                .iter()
                .filter_map(|p| view.view_path(p))
                .collect();
            result = Some(intersect(result, favorites));
        }

        for tag_id in &rules.system_tags {
            let mut tagged = BTreeSet::new();
            for id in self.system_tags.object_ids(tag_id).await? {
                let Some(node) = self.nodes.get_by_id(id).await? else {
                    continue;
                };
                if node.storage_id != view.storage_id() {
                    continue;
                }
                if let Some(path) = view.view_path(&node.path) {
                    tagged.insert(path);
                }
            }
            result = Some(intersect(result, tagged));
        }

        Ok(result
            .unwrap_or_default()
            .into_iter()
            .filter(|p| path_is_under(p, root))
            .collect())
    }
}

fn intersect(current: Option<BTreeSet<String>>, next: BTreeSet<String>) -> BTreeSet<String> {
    match current {
        Some(current) => current.intersection(&next).cloned().collect(),
        None => next,
    }
}

#[async_trait]
impl ServerPlugin for FilesReportPlugin {
    fn name(&self) -> &'static str {
        "files-report"
    }

    fn methods(&self) -> Vec<&'static str> {
        vec!["REPORT"]
    }

    async fn handle_method(
        &self,
        server: &DavServer,
        req: &DavRequest,
        ctx: &DavContext,
    ) -> DavResult<Option<DavResponse>> {
        if req.method.as_str() != "REPORT" {
            return Ok(None);
        }
        let Some(body) = parse_xml(&req.body)? else {
            return Ok(None);
        };
        if !body.is(OC_NS, "filter-files") {
            return Ok(None);
        }
        let uid = ctx
            .uid()
            .ok_or_else(|| DavError::forbidden("Filtering requires a logged in user"))?;
        let rules = body
            .child(OC_NS, "filter-rules")
            .map(FilterRules::from_element)
            .ok_or_else(|| DavError::bad_request("Missing filter-rule block in request"))?;

        let request = PropfindRequest::from_element(&body);

        let view = ctx.view()?;
        view.require_entry(&req.path).await?;

        let mut entries = Vec::new();
        if !rules.is_empty() {
            for path in self.matching_paths(uid, view, &req.path, &rules).await? {
                if let Some(entry) = view.entry(&path).await? {
                    entries.push(entry);
                }
            }
        }
        debug!(uid, path = %req.path, results = entries.len(), "filter-files report");

        let responses = collect_properties(server, ctx, &entries, &request).await?;
        Ok(Some(xml_response(
            StatusCode::MULTI_STATUS,
            build_multistatus_xml(&responses),
        )))
    }
}
