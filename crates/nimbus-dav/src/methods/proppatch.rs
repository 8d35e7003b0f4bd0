//! PROPPATCH method implementation (RFC 4918 Section 9.2).

use std::collections::BTreeMap;

use http::StatusCode;
use tracing;

use crate::error::DavResult;
use crate::properties::{
    DAV_NS, MultiStatusResponse, PropName, PropPatchOp, PropStat, PropValue, build_multistatus_xml,
    href_for, parse_proppatch,
};
use crate::server::{DavContext, DavRequest, DavResponse, DavServer, xml_response};

/// Live DAV properties clients may not change.
const PROTECTED: [&str; 12] = [
    "getetag",
    "getcontentlength",
    "getcontenttype",
    "getlastmodified",
    "creationdate",
    "resourcetype",
    "lockdiscovery",
    "supportedlock",
    "quota-used-bytes",
    "quota-available-bytes",
    "current-user-privilege-set",
    "sync-token",
];

/// Pending property updates and their per-property outcome.
#[derive(Debug, Clone)]
pub struct PropPatch {
    ops: Vec<PropPatchOp>,
    results: BTreeMap<PropName, StatusCode>,
}

impl PropPatch {
    pub fn new(ops: Vec<PropPatchOp>) -> Self {
        Self {
            ops,
            results: BTreeMap::new(),
        }
    }

    /// Operations no handler has answered yet.
    pub fn pending(&self) -> Vec<PropPatchOp> {
        self.ops
            .iter()
            .filter(|op| !self.results.contains_key(&op.name))
            .cloned()
            .collect()
    }

    pub fn op(&self, name: &PropName) -> Option<&PropPatchOp> {
        self.ops.iter().find(|op| op.name == *name)
    }

    /// Record the outcome for `name`; the first recorded outcome wins.
    pub fn handle(&mut self, name: &PropName, status: StatusCode) {
        self.results.entry(name.clone()).or_insert(status);
    }

    pub fn result(&self, name: &PropName) -> Option<StatusCode> {
        self.results.get(name).copied()
    }

    /// Unanswered properties are reported as forbidden.
    pub fn into_response(self, href: String) -> MultiStatusResponse {
        let mut by_status: BTreeMap<u16, Vec<(PropName, PropValue)>> = BTreeMap::new();
        for op in self.ops {
            let status = self
                .results
                .get(&op.name)
                .copied()
                .unwrap_or(StatusCode::FORBIDDEN);
            by_status
                .entry(status.as_u16())
                .or_default()
                .push((op.name, PropValue::Empty));
        }
        MultiStatusResponse {
            href,
            propstats: by_status
                .into_iter()
                .filter_map(|(code, props)| {
                    StatusCode::from_u16(code)
                        .ok()
                        .map(|status| PropStat { status, props })
                })
                .collect(),
        }
    }
}

/// Handle a PROPPATCH request
pub async fn handle_proppatch(
    server: &DavServer,
    req: &DavRequest,
    ctx: &DavContext,
) -> DavResult<DavResponse> {
    let ops = parse_proppatch(&req.body)?;
    let view = ctx.view()?;
    let entry = view.require_entry(&req.path).await?;

    tracing::debug!("PROPPATCH: path='{}', properties={}", req.path, ops.len());

    let mut patch = PropPatch::new(ops);
    for op in patch.pending() {
        if op.name.ns == DAV_NS && PROTECTED.contains(&op.name.local.as_str()) {
            patch.handle(&op.name, StatusCode::FORBIDDEN);
        }
    }
    for plugin in server.plugins() {
        plugin.proppatch(ctx, &entry, &mut patch).await?;
    }

    let href = href_for(&ctx.base_uri, &entry.path, entry.is_collection);
    Ok(xml_response(
        StatusCode::MULTI_STATUS,
        build_multistatus_xml(&[patch.into_response(href)]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(name: PropName) -> PropPatchOp {
        PropPatchOp { name, value: None }
    }

    #[test]
    fn test_unhandled_properties_are_forbidden() {
        let mut patch = PropPatch::new(vec![
            op(PropName::oc("favorite")),
            op(PropName::new("urn:x", "color")),
        ]);
        patch.handle(&PropName::oc("favorite"), StatusCode::OK);
        patch.handle(&PropName::oc("favorite"), StatusCode::CONFLICT);
        assert_eq!(patch.pending().len(), 1);
        assert_eq!(patch.result(&PropName::oc("favorite")), Some(StatusCode::OK));

        let response = patch.into_response("/dav/a".into());
        assert_eq!(response.propstats.len(), 2);
        assert_eq!(response.propstats[0].status, StatusCode::OK);
        assert_eq!(response.propstats[1].status, StatusCode::FORBIDDEN);
    }
}
