//! PROPFIND method implementation (RFC 4918 Section 9.1).

use http::StatusCode;
use tracing;

use crate::error::DavResult;
use crate::properties::{
    Depth, MultiStatusResponse, PropName, PropStat, PropValue, PropfindRequest,
    build_multistatus_xml, format_creation_date, format_http_date, href_for,
};
use crate::server::{DavContext, DavRequest, DavResponse, DavServer, xml_response};
use crate::view::DavEntry;

/// Properties collected for one resource during a PROPFIND.
#[derive(Debug, Clone)]
pub struct PropFind {
    request: PropfindRequest,
    found: Vec<(PropName, PropValue)>,
}

impl PropFind {
    pub fn new(request: PropfindRequest) -> Self {
        Self {
            request,
            found: Vec::new(),
        }
    }

    pub fn request(&self) -> &PropfindRequest {
        &self.request
    }

    /// Whether a value for `name` should be computed.
    pub fn wants(&self, name: &PropName) -> bool {
        if self.is_set(name) {
            return false;
        }
        match &self.request {
            PropfindRequest::AllProp | PropfindRequest::PropName => true,
            PropfindRequest::Prop(names) => names.contains(name),
        }
    }

    pub fn is_set(&self, name: &PropName) -> bool {
        self.found.iter().any(|(n, _)| n == name)
    }

    /// Record a value; the first value set for a name wins.
    pub fn set(&mut self, name: PropName, value: PropValue) {
        if self.wants(&name) {
            self.found.push((name, value));
        }
    }

    pub fn get(&self, name: &PropName) -> Option<&PropValue> {
        self.found.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn into_response(self, href: String) -> MultiStatusResponse {
        let mut propstats = Vec::new();
        match self.request {
            PropfindRequest::AllProp => {
                propstats.push(PropStat {
                    status: StatusCode::OK,
                    props: self.found,
                });
            }
            PropfindRequest::PropName => {
                propstats.push(PropStat {
                    status: StatusCode::OK,
                    props: self
                        .found
                        .into_iter()
                        .map(|(name, _)| (name, PropValue::Empty))
                        .collect(),
                });
            }
            PropfindRequest::Prop(names) => {
                let mut found = Vec::new();
                let mut missing = Vec::new();
                let mut values = self.found;
                for name in names {
                    match values.iter().position(|(n, _)| *n == name) {
                        Some(idx) => found.push(values.swap_remove(idx)),
                        None => missing.push((name, PropValue::Empty)),
                    }
                }
                if !found.is_empty() {
                    propstats.push(PropStat {
                        status: StatusCode::OK,
                        props: found,
                    });
                }
                if !missing.is_empty() {
                    propstats.push(PropStat {
                        status: StatusCode::NOT_FOUND,
                        props: missing,
                    });
                }
            }
        }
        MultiStatusResponse { href, propstats }
    }
}

/// Handle a PROPFIND request
pub async fn handle_propfind(
    server: &DavServer,
    req: &DavRequest,
    ctx: &DavContext,
) -> DavResult<DavResponse> {
    let request = PropfindRequest::parse(&req.body)?;
    let view = ctx.view()?;
    // Infinite depth is served as depth 1.
    let depth = match req.depth() {
        Depth::Zero => Depth::Zero,
        _ => Depth::One,
    };

    tracing::debug!("PROPFIND: path='{}', depth={:?}", req.path, depth);

    let root = view.require_entry(&req.path).await?;
    let mut entries = vec![root.clone()];
    if depth == Depth::One && root.is_collection {
        entries.extend(view.children(&req.path).await?);
    }

    let responses = collect_properties(server, ctx, &entries, &request).await?;
    Ok(xml_response(
        StatusCode::MULTI_STATUS,
        build_multistatus_xml(&responses),
    ))
}

/// Run the core and plugin property handlers over `entries`.
pub async fn collect_properties(
    server: &DavServer,
    ctx: &DavContext,
    entries: &[DavEntry],
    request: &PropfindRequest,
) -> DavResult<Vec<MultiStatusResponse>> {
    let mut responses = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut props = PropFind::new(request.clone());
        core_properties(entry, &mut props);
        for plugin in server.plugins() {
            plugin.propfind(ctx, entry, &mut props).await?;
        }
        let href = href_for(&ctx.base_uri, &entry.path, entry.is_collection);
        responses.push(props.into_response(href));
    }
    Ok(responses)
}

fn core_properties(entry: &DavEntry, props: &mut PropFind) {
    props.set(
        PropName::dav("resourcetype"),
        if entry.is_collection {
            PropValue::Xml("<d:collection/>".to_string())
        } else {
            PropValue::Empty
        },
    );
    props.set(
        PropName::dav("getlastmodified"),
        PropValue::text(format_http_date(&entry.modified)),
    );
    props.set(
        PropName::dav("creationdate"),
        PropValue::text(format_creation_date(&entry.created)),
    );
    props.set(
        PropName::dav("getetag"),
        PropValue::text(format!("\"{}\"", entry.etag)),
    );
    if !entry.is_collection {
        props.set(
            PropName::dav("getcontentlength"),
            PropValue::text(entry.size.to_string()),
        );
        props.set(
            PropName::dav("getcontenttype"),
            PropValue::text(entry.content_type.clone()),
        );
    }
    if !entry.name.is_empty() {
        props.set(
            PropName::dav("displayname"),
            PropValue::text(entry.name.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prop_request_splits_found_and_missing() {
        let mut props = PropFind::new(PropfindRequest::Prop(vec![
            PropName::dav("getetag"),
            PropName::oc("fileid"),
        ]));
        props.set(PropName::dav("getetag"), PropValue::text("\"1\""));
        props.set(PropName::dav("getcontentlength"), PropValue::text("3"));
        assert!(!props.wants(&PropName::dav("getetag")));
        assert!(props.wants(&PropName::oc("fileid")));

        let response = props.into_response("/dav/a".into());
        assert_eq!(response.propstats.len(), 2);
        assert_eq!(response.propstats[0].props.len(), 1);
        assert_eq!(response.propstats[1].status, StatusCode::NOT_FOUND);
        assert_eq!(response.propstats[1].props[0].0, PropName::oc("fileid"));
    }

    #[test]
    fn test_propname_renders_empty_values() {
        let mut props = PropFind::new(PropfindRequest::PropName);
        props.set(PropName::dav("getetag"), PropValue::text("\"1\""));
        let response = props.into_response("/dav/".into());
        assert_eq!(response.propstats[0].props[0].1, PropValue::Empty);
    }
}
