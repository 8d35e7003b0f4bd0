//! Per-request DAV server and its plugin chain.
//!
//! A [`DavServer`] is assembled for one request by the
//! [`factory::ServerFactory`]. Plugins run ordered by priority (lower first,
//! insertion order within a priority):
//!
//! 1. `before_method` on every plugin registered at construction. A plugin
//!    may answer the request itself or register further plugins through
//!    [`DavContext::add_plugin`]; those skip `before_method` for the current
//!    request but take part in every later hook.
//! 2. `handle_method` until one plugin claims the request, then the core
//!    method handlers.
//! 3. `after_method` on every plugin, for successful and failed requests.

pub mod factory;
pub mod lock;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Response, StatusCode};
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};
use uuid::Uuid;

use nimbus_entity::share::Share;
use nimbus_entity::user::User;

use crate::error::{DavError, DavResult};
use crate::methods::{self, PropFind, PropPatch};
use crate::properties::{Depth, build_error_xml};
use crate::view::{DavEntry, View, normalize};

/// Response type produced by the DAV server.
pub type DavResponse = Response<Bytes>;

/// Core methods every server instance handles.
const CORE_METHODS: [&str; 10] = [
    "OPTIONS", "GET", "HEAD", "DELETE", "PROPFIND", "PUT", "PROPPATCH", "COPY", "MOVE", "MKCOL",
];

/// An incoming request, its path resolved against the server's base URI.
#[derive(Debug, Clone)]
pub struct DavRequest {
    pub method: Method,
    /// Request path as received, without the query string.
    pub uri: String,
    /// Decoded path relative to the base URI, without leading or trailing `/`.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl DavRequest {
    pub fn new(
        method: Method,
        request_uri: &str,
        base_uri: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> DavResult<Self> {
        let uri = request_uri.split('?').next().unwrap_or_default().to_string();
        let relative = strip_base(&uri, base_uri).ok_or_else(|| {
            DavError::not_found(format!("Requested uri ({uri}) is out of base uri ({base_uri})"))
        })?;
        Ok(Self {
            method,
            path: decode_path(relative)?,
            uri,
            headers,
            body,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn user_agent(&self) -> &str {
        self.header("User-Agent").unwrap_or_default()
    }

    pub fn depth(&self) -> Depth {
        Depth::from_header(self.header("Depth"))
    }

    /// `Overwrite` defaults to `T`.
    pub fn overwrite(&self) -> bool {
        !matches!(self.header("Overwrite"), Some(v) if v.trim().eq_ignore_ascii_case("f"))
    }

    /// Decoded `Destination` path relative to `base_uri`.
    pub fn destination(&self, base_uri: &str) -> DavResult<String> {
        let raw = self
            .header("Destination")
            .ok_or_else(|| DavError::bad_request("The destination header was not supplied"))?;
        let path = match raw.find("://") {
            Some(idx) => {
                let after_scheme = &raw[idx + 3..];
                after_scheme
                    .find('/')
                    .map(|slash| &after_scheme[slash..])
                    .unwrap_or("/")
            }
            None => raw,
        };
        let path = path.split('?').next().unwrap_or_default();
        let relative = strip_base(path, base_uri).ok_or_else(|| {
            DavError::new(
                StatusCode::BAD_GATEWAY,
                "BadGateway",
                "The destination is not on this server",
            )
        })?;
        decode_path(relative)
    }

    /// Whether the method changes the tree.
    pub fn is_write(&self) -> bool {
        matches!(
            self.method.as_str(),
            "PUT" | "DELETE" | "MKCOL" | "MOVE" | "COPY" | "PROPPATCH" | "PATCH"
        )
    }

    /// Whether the request carries any `Authorization` header.
    pub fn has_authorization(&self) -> bool {
        self.header("Authorization").is_some_and(|v| !v.trim().is_empty())
    }
}

fn strip_base<'a>(uri: &'a str, base_uri: &str) -> Option<&'a str> {
    let base = base_uri.trim_end_matches('/');
    let rest = uri.strip_prefix(base)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

fn decode_path(path: &str) -> DavResult<String> {
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_err(|_| DavError::bad_request("Request path is not valid UTF-8"))?;
    Ok(normalize(&decoded))
}

/// State shared by the hooks of one request.
#[derive(Debug)]
pub struct DavContext {
    pub base_uri: String,
    pub is_public_share: bool,
    /// Authenticated account, `None` for public shares.
    pub user: Option<User>,
    /// Link share of a public request.
    pub share: Option<Share>,
    /// Filesystem view, set once authentication succeeded.
    pub view: Option<Arc<View>>,
    pub request_id: String,
    pending: Vec<Arc<dyn ServerPlugin>>,
}

impl DavContext {
    pub fn new(base_uri: impl Into<String>, is_public_share: bool, request_id: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            is_public_share,
            user: None,
            share: None,
            view: None,
            request_id: request_id.into(),
            pending: Vec::new(),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn uid(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.uid.as_str())
    }

    pub fn view(&self) -> DavResult<&Arc<View>> {
        self.view
            .as_ref()
            .ok_or_else(|| DavError::internal("Filesystem view is not set up"))
    }

    /// Register a plugin from inside a `before_method` hook.
    pub fn add_plugin(&mut self, plugin: Arc<dyn ServerPlugin>) {
        self.pending.push(plugin);
    }
}

/// Outcome of a `before_method` hook.
#[derive(Debug)]
pub enum Flow {
    Continue,
    /// Stop processing and send this response.
    Respond(DavResponse),
}

/// A server plugin. Every hook has a no-op default.
#[async_trait]
pub trait ServerPlugin: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Hook order, lower runs first.
    fn priority(&self) -> i32 {
        100
    }

    /// Compliance classes added to the `DAV` header.
    fn features(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Methods added to the `Allow` header.
    fn methods(&self) -> Vec<&'static str> {
        Vec::new()
    }

    async fn before_method(
        &self,
        _server: &DavServer,
        _req: &DavRequest,
        _ctx: &mut DavContext,
    ) -> DavResult<Flow> {
        Ok(Flow::Continue)
    }

    /// Claim the request before the core handler runs.
    async fn handle_method(
        &self,
        _server: &DavServer,
        _req: &DavRequest,
        _ctx: &DavContext,
    ) -> DavResult<Option<DavResponse>> {
        Ok(None)
    }

    async fn propfind(
        &self,
        _ctx: &DavContext,
        _entry: &DavEntry,
        _props: &mut PropFind,
    ) -> DavResult<()> {
        Ok(())
    }

    async fn proppatch(
        &self,
        _ctx: &DavContext,
        _entry: &DavEntry,
        _patch: &mut PropPatch,
    ) -> DavResult<()> {
        Ok(())
    }

    async fn after_method(
        &self,
        _req: &DavRequest,
        _ctx: &DavContext,
        _response: &mut DavResponse,
    ) -> DavResult<()> {
        Ok(())
    }

    fn on_exception(&self, _req: &DavRequest, _ctx: &DavContext, _error: &DavError) {}

    /// Replacement body for an error response.
    fn error_page(
        &self,
        _req: &DavRequest,
        _ctx: &DavContext,
        _error: &DavError,
    ) -> Option<DavResponse> {
        None
    }
}

/// One request's server: base URI plus the ordered plugin chain.
#[derive(Debug)]
pub struct DavServer {
    base_uri: String,
    is_public_share: bool,
    plugins: Vec<Arc<dyn ServerPlugin>>,
}

impl DavServer {
    pub fn new(base_uri: impl Into<String>, is_public_share: bool) -> Self {
        Self {
            base_uri: base_uri.into(),
            is_public_share,
            plugins: Vec::new(),
        }
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn is_public_share(&self) -> bool {
        self.is_public_share
    }

    /// Insert a plugin after every plugin of lower or equal priority.
    pub fn add_plugin(&mut self, plugin: Arc<dyn ServerPlugin>) {
        let priority = plugin.priority();
        let index = self
            .plugins
            .iter()
            .position(|p| p.priority() > priority)
            .unwrap_or(self.plugins.len());
        self.plugins.insert(index, plugin);
    }

    pub fn plugins(&self) -> &[Arc<dyn ServerPlugin>] {
        &self.plugins
    }

    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name() == name)
    }

    /// Value of the `DAV` header.
    pub fn features(&self) -> Vec<&'static str> {
        let mut features = vec!["1", "3"];
        for plugin in &self.plugins {
            for feature in plugin.features() {
                if !features.contains(&feature) {
                    features.push(feature);
                }
            }
        }
        features
    }

    /// Value of the `Allow` header.
    pub fn allowed_methods(&self) -> Vec<&'static str> {
        let mut methods = CORE_METHODS.to_vec();
        for plugin in &self.plugins {
            for method in plugin.methods() {
                if !methods.contains(&method) {
                    methods.push(method);
                }
            }
        }
        methods
    }

    /// Response to an `OPTIONS` request.
    pub fn options_response(&self) -> DavResponse {
        let mut response = empty_response(StatusCode::OK);
        set_header(&mut response, "DAV", &self.features().join(", "));
        set_header(&mut response, "Allow", &self.allowed_methods().join(", "));
        set_header(&mut response, "MS-Author-Via", "DAV");
        set_header(&mut response, "Content-Length", "0");
        response
    }

    /// Run the request through the plugin chain and the core handlers.
    pub async fn exec(mut self, req: DavRequest) -> DavResponse {
        let request_id = req
            .header("X-Request-Id")
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut ctx = DavContext::new(self.base_uri.clone(), self.is_public_share, request_id);

        debug!(
            method = %req.method,
            path = %req.path,
            request_id = %ctx.request_id,
            "DAV request"
        );

        let result = self.run(&req, &mut ctx).await;
        self.attach_pending(&mut ctx);

        let mut response = match result {
            Ok(response) => response,
            Err(err) => self.error_response(&req, &ctx, &err),
        };

        for plugin in &self.plugins {
            if let Err(err) = plugin.after_method(&req, &ctx, &mut response).await {
                warn!(plugin = plugin.name(), error = %err, "after_method hook failed");
            }
        }
        response
    }

    async fn run(&mut self, req: &DavRequest, ctx: &mut DavContext) -> DavResult<DavResponse> {
        let chain = self.plugins.clone();
        for plugin in &chain {
            if let Flow::Respond(response) = plugin.before_method(self, req, ctx).await? {
                return Ok(response);
            }
        }
        self.attach_pending(ctx);

        for plugin in self.plugins.clone() {
            if let Some(response) = plugin.handle_method(self, req, ctx).await? {
                return Ok(response);
            }
        }
        methods::dispatch(self, req, ctx).await
    }

    fn attach_pending(&mut self, ctx: &mut DavContext) {
        for plugin in std::mem::take(&mut ctx.pending) {
            self.add_plugin(plugin);
        }
    }

    fn error_response(&self, req: &DavRequest, ctx: &DavContext, err: &DavError) -> DavResponse {
        for plugin in &self.plugins {
            plugin.on_exception(req, ctx, err);
        }

        let mut response = self
            .plugins
            .iter()
            .find_map(|p| p.error_page(req, ctx, err))
            .unwrap_or_else(|| {
                xml_response(err.status, build_error_xml(err.exception, &err.message))
            });
        for (name, value) in &err.headers {
            set_header(&mut response, name, value);
        }
        response
    }
}

/// A response with a body and no headers.
pub fn response(status: StatusCode, body: impl Into<Bytes>) -> DavResponse {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
}

pub fn empty_response(status: StatusCode) -> DavResponse {
    response(status, Bytes::new())
}

/// An `application/xml` response.
pub fn xml_response(status: StatusCode, xml: String) -> DavResponse {
    let mut response = response(status, xml);
    set_header(&mut response, "Content-Type", "application/xml; charset=utf-8");
    response
}

/// Set a header, ignoring values that are not valid header text.
pub fn set_header(response: &mut DavResponse, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            response.headers_mut().insert(name, value);
        }
        _ => debug!(header = %name, "Skipping invalid response header"),
    }
}

pub fn response_header<'a>(response: &'a DavResponse, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Named(&'static str, i32);

    #[async_trait]
    impl ServerPlugin for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn priority(&self) -> i32 {
            self.1
        }
    }

    fn request(method: &str, uri: &str, headers: &[(&'static str, &str)]) -> DavRequest {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        DavRequest::new(
            Method::from_bytes(method.as_bytes()).unwrap(),
            uri,
            "/remote.php/dav/files/alice",
            map,
            Bytes::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_request_path_is_decoded() {
        let req = request("GET", "/remote.php/dav/files/alice/My%20Docs/a.txt?x=1", &[]);
        assert_eq!(req.path, "My Docs/a.txt");
        let root = request("PROPFIND", "/remote.php/dav/files/alice/", &[]);
        assert_eq!(root.path, "");
    }

    #[test]
    fn test_request_outside_base_is_rejected() {
        let err = DavRequest::new(
            Method::GET,
            "/remote.php/dav/files/alicex/a",
            "/remote.php/dav/files/alice",
            HeaderMap::new(),
            Bytes::new(),
        )
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_destination_and_overwrite() {
        let req = request(
            "MOVE",
            "/remote.php/dav/files/alice/a.txt",
            &[
                ("destination", "https://cloud.example/remote.php/dav/files/alice/b%20c.txt"),
                ("overwrite", "F"),
            ],
        );
        assert_eq!(req.destination("/remote.php/dav/files/alice").unwrap(), "b c.txt");
        assert!(!req.overwrite());

        let foreign = request(
            "COPY",
            "/remote.php/dav/files/alice/a.txt",
            &[("destination", "/remote.php/dav/files/bob/a.txt")],
        );
        assert_eq!(
            foreign
                .destination("/remote.php/dav/files/alice")
                .unwrap_err()
                .status,
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_plugins_are_ordered_by_priority() {
        let mut server = DavServer::new("/dav", false);
        server.add_plugin(Arc::new(Named("late", 200)));
        server.add_plugin(Arc::new(Named("first", 10)));
        server.add_plugin(Arc::new(Named("default-a", 100)));
        server.add_plugin(Arc::new(Named("default-b", 100)));
        assert_eq!(
            server.plugin_names(),
            vec!["first", "default-a", "default-b", "late"]
        );
    }

    #[test]
    fn test_options_response_lists_core_methods() {
        let server = DavServer::new("/dav", false);
        let response = server.options_response();
        assert_eq!(response_header(&response, "DAV"), Some("1, 3"));
        assert!(response_header(&response, "Allow").unwrap().contains("PROPFIND"));
    }
}
