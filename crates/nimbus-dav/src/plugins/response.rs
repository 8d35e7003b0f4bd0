//! Plugins that decorate responses.

use async_trait::async_trait;
use http::StatusCode;

use crate::error::{DavError, DavResult};
use crate::methods::get_put::quoted;
use crate::properties::xml_escape;
use crate::server::{
    DavContext, DavRequest, DavResponse, DavServer, ServerPlugin, response, response_header,
    set_header,
};

const DUMMY_GET_BODY: &str = "This is the WebDAV interface. It can only be accessed by WebDAV clients such as the Nimbus desktop sync client.";

/// Answers `GET` on a collection with a short notice instead of an error.
#[derive(Debug, Clone, Default)]
pub struct DummyGetResponsePlugin;

#[async_trait]
impl ServerPlugin for DummyGetResponsePlugin {
    fn name(&self) -> &'static str {
        "dummy-get-response"
    }

    fn priority(&self) -> i32 {
        200
    }

    async fn handle_method(
        &self,
        _server: &DavServer,
        req: &DavRequest,
        ctx: &DavContext,
    ) -> DavResult<Option<DavResponse>> {
        if req.method != http::Method::GET {
            return Ok(None);
        }
        let Some(view) = ctx.view.as_ref() else {
            return Ok(None);
        };
        match view.entry(&req.path).await? {
            Some(entry) if entry.is_collection => {
                let mut resp = response(StatusCode::OK, DUMMY_GET_BODY);
                set_header(&mut resp, "Content-Type", "text/plain; charset=utf-8");
                Ok(Some(resp))
            }
            _ => Ok(None),
        }
    }
}

/// Echoes the request id on every response.
#[derive(Debug, Clone, Default)]
pub struct RequestIdHeaderPlugin;

#[async_trait]
impl ServerPlugin for RequestIdHeaderPlugin {
    fn name(&self) -> &'static str {
        "request-id-header"
    }

    async fn after_method(
        &self,
        _req: &DavRequest,
        ctx: &DavContext,
        response: &mut DavResponse,
    ) -> DavResult<()> {
        set_header(response, "X-Request-Id", &ctx.request_id);
        Ok(())
    }
}

/// Mirrors `ETag` into `OC-ETag`, which clients read because proxies may
/// rewrite `ETag`. After a move both carry the destination's tag.
#[derive(Debug, Clone, Default)]
pub struct CopyEtagHeaderPlugin;

#[async_trait]
impl ServerPlugin for CopyEtagHeaderPlugin {
    fn name(&self) -> &'static str {
        "copy-etag-header"
    }

    async fn after_method(
        &self,
        req: &DavRequest,
        ctx: &DavContext,
        response: &mut DavResponse,
    ) -> DavResult<()> {
        if req.method.as_str() == "MOVE" && response.status().is_success() {
            if let (Some(view), Ok(destination)) = (ctx.view.as_ref(), req.destination(&ctx.base_uri)) {
                if let Some(entry) = view.entry(&destination).await? {
                    set_header(response, "ETag", &quoted(&entry.etag));
                }
            }
        }
        if let Some(etag) = response_header(response, "ETag").map(str::to_string) {
            set_header(response, "OC-ETag", &etag);
        }
        Ok(())
    }
}

/// Renders errors of browser `GET` requests as an HTML page.
#[derive(Debug, Clone, Default)]
pub struct BrowserErrorPagePlugin;

impl BrowserErrorPagePlugin {
    /// `GET` from a desktop or mobile web browser.
    pub fn is_browser_request(req: &DavRequest) -> bool {
        if req.method != http::Method::GET {
            return false;
        }
        let agent = req.user_agent();
        ["Firefox/", "Chrome/", "Safari/", "Edg/"]
            .iter()
            .any(|marker| agent.contains(marker))
            && !agent.contains("mirall/")
    }
}

#[async_trait]
impl ServerPlugin for BrowserErrorPagePlugin {
    fn name(&self) -> &'static str {
        "browser-error-page"
    }

    fn error_page(
        &self,
        _req: &DavRequest,
        ctx: &DavContext,
        error: &DavError,
    ) -> Option<DavResponse> {
        let title = error.status.canonical_reason().unwrap_or("Error");
        let html = format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
             <body>\n<h1>{status} {title}</h1>\n<p>{message}</p>\n\
             <p><small>Request ID: {request_id}</small></p>\n</body>\n</html>\n",
            title = xml_escape(title),
            status = error.status.as_u16(),
            message = xml_escape(&error.message),
            request_id = xml_escape(&ctx.request_id),
        );
        let mut resp = response(error.status, html);
        set_header(&mut resp, "Content-Type", "text/html; charset=utf-8");
        Some(resp)
    }
}
