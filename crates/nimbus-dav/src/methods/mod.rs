//! WebDAV method implementations.

pub mod copy_move;
pub mod delete;
pub mod get_put;
pub mod mkcol;
pub mod propfind;
pub mod proppatch;

use crate::error::{DavError, DavResult};
use crate::server::{DavContext, DavRequest, DavResponse, DavServer};

pub use propfind::PropFind;
pub use proppatch::PropPatch;

/// Route a request no plugin claimed to its core handler.
pub async fn dispatch(
    server: &DavServer,
    req: &DavRequest,
    ctx: &DavContext,
) -> DavResult<DavResponse> {
    match req.method.as_str() {
        "OPTIONS" => Ok(server.options_response()),
        "PROPFIND" => propfind::handle_propfind(server, req, ctx).await,
        "PROPPATCH" => proppatch::handle_proppatch(server, req, ctx).await,
        "MKCOL" => mkcol::handle_mkcol(req, ctx).await,
        "GET" => get_put::handle_get(req, ctx).await,
        "HEAD" => get_put::handle_head(req, ctx).await,
        "PUT" => get_put::handle_put(req, ctx).await,
        "DELETE" => delete::handle_delete(req, ctx).await,
        "COPY" => copy_move::handle_copy(req, ctx).await,
        "MOVE" => copy_move::handle_move(req, ctx).await,
        other => Err(DavError::not_implemented(format!(
            "There was no plugin in the system that was willing to handle this {other} method."
        ))),
    }
}
