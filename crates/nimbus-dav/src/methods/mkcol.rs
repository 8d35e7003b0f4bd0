//! MKCOL method implementation (RFC 4918 Section 9.3).

use http::StatusCode;
use tracing;

use nimbus_entity::share::Permissions;

use crate::error::{DavError, DavResult};
use crate::server::{DavContext, DavRequest, DavResponse, empty_response};
use crate::view::split_parent;

/// Handle a MKCOL request (create collection)
pub async fn handle_mkcol(req: &DavRequest, ctx: &DavContext) -> DavResult<DavResponse> {
    tracing::debug!("MKCOL: path='{}'", req.path);

    if !req.body.is_empty() {
        return Err(DavError::unsupported_media_type(
            "The request body for the MKCOL request must be empty",
        ));
    }

    let view = ctx.view()?;
    if req.path.is_empty() || view.entry(&req.path).await?.is_some() {
        return Err(DavError::method_not_allowed(
            "The resource you tried to create already exists",
        ));
    }

    let (parent, _) = split_parent(&req.path);
    match view.entry(&parent).await? {
        Some(parent) if parent.is_collection => {}
        _ => return Err(DavError::conflict("Parent node does not exist")),
    }
    view.require(Permissions::CREATE, "create folders here")?;

    view.mkdir(&req.path).await?;
    Ok(empty_response(StatusCode::CREATED))
}
