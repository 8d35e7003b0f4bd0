//! DELETE method implementation (RFC 4918 Section 9.6).

use http::StatusCode;
use tracing;

use nimbus_entity::share::Permissions;

use crate::error::{DavError, DavResult};
use crate::server::{DavContext, DavRequest, DavResponse, empty_response};

/// Handle a DELETE request
pub async fn handle_delete(req: &DavRequest, ctx: &DavContext) -> DavResult<DavResponse> {
    tracing::debug!("DELETE: path='{}'", req.path);

    if req.path.is_empty() {
        return Err(DavError::forbidden("Cannot delete the root"));
    }
    let view = ctx.view()?;
    view.require_entry(&req.path).await?;
    view.require(Permissions::DELETE, "delete this item")?;

    view.delete(&req.path).await?;
    Ok(empty_response(StatusCode::NO_CONTENT))
}
