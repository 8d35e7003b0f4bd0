//! COPY and MOVE method implementations (RFC 4918 Sections 9.8 and 9.9).

use http::StatusCode;
use tracing;

use nimbus_database::traits::path_is_under;
use nimbus_entity::share::Permissions;

use crate::error::{DavError, DavResult};
use crate::server::{DavContext, DavRequest, DavResponse, empty_response};
use crate::view::split_parent;

/// Handle a COPY request
pub async fn handle_copy(req: &DavRequest, ctx: &DavContext) -> DavResult<DavResponse> {
    transfer(req, ctx, false).await
}

/// Handle a MOVE request
pub async fn handle_move(req: &DavRequest, ctx: &DavContext) -> DavResult<DavResponse> {
    transfer(req, ctx, true).await
}

async fn transfer(req: &DavRequest, ctx: &DavContext, is_move: bool) -> DavResult<DavResponse> {
    let destination = req.destination(&ctx.base_uri)?;
    let overwrite = req.overwrite();
    let source = req.path.as_str();

    tracing::debug!(
        "{}: src='{}', dst='{}', overwrite={}",
        req.method,
        source,
        destination,
        overwrite
    );

    if source.is_empty() && is_move {
        return Err(DavError::forbidden("Cannot move the root"));
    }
    if destination.is_empty() {
        return Err(DavError::forbidden("Cannot overwrite the root"));
    }
    if source == destination {
        return Err(DavError::forbidden("Source and destination uri are identical."));
    }
    if path_is_under(&destination, source) {
        return Err(DavError::conflict(
            "The destination may not be part of the same subtree as the source path.",
        ));
    }

    let view = ctx.view()?;
    view.require_entry(source).await?;
    let existing = view.entry(&destination).await?;
    if existing.is_some() && !overwrite {
        return Err(DavError::precondition_failed(
            "The destination node already exists, and the overwrite header is set to false",
        ));
    }

    let (parent, _) = split_parent(&destination);
    match view.entry(&parent).await? {
        Some(parent) if parent.is_collection => {}
        _ => return Err(DavError::conflict("The destination node is not found")),
    }

    if is_move {
        view.require(Permissions::DELETE, "move this item")?;
    } else {
        view.require(Permissions::READ, "copy this item")?;
    }
    if existing.is_some() {
        view.require(Permissions::UPDATE, "overwrite the destination")?;
        view.delete(&destination).await?;
    } else {
        view.require(Permissions::CREATE, "create items at the destination")?;
    }

    if is_move {
        view.rename(source, &destination).await?;
    } else {
        view.copy(source, &destination).await?;
    }

    Ok(empty_response(if existing.is_some() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::CREATED
    }))
}
