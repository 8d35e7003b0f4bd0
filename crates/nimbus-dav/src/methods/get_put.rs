//! GET, HEAD, and PUT method implementations for WebDAV.

use bytes::Bytes;
use http::StatusCode;
use tracing;

use nimbus_entity::share::Permissions;

use crate::error::{DavError, DavResult};
use crate::properties::format_http_date;
use crate::server::{DavContext, DavRequest, DavResponse, empty_response, response, set_header};
use crate::view::{DIRECTORY_MIME, DavEntry, split_parent};

/// Handle a GET request (download file)
pub async fn handle_get(req: &DavRequest, ctx: &DavContext) -> DavResult<DavResponse> {
    tracing::debug!("GET: path='{}'", req.path);

    let view = ctx.view()?;
    let entry = view.require_entry(&req.path).await?;
    if entry.is_collection {
        return Err(DavError::not_implemented(
            "GET is only implemented on File objects",
        ));
    }
    view.require(Permissions::READ, "read this file")?;

    if let Some(tags) = req.header("If-None-Match") {
        if etag_matches(tags, &entry.etag) {
            let mut not_modified = empty_response(StatusCode::NOT_MODIFIED);
            set_header(&mut not_modified, "ETag", &quoted(&entry.etag));
            return Ok(not_modified);
        }
    }

    let content = view.read(&req.path).await?;
    let mut resp = response(StatusCode::OK, content);
    file_headers(&mut resp, &entry);
    Ok(resp)
}

/// Handle a HEAD request (file metadata only)
pub async fn handle_head(req: &DavRequest, ctx: &DavContext) -> DavResult<DavResponse> {
    tracing::debug!("HEAD: path='{}'", req.path);

    let view = ctx.view()?;
    let entry = view.require_entry(&req.path).await?;
    let mut resp = empty_response(StatusCode::OK);
    if entry.is_collection {
        set_header(&mut resp, "Content-Type", DIRECTORY_MIME);
    } else {
        file_headers(&mut resp, &entry);
    }
    Ok(resp)
}

/// Handle a PUT request (upload/overwrite file)
pub async fn handle_put(req: &DavRequest, ctx: &DavContext) -> DavResult<DavResponse> {
    tracing::debug!("PUT: path='{}', size={}", req.path, req.body.len());

    let view = ctx.view()?;
    let existing = view.entry(&req.path).await?;
    if existing.as_ref().is_some_and(|e| e.is_collection) {
        return Err(DavError::conflict("PUT is not allowed on non-files."));
    }
    check_preconditions(req, existing.as_ref())?;

    match &existing {
        Some(_) => view.require(Permissions::UPDATE, "update this file")?,
        None => {
            if req.path.is_empty() {
                return Err(DavError::conflict("Cannot PUT to root"));
            }
            let (parent, _) = split_parent(&req.path);
            match view.entry(&parent).await? {
                Some(parent) if parent.is_collection => {}
                _ => return Err(DavError::conflict("Parent collection does not exist")),
            }
            view.require(Permissions::CREATE, "create files in this folder")?;
        }
    }

    let created = view.write(&req.path, &req.body).await?;
    let entry = view.require_entry(&req.path).await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::NO_CONTENT
    };
    let mut resp = response(status, Bytes::new());
    set_header(&mut resp, "ETag", &quoted(&entry.etag));
    Ok(resp)
}

/// Evaluate `If-Match` and `If-None-Match` against the current entry.
fn check_preconditions(req: &DavRequest, existing: Option<&DavEntry>) -> DavResult<()> {
    if let Some(tags) = req.header("If-Match") {
        let matched = existing.is_some_and(|entry| etag_matches(tags, &entry.etag));
        if !matched {
            return Err(DavError::precondition_failed(
                "An If-Match header was specified, but none of the specified ETags matched.",
            ));
        }
    }
    if let Some(tags) = req.header("If-None-Match") {
        if let Some(entry) = existing {
            if etag_matches(tags, &entry.etag) {
                return Err(DavError::precondition_failed(
                    "An If-None-Match header was specified, but the ETag matched (or * was specified).",
                ));
            }
        }
    }
    Ok(())
}

/// Whether an `If-Match` style list (or `*`) names `etag`.
pub fn etag_matches(header: &str, etag: &str) -> bool {
    header.split(',').map(str::trim).any(|tag| {
        tag == "*" || tag.trim_start_matches("W/").trim_matches('"') == etag
    })
}

pub fn quoted(etag: &str) -> String {
    format!("\"{etag}\"")
}

fn file_headers(resp: &mut DavResponse, entry: &DavEntry) {
    set_header(resp, "Content-Type", &entry.content_type);
    set_header(resp, "Content-Length", &entry.size.to_string());
    set_header(resp, "Last-Modified", &format_http_date(&entry.modified));
    set_header(resp, "ETag", &quoted(&entry.etag));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etag_matches() {
        assert!(etag_matches("*", "abc"));
        assert!(etag_matches("\"x\", \"abc\"", "abc"));
        assert!(etag_matches("W/\"abc\"", "abc"));
        assert!(!etag_matches("\"x\"", "abc"));
    }
}
