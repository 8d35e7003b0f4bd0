//! Quota enforcement and quota properties.

use async_trait::async_trait;

use crate::error::{DavError, DavResult};
use crate::methods::PropFind;
use crate::properties::{PropName, PropValue};
use crate::server::{DavContext, DavRequest, DavResponse, DavServer, ServerPlugin};
use crate::view::DavEntry;

/// Rejects uploads and copies that do not fit into the remaining quota
/// with 507.
#[derive(Debug, Clone, Default)]
pub struct QuotaPlugin;

impl QuotaPlugin {
    /// Announced upload size: `OC-Total-Length`, then `Content-Length`,
    /// then the received body.
    fn upload_length(req: &DavRequest) -> u64 {
        ["OC-Total-Length", "Content-Length"]
            .iter()
            .find_map(|name| req.header(name).and_then(|v| v.trim().parse::<u64>().ok()))
            .unwrap_or(req.body.len() as u64)
    }
}

#[async_trait]
impl ServerPlugin for QuotaPlugin {
    fn name(&self) -> &'static str {
        "quota"
    }

    async fn handle_method(
        &self,
        _server: &DavServer,
        req: &DavRequest,
        ctx: &DavContext,
    ) -> DavResult<Option<DavResponse>> {
        let view = ctx.view()?;
        let (length, path) = match req.method.as_str() {
            "PUT" => {
                // An overwritten file frees its old size.
                let replaced = match view.entry(&req.path).await? {
                    Some(entry) if !entry.is_collection => entry.size,
                    _ => 0,
                };
                (Self::upload_length(req).saturating_sub(replaced), req.path.clone())
            }
            "COPY" => (view.size_of(&req.path).await?, req.destination(&ctx.base_uri)?),
            _ => return Ok(None),
        };

        if let Some(free) = view.free_space().await? {
            if length > free {
                return Err(DavError::insufficient_storage(format!(
                    "Insufficient space in {path}, {length} required, {free} available"
                )));
            }
        }
        Ok(None)
    }

    async fn propfind(
        &self,
        ctx: &DavContext,
        entry: &DavEntry,
        props: &mut PropFind,
    ) -> DavResult<()> {
        if !entry.is_collection {
            return Ok(());
        }
        let used_name = PropName::dav("quota-used-bytes");
        let available_name = PropName::dav("quota-available-bytes");
        if !props.wants(&used_name) && !props.wants(&available_name) {
            return Ok(());
        }

        let view = ctx.view()?;
        let used = view.size_of(&entry.path).await?;
        props.set(used_name, PropValue::text(used.to_string()));
        // -3 reports unlimited space.
        let available = match view.free_space().await? {
            Some(free) => free.to_string(),
            None => "-3".to_string(),
        };
        props.set(available_name, PropValue::text(available));
        Ok(())
    }
}
