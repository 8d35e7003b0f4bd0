//! Enforces the download restriction of shares.

use async_trait::async_trait;

use crate::error::{DavError, DavResult};
use crate::server::{DavContext, DavRequest, DavResponse, DavServer, ServerPlugin};

/// Blocks downloads and copies out of a share whose `permissions/download`
/// attribute is `false`.
#[derive(Debug, Clone)]
pub struct ViewOnlyPlugin {
    allow_view_without_download: bool,
}

impl ViewOnlyPlugin {
    pub fn new(allow_view_without_download: bool) -> Self {
        Self {
            allow_view_without_download,
        }
    }
}

#[async_trait]
impl ServerPlugin for ViewOnlyPlugin {
    fn name(&self) -> &'static str {
        "view-only"
    }

    fn priority(&self) -> i32 {
        90
    }

    async fn handle_method(
        &self,
        _server: &DavServer,
        req: &DavRequest,
        ctx: &DavContext,
    ) -> DavResult<Option<DavResponse>> {
        let Some(share) = ctx.view()?.share() else {
            return Ok(None);
        };
        let download_forbidden = !share.can_see_content(false);
        if !download_forbidden {
            return Ok(None);
        }
        match req.method.as_str() {
            "COPY" => Err(DavError::forbidden(
                "Access to this shared resource has been denied because its download permission is disabled.",
            )),
            "GET" if !share.can_see_content(self.allow_view_without_download) => {
                Err(DavError::forbidden(
                    "Access to this shared resource has been denied because its download permission is disabled.",
                ))
            }
            _ => Ok(None),
        }
    }
}
